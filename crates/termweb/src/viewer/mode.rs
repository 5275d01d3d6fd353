//! Pure mode-transition table for the viewer state machine (§4.10). Kept
//! free of CDP/terminal I/O so the transition rules can be tested without
//! a running browser.

use crate::terminal::{Key, KeyEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerMode {
    Normal,
    UrlPrompt,
    FormMode,
    TextInput,
    Help,
    Dialog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Key(Key),
    CdpDialog,
    FormEnterOnTextField,
}

/// One step of the fixed transition table. Returns `None` when the
/// trigger has no effect on `mode`'s current state (caller keeps `mode`
/// and routes the key elsewhere, e.g. to the input router).
pub fn next_mode(mode: ViewerMode, trigger: Trigger) -> Option<ViewerMode> {
    match (mode, trigger) {
        (_, Trigger::Key(Key::Escape)) if mode != ViewerMode::Normal => match mode {
            ViewerMode::TextInput => Some(ViewerMode::FormMode),
            _ => Some(ViewerMode::Normal),
        },
        (ViewerMode::Normal, Trigger::Key(Key::Char('l'))) => None,
        (ViewerMode::Normal, Trigger::Key(Key::Char('f'))) => Some(ViewerMode::FormMode),
        (ViewerMode::Normal, Trigger::Key(Key::Char('?'))) => Some(ViewerMode::Help),
        (ViewerMode::Normal, Trigger::CdpDialog) => Some(ViewerMode::Dialog),
        (ViewerMode::FormMode, Trigger::FormEnterOnTextField) => Some(ViewerMode::TextInput),
        (ViewerMode::TextInput, Trigger::Key(Key::Enter)) => Some(ViewerMode::FormMode),
        _ => None,
    }
}

/// `Ctrl+L` is handled by the global hotkey layer (C8), not this table, but
/// the viewer asks here first so the two stay in lockstep in one place.
pub fn url_prompt_trigger(event: &KeyEvent) -> bool {
    event.modifiers.ctrl && matches!(event.key, Key::Char('l'))
}

/// Whether frame rendering is allowed in the given mode — only `Normal`
/// composites the live content layer; other modes freeze the last frame
/// under their overlay.
pub fn renders_content(mode: ViewerMode) -> bool {
    matches!(mode, ViewerMode::Normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Modifiers;

    fn key(k: Key) -> KeyEvent {
        KeyEvent { key: k, modifiers: Modifiers::default() }
    }

    #[test]
    fn f_key_enters_form_mode_from_normal() {
        assert_eq!(
            next_mode(ViewerMode::Normal, Trigger::Key(Key::Char('f'))),
            Some(ViewerMode::FormMode)
        );
    }

    #[test]
    fn question_mark_opens_help() {
        assert_eq!(
            next_mode(ViewerMode::Normal, Trigger::Key(Key::Char('?'))),
            Some(ViewerMode::Help)
        );
    }

    #[test]
    fn escape_returns_to_normal_from_any_overlay_mode() {
        for mode in [ViewerMode::UrlPrompt, ViewerMode::FormMode, ViewerMode::Help, ViewerMode::Dialog] {
            assert_eq!(next_mode(mode, Trigger::Key(Key::Escape)), Some(ViewerMode::Normal));
        }
    }

    #[test]
    fn escape_from_text_input_falls_back_to_form_mode_not_normal() {
        assert_eq!(
            next_mode(ViewerMode::TextInput, Trigger::Key(Key::Escape)),
            Some(ViewerMode::FormMode)
        );
    }

    #[test]
    fn form_enter_on_text_field_opens_text_input() {
        assert_eq!(
            next_mode(ViewerMode::FormMode, Trigger::FormEnterOnTextField),
            Some(ViewerMode::TextInput)
        );
    }

    #[test]
    fn only_normal_mode_renders_live_content() {
        assert!(renders_content(ViewerMode::Normal));
        assert!(!renders_content(ViewerMode::UrlPrompt));
        assert!(!renders_content(ViewerMode::Dialog));
    }

    #[test]
    fn dialog_event_transitions_from_normal() {
        assert_eq!(next_mode(ViewerMode::Normal, Trigger::CdpDialog), Some(ViewerMode::Dialog));
    }
}
