//! C8 — mode-aware keyboard dispatcher: global hotkeys, the deterministic
//! key→CDP mapping for Normal mode, and the URL bar's text-editing
//! operations for UrlPrompt mode.

use termweb_cdp::CdpClient;
use termweb_cdp::input_dispatch::{self, Modifiers as CdpModifiers};

use crate::terminal::{Key, KeyEvent, Modifiers};
use crate::toolbar::UrlBar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    Quit,
    OpenUrlPrompt,
    Reload,
    HistoryBack,
    HistoryForward,
    Stop,
    TabPicker,
}

/// Checked before any mode-specific handling; these fire regardless of
/// `ViewerMode`.
pub fn global_hotkey(event: &KeyEvent) -> Option<GlobalAction> {
    if !event.modifiers.ctrl {
        return None;
    }
    match event.key {
        Key::Char('q') | Key::Char('w') | Key::Char('c') => Some(GlobalAction::Quit),
        Key::Char('l') => Some(GlobalAction::OpenUrlPrompt),
        Key::Char('r') => Some(GlobalAction::Reload),
        Key::Char('[') => Some(GlobalAction::HistoryBack),
        Key::Char(']') => Some(GlobalAction::HistoryForward),
        Key::Char('.') => Some(GlobalAction::Stop),
        Key::Char('t') => Some(GlobalAction::TabPicker),
        _ => None,
    }
}

fn cdp_modifiers(m: Modifiers) -> CdpModifiers {
    CdpModifiers {
        alt: m.alt,
        ctrl: m.ctrl,
        meta: m.meta,
        shift: m.shift,
    }
}

/// Translates one Normal-mode key into a CDP key event. Returns `false` for
/// keys with no mapping (caller should do nothing).
pub fn dispatch_normal_key(client: &CdpClient, event: &KeyEvent) -> bool {
    let modifiers = cdp_modifiers(event.modifiers);
    match event.key {
        Key::Char(c) => {
            let key = c.to_string();
            let _ = input_dispatch::dispatch_key_event(
                client, "keyDown", &key, &key, Some(&key), modifiers, None,
            );
            let _ = input_dispatch::dispatch_key_event(
                client, "keyUp", &key, &key, None, modifiers, None,
            );
            true
        }
        Key::Enter => dispatch_named(client, "Enter", modifiers),
        Key::Tab => dispatch_named(client, "Tab", modifiers),
        Key::Escape => dispatch_named(client, "Escape", modifiers),
        Key::Backspace => dispatch_named(client, "Backspace", modifiers),
        Key::Delete => dispatch_named(client, "Delete", modifiers),
        Key::ArrowUp => dispatch_named(client, "ArrowUp", modifiers),
        Key::ArrowDown => dispatch_named(client, "ArrowDown", modifiers),
        Key::ArrowLeft => dispatch_named(client, "ArrowLeft", modifiers),
        Key::ArrowRight => dispatch_named(client, "ArrowRight", modifiers),
        Key::Home => dispatch_named(client, "Home", modifiers),
        Key::End => dispatch_named(client, "End", modifiers),
        Key::PageUp => dispatch_named(client, "PageUp", modifiers),
        Key::PageDown => dispatch_named(client, "PageDown", modifiers),
        Key::Space => dispatch_named(client, "Space", modifiers),
        _ => false,
    }
}

fn dispatch_named(client: &CdpClient, key: &str, modifiers: CdpModifiers) -> bool {
    input_dispatch::press_key(client, key, modifiers).is_ok()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// URL bar text editing operations, per §4.8. Pure edits on `UrlBar`'s
/// buffer/cursor/selection; callers decide when Enter commits a navigation
/// and Esc cancels back to Normal mode.
pub fn handle_url_prompt_key(bar: &mut UrlBar, event: &KeyEvent, is_macos: bool) -> UrlPromptOutcome {
    let m = event.modifiers;

    // Cmd+Arrow (macOS) -> Home/End; Option/Ctrl+Arrow -> word step.
    let word_step = if is_macos { m.alt } else { m.ctrl };
    let to_edge = is_macos && m.meta;

    match event.key {
        Key::Char(c) if m.ctrl && (c == 'a' || c == 'A') => {
            bar.select_all();
            UrlPromptOutcome::Continue
        }
        Key::Char(c) if (m.ctrl || m.meta) && (c == 'x' || c == 'X') => {
            bar.cut();
            UrlPromptOutcome::Continue
        }
        Key::Char(c) if (m.ctrl || m.meta) && (c == 'c' || c == 'C') => {
            bar.copy();
            UrlPromptOutcome::Continue
        }
        Key::Char(c) if (m.ctrl || m.meta) && (c == 'v' || c == 'V') => {
            bar.paste();
            UrlPromptOutcome::Continue
        }
        Key::Char(c) => {
            bar.insert_char(c);
            UrlPromptOutcome::Continue
        }
        Key::Backspace => {
            bar.backspace();
            UrlPromptOutcome::Continue
        }
        Key::Delete => {
            bar.delete_forward();
            UrlPromptOutcome::Continue
        }
        Key::ArrowLeft => {
            if to_edge {
                bar.move_home(m.shift);
            } else if word_step {
                bar.move_word_left(m.shift);
            } else {
                bar.move_left(m.shift);
            }
            UrlPromptOutcome::Continue
        }
        Key::ArrowRight => {
            if to_edge {
                bar.move_end(m.shift);
            } else if word_step {
                bar.move_word_right(m.shift);
            } else {
                bar.move_right(m.shift);
            }
            UrlPromptOutcome::Continue
        }
        Key::Home => {
            bar.move_home(m.shift);
            UrlPromptOutcome::Continue
        }
        Key::End => {
            bar.move_end(m.shift);
            UrlPromptOutcome::Continue
        }
        Key::Enter => UrlPromptOutcome::Commit(bar.text().to_string()),
        Key::Escape => UrlPromptOutcome::Cancel,
        _ => UrlPromptOutcome::Continue,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPromptOutcome {
    Continue,
    Commit(String),
    Cancel,
}

pub(crate) fn word_boundary_predicate(c: char) -> bool {
    is_word_char(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::Modifiers;

    fn key(k: Key, ctrl: bool) -> KeyEvent {
        KeyEvent {
            key: k,
            modifiers: Modifiers {
                ctrl,
                ..Default::default()
            },
        }
    }

    #[test]
    fn ctrl_q_w_c_all_quit() {
        assert_eq!(global_hotkey(&key(Key::Char('q'), true)), Some(GlobalAction::Quit));
        assert_eq!(global_hotkey(&key(Key::Char('w'), true)), Some(GlobalAction::Quit));
        assert_eq!(global_hotkey(&key(Key::Char('c'), true)), Some(GlobalAction::Quit));
    }

    #[test]
    fn ctrl_l_opens_url_prompt() {
        assert_eq!(global_hotkey(&key(Key::Char('l'), true)), Some(GlobalAction::OpenUrlPrompt));
    }

    #[test]
    fn unmodified_keys_are_not_global_hotkeys() {
        assert_eq!(global_hotkey(&key(Key::Char('q'), false)), None);
    }

    #[test]
    fn history_brackets_map_back_and_forward() {
        assert_eq!(global_hotkey(&key(Key::Char('['), true)), Some(GlobalAction::HistoryBack));
        assert_eq!(global_hotkey(&key(Key::Char(']'), true)), Some(GlobalAction::HistoryForward));
    }

    #[test]
    fn word_boundary_is_alnum_runs() {
        assert!(word_boundary_predicate('a'));
        assert!(word_boundary_predicate('9'));
        assert!(!word_boundary_predicate('/'));
        assert!(!word_boundary_predicate(' '));
    }
}
