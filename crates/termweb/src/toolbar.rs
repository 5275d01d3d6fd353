//! C9 — toolbar widget: nav button hit boxes and the URL bar's text
//! buffer/cursor/selection state. Rendered to a PNG by the viewer and
//! composited through the Kitty emitter's `Layer::Toolbar`.

use unicode_width::UnicodeWidthChar;

use crate::clipboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Normal,
    Hover,
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Back,
    Forward,
    Reload,
    Close,
}

const BUTTON_WIDTH_PX: u32 = 32;
const BUTTON_COUNT: u32 = 4;

#[derive(Debug, Clone, Copy)]
pub struct NavState {
    pub back: ButtonState,
    pub forward: ButtonState,
    pub reload: ButtonState,
    pub close: ButtonState,
}

impl Default for NavState {
    fn default() -> Self {
        Self {
            back: ButtonState::Disabled,
            forward: ButtonState::Disabled,
            reload: ButtonState::Normal,
            close: ButtonState::Normal,
        }
    }
}

/// Height is pinned to a whole number of terminal cell rows; the coordinate
/// mapper's `toolbar_height` must be constructed from the same `cell_height`
/// passed here, or click mapping drifts from what's drawn.
pub fn toolbar_height_px(cell_height: f64) -> u32 {
    (cell_height.ceil() as u32).max(1)
}

#[derive(Debug, Default)]
pub struct UrlBar {
    buffer: Vec<char>,
    cursor: usize,
    selection_anchor: Option<usize>,
    focused: bool,
    scroll_offset: usize,
}

impl UrlBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, text: &str) {
        self.buffer = text.chars().collect();
        self.cursor = self.buffer.len();
        self.selection_anchor = None;
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn focus(&mut self) {
        self.focused = true;
        self.select_all();
    }

    pub fn blur(&mut self) {
        self.focused = false;
        self.selection_anchor = None;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn selection_range(&self) -> Option<(usize, usize)> {
        self.selection_anchor.map(|anchor| {
            if anchor <= self.cursor {
                (anchor, self.cursor)
            } else {
                (self.cursor, anchor)
            }
        })
    }

    pub fn select_all(&mut self) {
        self.selection_anchor = Some(0);
        self.cursor = self.buffer.len();
    }

    fn delete_selection(&mut self) -> bool {
        if let Some((start, end)) = self.selection_range() {
            self.buffer.drain(start..end);
            self.cursor = start;
            self.selection_anchor = None;
            true
        } else {
            false
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.delete_selection();
        self.buffer.insert(self.cursor, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.delete_selection() {
            return;
        }
        if self.cursor > 0 {
            self.buffer.remove(self.cursor - 1);
            self.cursor -= 1;
        }
    }

    pub fn delete_forward(&mut self) {
        if self.delete_selection() {
            return;
        }
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn extend_or_clear_selection(&mut self, shift: bool, previous_cursor: usize) {
        if shift {
            if self.selection_anchor.is_none() {
                self.selection_anchor = Some(previous_cursor);
            }
        } else {
            self.selection_anchor = None;
        }
    }

    pub fn move_left(&mut self, shift: bool) {
        let previous = self.cursor;
        self.cursor = self.cursor.saturating_sub(1);
        self.extend_or_clear_selection(shift, previous);
    }

    pub fn move_right(&mut self, shift: bool) {
        let previous = self.cursor;
        self.cursor = (self.cursor + 1).min(self.buffer.len());
        self.extend_or_clear_selection(shift, previous);
    }

    pub fn move_home(&mut self, shift: bool) {
        let previous = self.cursor;
        self.cursor = 0;
        self.extend_or_clear_selection(shift, previous);
    }

    pub fn move_end(&mut self, shift: bool) {
        let previous = self.cursor;
        self.cursor = self.buffer.len();
        self.extend_or_clear_selection(shift, previous);
    }

    pub fn move_word_left(&mut self, shift: bool) {
        let previous = self.cursor;
        let mut i = self.cursor;
        while i > 0 && !is_word_char(self.buffer[i - 1]) {
            i -= 1;
        }
        while i > 0 && is_word_char(self.buffer[i - 1]) {
            i -= 1;
        }
        self.cursor = i;
        self.extend_or_clear_selection(shift, previous);
    }

    pub fn move_word_right(&mut self, shift: bool) {
        let previous = self.cursor;
        let mut i = self.cursor;
        let len = self.buffer.len();
        while i < len && !is_word_char(self.buffer[i]) {
            i += 1;
        }
        while i < len && is_word_char(self.buffer[i]) {
            i += 1;
        }
        self.cursor = i;
        self.extend_or_clear_selection(shift, previous);
    }

    fn selected_text(&self) -> Option<String> {
        self.selection_range()
            .map(|(start, end)| self.buffer[start..end].iter().collect())
    }

    pub fn cut(&mut self) {
        if let Some(text) = self.selected_text() {
            clipboard::set_text(&text);
            self.delete_selection();
        }
    }

    pub fn copy(&mut self) {
        if let Some(text) = self.selected_text() {
            clipboard::set_text(&text);
        }
    }

    pub fn paste(&mut self) {
        if let Some(text) = clipboard::get_text() {
            self.delete_selection();
            for c in text.chars() {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
        }
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    /// Keeps the cursor within `visible_cols` terminal columns of the scroll
    /// window, measuring in display width rather than char count so wide
    /// characters (e.g. CJK glyphs in an internationalized domain) don't
    /// overrun the drawn box.
    pub fn clamp_scroll(&mut self, visible_cols: usize) {
        if self.cursor < self.scroll_offset {
            self.scroll_offset = self.cursor;
            return;
        }
        while self.width_between(self.scroll_offset, self.cursor) > visible_cols {
            self.scroll_offset += 1;
        }
    }

    /// Visible slice of the buffer, already clamped to `scroll_offset`.
    pub fn visible_text(&self) -> String {
        self.buffer[self.scroll_offset.min(self.buffer.len())..].iter().collect()
    }

    fn width_between(&self, start: usize, end: usize) -> usize {
        self.buffer[start.min(end)..end.min(self.buffer.len())]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

pub struct Toolbar {
    pub nav: NavState,
    pub url_bar: UrlBar,
    height_px: u32,
}

impl Toolbar {
    pub fn new(cell_height: f64) -> Self {
        Self {
            nav: NavState::default(),
            url_bar: UrlBar::new(),
            height_px: toolbar_height_px(cell_height),
        }
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }

    pub fn set_nav_state(&mut self, back: bool, forward: bool, loading: bool) {
        self.nav.back = if back { ButtonState::Normal } else { ButtonState::Disabled };
        self.nav.forward = if forward { ButtonState::Normal } else { ButtonState::Disabled };
        self.nav.reload = if loading { ButtonState::Active } else { ButtonState::Normal };
    }

    pub fn set_url(&mut self, url: &str) {
        if !self.url_bar.is_focused() {
            self.url_bar.set_text(url);
        }
    }

    pub fn focus_url(&mut self) {
        self.url_bar.focus();
    }

    pub fn blur_url(&mut self) {
        self.url_bar.blur();
    }

    /// Hit-tests a point in toolbar-local pixel coordinates against the
    /// fixed-width button row, left to right: back, forward, reload, close.
    pub fn hit_test(&self, px: u32, py: u32) -> Option<Button> {
        if py >= self.height_px {
            return None;
        }
        let index = px / BUTTON_WIDTH_PX;
        if index >= BUTTON_COUNT {
            return None;
        }
        match index {
            0 => Some(Button::Back),
            1 => Some(Button::Forward),
            2 => Some(Button::Reload),
            _ => Some(Button::Close),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_matches_cell_height_exactly() {
        assert_eq!(toolbar_height_px(20.0), 20);
        assert_eq!(toolbar_height_px(20.5), 21);
    }

    #[test]
    fn hit_test_resolves_each_button_in_order() {
        let bar = Toolbar::new(20.0);
        assert_eq!(bar.hit_test(0, 5), Some(Button::Back));
        assert_eq!(bar.hit_test(BUTTON_WIDTH_PX, 5), Some(Button::Forward));
        assert_eq!(bar.hit_test(BUTTON_WIDTH_PX * 2, 5), Some(Button::Reload));
        assert_eq!(bar.hit_test(BUTTON_WIDTH_PX * 3, 5), Some(Button::Close));
    }

    #[test]
    fn hit_test_outside_toolbar_row_is_none() {
        let bar = Toolbar::new(20.0);
        assert_eq!(bar.hit_test(0, 25), None);
        assert_eq!(bar.hit_test(1000, 5), None);
    }

    #[test]
    fn word_step_stops_at_alnum_boundary() {
        let mut bar = UrlBar::new();
        bar.set_text("foo/bar baz");
        bar.move_home(false);
        bar.move_word_right(false);
        assert_eq!(bar.cursor(), 3);
        bar.move_word_right(false);
        assert_eq!(bar.cursor(), 7);
    }

    #[test]
    fn select_all_then_insert_replaces_everything() {
        let mut bar = UrlBar::new();
        bar.set_text("example.com");
        bar.select_all();
        bar.insert_char('x');
        assert_eq!(bar.text(), "x");
    }

    #[test]
    fn shift_arrow_builds_a_selection_range() {
        let mut bar = UrlBar::new();
        bar.set_text("hello");
        bar.move_home(false);
        bar.move_right(true);
        bar.move_right(true);
        assert_eq!(bar.selection_range(), Some((0, 2)));
    }

    #[test]
    fn clamp_scroll_accounts_for_wide_characters() {
        let mut bar = UrlBar::new();
        bar.set_text("中中中中hello");
        bar.move_home(false);
        bar.move_right(false);
        bar.move_right(false);
        bar.move_right(false);
        bar.move_right(false);
        bar.move_right(false);
        // Cursor sits just past the 4 double-width chars (8 cols) plus one
        // "h" (1 col) = 9 cols consumed; a 6-col window must have scrolled.
        bar.clamp_scroll(6);
        assert!(bar.scroll_offset() > 0);
    }

    #[test]
    fn backspace_deletes_selection_instead_of_one_char() {
        let mut bar = UrlBar::new();
        bar.set_text("hello");
        bar.move_home(false);
        bar.move_right(true);
        bar.move_right(true);
        bar.backspace();
        assert_eq!(bar.text(), "llo");
    }
}
