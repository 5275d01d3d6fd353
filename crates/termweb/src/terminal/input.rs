//! Byte-level input parser: UTF-8, CSI cursor/function keys, Ctrl-letter
//! combos, SGR 1006/1016 mouse, bracketed paste boundaries.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    PageUp,
    PageDown,
    Space,
    Function(u8),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
    Press,
    Release,
    Move,
    Drag,
    WheelUp,
    WheelDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub kind: MouseKind,
    pub button: MouseButton,
    pub x: i64,
    pub y: i64,
    pub pixel_mode: bool,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Paste(String),
    Resize,
    None,
}

/// Parses the leading event out of `buf`. Returns the event (or `None` when
/// there isn't a complete event yet) and the number of bytes consumed.
pub fn parse_one(buf: &[u8]) -> (Input, usize) {
    if buf.is_empty() {
        return (Input::None, 0);
    }

    match buf[0] {
        0x1b => parse_escape(buf),
        0x08 | 0x7f => (Input::Key(plain(Key::Backspace)), 1),
        0x09 => (Input::Key(plain(Key::Tab)), 1),
        0x0d => (Input::Key(plain(Key::Enter)), 1),
        b @ 1..=26 if b != 0x08 && b != 0x09 && b != 0x0d => {
            let ch = (b'a' + b - 1) as char;
            (
                Input::Key(KeyEvent {
                    key: Key::Char(ch),
                    modifiers: Modifiers {
                        ctrl: true,
                        ..Default::default()
                    },
                }),
                1,
            )
        }
        _ => parse_utf8_char(buf),
    }
}

fn plain(key: Key) -> KeyEvent {
    KeyEvent {
        key,
        modifiers: Modifiers::default(),
    }
}

fn parse_utf8_char(buf: &[u8]) -> (Input, usize) {
    let len = utf8_len(buf[0]);
    if buf.len() < len {
        return (Input::None, 0);
    }
    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => match s.chars().next() {
            Some(ch) => (Input::Key(plain(Key::Char(ch))), len),
            None => (Input::None, 1),
        },
        Err(_) => (Input::None, 1),
    }
}

fn utf8_len(lead: u8) -> usize {
    if lead & 0x80 == 0 {
        1
    } else if lead & 0xe0 == 0xc0 {
        2
    } else if lead & 0xf0 == 0xe0 {
        3
    } else if lead & 0xf8 == 0xf0 {
        4
    } else {
        1
    }
}

fn parse_escape(buf: &[u8]) -> (Input, usize) {
    if buf.len() < 2 {
        return (Input::None, 0);
    }
    if buf[1] != b'[' && buf[1] != b'O' {
        // Bare Escape, or Alt+<char> (ESC followed by a printable char).
        if buf[1].is_ascii_graphic() {
            let (inner, consumed) = parse_utf8_char(&buf[1..]);
            if let Input::Key(mut event) = inner {
                event.modifiers.alt = true;
                return (Input::Key(event), 1 + consumed);
            }
            return (Input::None, 0);
        }
        return (Input::Key(plain(Key::Escape)), 1);
    }

    if buf.len() < 3 {
        return (Input::None, 0);
    }

    // Bracketed paste: ESC [ 200 ~ ... ESC [ 201 ~
    if buf[1] == b'[' && buf[2..].starts_with(b"200~") {
        return parse_bracketed_paste(buf);
    }

    // SGR mouse: ESC [ < b ; x ; y (M|m)
    if buf[1] == b'[' && buf.get(2) == Some(&b'<') {
        return parse_sgr_mouse(buf);
    }

    parse_csi_key(buf)
}

fn parse_bracketed_paste(buf: &[u8]) -> (Input, usize) {
    const END: &[u8] = b"\x1b[201~";
    let start = 6; // len of "\x1b[200~"
    if let Some(rel_end) = find_subslice(&buf[start..], END) {
        let text = String::from_utf8_lossy(&buf[start..start + rel_end]).into_owned();
        (Input::Paste(text), start + rel_end + END.len())
    } else {
        (Input::None, 0)
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_sgr_mouse(buf: &[u8]) -> (Input, usize) {
    // ESC [ < b ; x ; y M/m
    let tail = &buf[3..];
    let Some(term_pos) = tail.iter().position(|b| *b == b'M' || *b == b'm') else {
        return (Input::None, 0);
    };
    let body = &tail[..term_pos];
    let terminator = tail[term_pos];
    let consumed = 3 + term_pos + 1;

    let text = match std::str::from_utf8(body) {
        Ok(s) => s,
        Err(_) => return (Input::None, 0),
    };
    let mut parts = text.split(';');
    let (Some(b_str), Some(x_str), Some(y_str)) = (parts.next(), parts.next(), parts.next()) else {
        return (Input::None, 0);
    };
    let (Ok(b), Ok(x), Ok(y)) = (
        b_str.parse::<i64>(),
        x_str.parse::<i64>(),
        y_str.parse::<i64>(),
    ) else {
        return (Input::None, 0);
    };

    let modifiers = Modifiers {
        shift: b & 4 != 0,
        alt: b & 8 != 0,
        ctrl: b & 16 != 0,
        meta: false,
    };
    let is_motion = b & 32 != 0;
    let wheel = b & 64 != 0;
    let button_code = b & 0b11;

    let (kind, button) = if wheel {
        let kind = if button_code == 0 {
            MouseKind::WheelUp
        } else {
            MouseKind::WheelDown
        };
        (kind, MouseButton::None)
    } else {
        let button = match button_code {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            _ => MouseButton::None,
        };
        let kind = if is_motion {
            if button == MouseButton::None {
                MouseKind::Move
            } else {
                MouseKind::Drag
            }
        } else if terminator == b'M' {
            MouseKind::Press
        } else {
            MouseKind::Release
        };
        (kind, button)
    };

    (
        Input::Mouse(MouseEvent {
            kind,
            button,
            x,
            y,
            // Pixel mode (1016) is distinguished by the caller, which knows
            // which `DECSET` mode it last enabled; this parser only extracts
            // the raw numbers.
            pixel_mode: false,
            modifiers,
        }),
        consumed,
    )
}

fn parse_csi_key(buf: &[u8]) -> (Input, usize) {
    // Find the terminating letter/tilde of a simple CSI sequence.
    let body_start = 2;
    let Some(rel_end) = buf[body_start..]
        .iter()
        .position(|b| b.is_ascii_alphabetic() || *b == b'~')
    else {
        return (Input::None, 0);
    };
    let terminator = buf[body_start + rel_end];
    let consumed = body_start + rel_end + 1;
    let body = &buf[body_start..body_start + rel_end];

    let key = match (terminator, body) {
        (b'A', _) => Some(Key::ArrowUp),
        (b'B', _) => Some(Key::ArrowDown),
        (b'C', _) => Some(Key::ArrowRight),
        (b'D', _) => Some(Key::ArrowLeft),
        (b'H', _) => Some(Key::Home),
        (b'F', _) => Some(Key::End),
        (b'~', b"1") | (b'~', b"7") => Some(Key::Home),
        (b'~', b"4") | (b'~', b"8") => Some(Key::End),
        (b'~', b"3") => Some(Key::Delete),
        (b'~', b"5") => Some(Key::PageUp),
        (b'~', b"6") => Some(Key::PageDown),
        _ => None,
    };
    match key {
        Some(key) => (Input::Key(plain(key)), consumed),
        None => (Input::None, consumed.max(1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ctrl_letter() {
        let (input, consumed) = parse_one(&[0x11]);
        assert_eq!(consumed, 1);
        assert_eq!(
            input,
            Input::Key(KeyEvent {
                key: Key::Char('q'),
                modifiers: Modifiers {
                    ctrl: true,
                    ..Default::default()
                },
            })
        );
    }

    #[test]
    fn parses_plain_ascii() {
        let (input, consumed) = parse_one(b"a");
        assert_eq!(consumed, 1);
        assert_eq!(input, Input::Key(plain(Key::Char('a'))));
    }

    #[test]
    fn parses_multibyte_utf8() {
        let bytes = "é".as_bytes();
        let (input, consumed) = parse_one(bytes);
        assert_eq!(consumed, bytes.len());
        assert_eq!(input, Input::Key(plain(Key::Char('é'))));
    }

    #[test]
    fn incomplete_multibyte_returns_none() {
        let bytes = "é".as_bytes();
        let (input, consumed) = parse_one(&bytes[..1]);
        assert_eq!(input, Input::None);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn parses_arrow_keys() {
        let (input, consumed) = parse_one(b"\x1b[A");
        assert_eq!(consumed, 3);
        assert_eq!(input, Input::Key(plain(Key::ArrowUp)));
    }

    #[test]
    fn parses_delete_tilde_sequence() {
        let (input, consumed) = parse_one(b"\x1b[3~");
        assert_eq!(consumed, 4);
        assert_eq!(input, Input::Key(plain(Key::Delete)));
    }

    #[test]
    fn parses_sgr_mouse_press_and_release() {
        let (input, consumed) = parse_one(b"\x1b[<0;10;20M");
        assert_eq!(consumed, 11);
        match input {
            Input::Mouse(event) => {
                assert_eq!(event.kind, MouseKind::Press);
                assert_eq!(event.button, MouseButton::Left);
                assert_eq!((event.x, event.y), (10, 20));
            }
            other => panic!("expected mouse event, got {other:?}"),
        }

        let (input, _) = parse_one(b"\x1b[<0;10;20m");
        match input {
            Input::Mouse(event) => assert_eq!(event.kind, MouseKind::Release),
            other => panic!("expected mouse event, got {other:?}"),
        }
    }

    #[test]
    fn parses_sgr_wheel() {
        let (input, _) = parse_one(b"\x1b[<64;5;5M");
        match input {
            Input::Mouse(event) => assert_eq!(event.kind, MouseKind::WheelUp),
            other => panic!("expected wheel event, got {other:?}"),
        }
    }

    #[test]
    fn parses_bracketed_paste() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x1b[200~");
        buf.extend_from_slice(b"hello world");
        buf.extend_from_slice(b"\x1b[201~");
        let (input, consumed) = parse_one(&buf);
        assert_eq!(consumed, buf.len());
        assert_eq!(input, Input::Paste("hello world".to_string()));
    }

    #[test]
    fn incomplete_paste_returns_none() {
        let (input, consumed) = parse_one(b"\x1b[200~partial");
        assert_eq!(input, Input::None);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn alt_plus_char_sets_alt_modifier() {
        let (input, consumed) = parse_one(b"\x1bf");
        assert_eq!(consumed, 2);
        assert_eq!(
            input,
            Input::Key(KeyEvent {
                key: Key::Char('f'),
                modifiers: Modifiers {
                    alt: true,
                    ..Default::default()
                },
            })
        );
    }
}
