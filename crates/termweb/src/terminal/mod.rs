//! C1 — raw-mode tty control, size queries, SIGWINCH, and the input drain
//! loop built on top of `input::parse_one`.

pub mod input;

pub use input::{Input, Key, KeyEvent, MouseButton, MouseEvent, MouseKind, Modifiers};

use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

use crate::error::TerminalError;

static RESIZED: AtomicBool = AtomicBool::new(false);
static RAW_MODE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Drained per viewer tick; bounds how much input one iteration can absorb
/// so a flood (e.g. a pasted megabyte) cannot starve the render loop.
pub const MAX_EVENTS_PER_TICK: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct Size {
    pub cols: u32,
    pub rows: u32,
    pub width_px: u32,
    pub height_px: u32,
}

pub struct Terminal {
    saved_termios: libc::termios,
    read_buf: Vec<u8>,
    pending: usize,
}

impl Terminal {
    pub fn enable(enable_mouse_pixel_mode: bool) -> Result<Self, TerminalError> {
        let fd = std::io::stdin().as_raw_fd();
        let mut termios = unsafe { std::mem::zeroed::<libc::termios>() };
        if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
            return Err(TerminalError::RawMode(std::io::Error::last_os_error()));
        }
        let saved_termios = termios;

        let mut raw = termios;
        unsafe { libc::cfmakeraw(&mut raw) };
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(TerminalError::RawMode(std::io::Error::last_os_error()));
        }
        RAW_MODE_ACTIVE.store(true, Ordering::SeqCst);

        install_sigwinch_handler();

        let mut stdout = std::io::stdout();
        let _ = write!(
            stdout,
            "\x1b[?1006h{}\x1b[?2004h",
            if enable_mouse_pixel_mode {
                "\x1b[?1016h"
            } else {
                "\x1b[?1000h"
            }
        );
        let _ = stdout.flush();

        Ok(Self {
            saved_termios,
            read_buf: Vec::with_capacity(4096),
            pending: 0,
        })
    }

    pub fn size() -> Result<Size, TerminalError> {
        let fd = std::io::stdout().as_raw_fd();
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) } != 0 {
            return Err(TerminalError::WindowSize);
        }
        Ok(Size {
            cols: ws.ws_col as u32,
            rows: ws.ws_row as u32,
            width_px: ws.ws_xpixel as u32,
            height_px: ws.ws_ypixel as u32,
        })
    }

    /// Returns and clears the SIGWINCH-triggered resize flag. Level
    /// triggered: drained once per viewer iteration.
    pub fn take_resized(&self) -> bool {
        RESIZED.swap(false, Ordering::SeqCst)
    }

    /// Reads available bytes (non-blocking) and parses up to
    /// `MAX_EVENTS_PER_TICK` complete events.
    pub fn drain_events(&mut self) -> Vec<Input> {
        let mut out = Vec::new();
        self.fill_buffer();

        loop {
            if out.len() >= MAX_EVENTS_PER_TICK {
                break;
            }
            let (event, consumed) = input::parse_one(&self.read_buf[..self.pending]);
            if consumed == 0 {
                break;
            }
            self.read_buf.drain(..consumed);
            self.pending -= consumed;
            if !matches!(event, Input::None) {
                out.push(event);
            }
        }
        out
    }

    fn fill_buffer(&mut self) {
        let fd = std::io::stdin().as_raw_fd();
        let mut chunk = [0u8; 4096];
        loop {
            let rc = unsafe {
                libc::read(fd, chunk.as_mut_ptr() as *mut libc::c_void, chunk.len())
            };
            if rc > 0 {
                self.read_buf.extend_from_slice(&chunk[..rc as usize]);
                self.pending += rc as usize;
                if (rc as usize) < chunk.len() {
                    break;
                }
            } else if rc == 0 {
                break;
            } else {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                // EAGAIN/EWOULDBLOCK: no more data right now.
                break;
            }
        }
    }

    /// Guaranteed teardown: disables SGR mouse modes/bracketed paste, shows
    /// the cursor, resets SGR attributes, restores termios.
    pub fn restore(&self) {
        restore_inner(&self.saved_termios);
    }

    /// Called from the panic hook, where we may not have a live `Terminal`
    /// handle; best-effort restore using only global state.
    pub fn emergency_restore() {
        if !RAW_MODE_ACTIVE.load(Ordering::SeqCst) {
            return;
        }
        let mut stdout = std::io::stdout();
        let _ = write!(
            stdout,
            "\x1b[?1000l\x1b[?1006l\x1b[?1016l\x1b[?2004l\x1b[0m\x1b[?25h"
        );
        let _ = stdout.flush();
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.restore();
    }
}

fn restore_inner(saved: &libc::termios) {
    let fd = std::io::stdin().as_raw_fd();
    let mut stdout = std::io::stdout();
    let _ = write!(
        stdout,
        "\x1b[?1000l\x1b[?1006l\x1b[?1016l\x1b[?2004l\x1b[0m\x1b[?25h"
    );
    let _ = stdout.flush();
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, saved) } != 0 {
        warn!("failed to restore terminal attributes: {}", std::io::Error::last_os_error());
    }
    RAW_MODE_ACTIVE.store(false, Ordering::SeqCst);
}

extern "C" fn handle_sigwinch(_: libc::c_int) {
    RESIZED.store(true, Ordering::SeqCst);
}

fn install_sigwinch_handler() {
    unsafe {
        libc::signal(libc::SIGWINCH, handle_sigwinch as usize);
    }
}

/// Best-effort: treat EOF (zero-byte read) the same as `Input::None`, never
/// as a terminal-closed error by itself — only propagate fatal errors from
/// a genuine hard I/O failure on stdin (checked by callers that read).
pub fn stdin_is_closed() -> bool {
    let mut probe = [0u8; 0];
    std::io::stdin().read(&mut probe).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_struct_holds_all_fields() {
        let size = Size {
            cols: 80,
            rows: 24,
            width_px: 800,
            height_px: 480,
        };
        assert_eq!(size.cols, 80);
        assert_eq!(size.height_px, 480);
    }
}
