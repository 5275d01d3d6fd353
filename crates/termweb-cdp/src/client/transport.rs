//! The narrow transport interface C4 is built on. Two implementations share
//! it — a NUL-framed pipe over Chromium's fds 3/4, and a text-framed
//! WebSocket — so the reader thread and command dispatch never know which
//! one they are talking to.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::CdpError;

/// One full-duplex CDP connection. Implementations must allow `send_frame`
/// and `recv_frame` to be called concurrently from different threads
/// (the viewer thread writes, the dedicated reader thread reads).
pub trait Transport: Send + Sync {
    /// Write one complete message (already-serialised JSON, no frame
    /// terminator) to the peer.
    fn send_frame(&self, payload: &[u8]) -> Result<(), CdpError>;

    /// Block up to a short, implementation-defined poll interval for the
    /// next complete message. Returns `Ok(None)` on a read timeout so the
    /// reader thread can check its shutdown flag between frames.
    fn recv_frame(&self) -> Result<Option<Vec<u8>>, CdpError>;

    /// Best-effort shutdown; unblocks any in-progress `recv_frame`.
    fn close(&self);
}

/// Pipe transport: Chromium is launched with `--remote-debugging-pipe`,
/// wiring its fd 3 (Chrome → us) and fd 4 (us → Chrome) to inherited pipe
/// ends. Frames are NUL-terminated JSON, per the CDP pipe protocol.
pub struct PipeTransport {
    write_end: Mutex<std::fs::File>,
    read_end: Mutex<std::fs::File>,
    read_buf: Mutex<Vec<u8>>,
}

impl PipeTransport {
    pub fn new(write_end: std::fs::File, read_end: std::fs::File) -> Result<Self, CdpError> {
        set_nonblocking(&read_end)?;
        Ok(Self {
            write_end: Mutex::new(write_end),
            read_end: Mutex::new(read_end),
            read_buf: Mutex::new(Vec::with_capacity(64 * 1024)),
        })
    }
}

#[cfg(unix)]
fn set_nonblocking(file: &std::fs::File) -> Result<(), CdpError> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    // SAFETY: fd is a valid, open file descriptor owned by `file`.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(CdpError::Io(std::io::Error::last_os_error()));
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(CdpError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_nonblocking(_file: &std::fs::File) -> Result<(), CdpError> {
    Ok(())
}

impl Transport for PipeTransport {
    fn send_frame(&self, payload: &[u8]) -> Result<(), CdpError> {
        let mut write_end = self
            .write_end
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        write_end.write_all(payload)?;
        write_end.write_all(b"\0")?;
        write_end.flush()?;
        Ok(())
    }

    fn recv_frame(&self) -> Result<Option<Vec<u8>>, CdpError> {
        let mut buf = self
            .read_buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(pos) = buf.iter().position(|&b| b == 0) {
            let frame = buf[..pos].to_vec();
            buf.drain(..=pos);
            return Ok(Some(frame));
        }

        let mut read_end = self
            .read_end
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut chunk = [0u8; 8192];
        match read_end.read(&mut chunk) {
            Ok(0) => Err(CdpError::TransportClosed),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.iter().position(|&b| b == 0) {
                    let frame = buf[..pos].to_vec();
                    buf.drain(..=pos);
                    Ok(Some(frame))
                } else {
                    Ok(None)
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(CdpError::Io(e)),
        }
    }

    fn close(&self) {
        // Dropping the file handles signals EOF to Chrome; nothing else to do.
    }
}

/// WebSocket transport for attaching to a Chrome instance via its
/// `--remote-debugging-port`. The underlying TCP stream is inherently
/// full-duplex over one socket, so reads and writes share one lock; a short
/// read timeout on the stream keeps that lock from starving writers for
/// more than a tick (see DESIGN.md).
pub struct WebSocketTransport {
    socket: Mutex<tungstenite::WebSocket<std::net::TcpStream>>,
}

impl WebSocketTransport {
    pub fn connect(url: &str) -> Result<Self, CdpError> {
        let parsed = url::Url::parse(url).map_err(|e| CdpError::Discovery(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CdpError::Discovery("websocket url has no host".to_string()))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| CdpError::Discovery("websocket url has no port".to_string()))?;
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        stream.set_nodelay(true).ok();
        let (socket, _response) = tungstenite::client(parsed, stream)
            .map_err(|e| CdpError::WebSocket(e.to_string()))?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

impl Transport for WebSocketTransport {
    fn send_frame(&self, payload: &[u8]) -> Result<(), CdpError> {
        let mut socket = self
            .socket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let text = String::from_utf8_lossy(payload).into_owned();
        socket
            .send(tungstenite::Message::Text(text))
            .map_err(|e| CdpError::WebSocket(e.to_string()))
    }

    fn recv_frame(&self) -> Result<Option<Vec<u8>>, CdpError> {
        let mut socket = self
            .socket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match socket.read() {
            Ok(tungstenite::Message::Text(text)) => Ok(Some(text.into_bytes())),
            Ok(tungstenite::Message::Binary(bytes)) => Ok(Some(bytes)),
            Ok(tungstenite::Message::Close(_)) => Err(CdpError::TransportClosed),
            Ok(_other) => Ok(None),
            Err(tungstenite::Error::Io(e))
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(CdpError::WebSocket(e.to_string())),
        }
    }

    fn close(&self) {
        let mut socket = self
            .socket
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = socket.close(None);
    }
}
