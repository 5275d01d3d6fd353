//! C13 — per-component error enums plus the crate-level aggregate the
//! viewer binary actually propagates.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("failed to enable raw mode: {0}")]
    RawMode(#[from] std::io::Error),
    #[error("terminal closed")]
    Closed,
    #[error("ioctl TIOCGWINSZ failed")]
    WindowSize,
}

#[derive(Debug, Error)]
pub enum KittyError {
    #[error("failed to write graphics escape sequence: {0}")]
    Write(#[from] std::io::Error),
    #[error("image payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

#[derive(Debug, Error)]
pub enum ShmError {
    #[error("shm_open failed: {0}")]
    Open(std::io::Error),
    #[error("mmap failed: {0}")]
    Map(std::io::Error),
    #[error("shm segment too small for {0}x{1} rgba buffer")]
    TooSmall(u32, u32),
}

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("path {0:?} is not under any allow-listed root")]
    NotAllowed(PathBuf),
    #[error("path {0:?} contains a parent-directory component")]
    TraversalRejected(PathBuf),
    #[error("file exceeds the 100 MiB read ceiling: {0:?}")]
    TooLarge(PathBuf),
    #[error("malformed fs bridge marker: {0}")]
    MalformedMarker(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("no GUI session detected")]
    NoDisplay,
    #[error("picker command failed: {0}")]
    CommandFailed(String),
    #[error("picker cancelled by user")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum TermwebError {
    #[error(transparent)]
    Cdp(#[from] termweb_cdp::CdpError),
    #[error(transparent)]
    Terminal(#[from] TerminalError),
    #[error(transparent)]
    Kitty(#[from] KittyError),
    #[error(transparent)]
    Shm(#[from] ShmError),
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error(transparent)]
    Picker(#[from] PickerError),
}
