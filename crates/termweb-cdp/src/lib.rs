//! Synchronous Chrome DevTools Protocol client: C4 (client + reader thread),
//! C5 (screencast pipeline), C6 (coordinate mapper), plus the launcher (C15)
//! that owns spawning or attaching to a Chromium instance.
//!
//! Deliberately not async: one dedicated OS thread reads frames off the
//! transport and demultiplexes them into command replies, events, and
//! screencast frames; callers block on `CdpClient::send_command` from
//! whatever loop they run.

pub mod client;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod input_dispatch;
pub mod launch;
pub mod protocol;
pub mod screencast;

pub use client::{CdpClient, CdpEvent, PipeTransport, Transport, WebSocketTransport};
pub use config::{BrowserConfig, ConnectMode, ViewportConfig};
pub use coordinate::{CoordinateMapper, MouseCoordMode, TerminalGeometry};
pub use error::CdpError;
pub use launch::{ChromeProcess, launch};
pub use screencast::{
    ScreencastFormat, ScreencastFrame, ScreencastRing, fps_for_pixels, quality_tier, quality_tier_for_pixels,
};
