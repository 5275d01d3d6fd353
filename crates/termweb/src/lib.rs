//! termweb — renders a headless Chromium tab inside a graphics-capable
//! terminal and forwards keyboard/mouse/clipboard/file-picker input back to
//! the page, driven entirely from a single cooperative viewer loop.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod form_mode;
pub mod input_router;
pub mod kitty;
pub mod logging;
pub mod mouse_bus;
pub mod picker;
pub mod terminal;
pub mod toolbar;
pub mod vfs_bridge;
pub mod viewer;

pub use config::Options;
pub use error::TermwebError;
pub use viewer::Viewer;
