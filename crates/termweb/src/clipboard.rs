//! Thin `arboard` wrapper for the URL bar's cut/copy/paste. Clipboard
//! access is inherently best-effort on headless/Wayland-without-portal
//! setups, so failures here are swallowed rather than surfaced.

use tracing::debug;

pub fn set_text(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(err) = clipboard.set_text(text) {
                debug!(%err, "clipboard write failed");
            }
        }
        Err(err) => debug!(%err, "clipboard unavailable"),
    }
}

pub fn get_text() -> Option<String> {
    let mut clipboard = arboard::Clipboard::new()
        .inspect_err(|err| debug!(%err, "clipboard unavailable"))
        .ok()?;
    clipboard
        .get_text()
        .inspect_err(|err| debug!(%err, "clipboard read failed"))
        .ok()
}
