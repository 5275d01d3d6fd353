//! Builds `Input.dispatchKeyEvent` / `Input.dispatchMouseEvent` param blobs.
//! Used by termweb's C7 (mouse bus) and C8 (input router); kept here so the
//! CDP method names and modifier-mask encoding live next to the client that
//! owns the wire format.

use serde_json::{Value, json};

use crate::client::CdpClient;
use crate::error::CdpError;

/// Modifier bitmask per §4.8: `1=Alt, 2=Ctrl, 4=Meta, 8=Shift`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn as_mask(self) -> u8 {
        (self.alt as u8) | ((self.ctrl as u8) << 1) | ((self.meta as u8) << 2) | ((self.shift as u8) << 3)
    }
}

/// One row of the deterministic key → (code, text, virtual key code) table.
/// Shift never changes `code`, only the reported `text` — callers supply
/// the already-shifted text separately when relevant.
pub fn key_code_for(key: &str) -> (&'static str, Option<&'static str>, Option<i64>) {
    match key {
        "Enter" => ("Enter", Some("\r"), Some(13)),
        "Tab" => ("Tab", Some("\t"), Some(9)),
        "Escape" => ("Escape", None, Some(27)),
        "Backspace" => ("Backspace", None, Some(8)),
        "Delete" => ("Delete", None, Some(46)),
        "ArrowUp" => ("ArrowUp", None, Some(38)),
        "ArrowDown" => ("ArrowDown", None, Some(40)),
        "ArrowLeft" => ("ArrowLeft", None, Some(37)),
        "ArrowRight" => ("ArrowRight", None, Some(39)),
        "Home" => ("Home", None, Some(36)),
        "End" => ("End", None, Some(35)),
        "PageUp" => ("PageUp", None, Some(33)),
        "PageDown" => ("PageDown", None, Some(34)),
        "Space" => ("Space", Some(" "), Some(32)),
        _ => ("", None, None),
    }
}

pub fn dispatch_key_event(
    client: &CdpClient,
    kind: &str,
    key: &str,
    code: &str,
    text: Option<&str>,
    modifiers: Modifiers,
    windows_virtual_key_code: Option<i64>,
) -> Result<(), CdpError> {
    let mut params = json!({
        "type": kind,
        "key": key,
        "code": code,
        "modifiers": modifiers.as_mask(),
    });
    if let Some(text) = text {
        params["text"] = json!(text);
    }
    if let Some(vk) = windows_virtual_key_code {
        params["windowsVirtualKeyCode"] = json!(vk);
        params["nativeVirtualKeyCode"] = json!(vk);
    }
    client.send_command("Input.dispatchKeyEvent", params)?;
    Ok(())
}

pub fn press_key(client: &CdpClient, key: &str, modifiers: Modifiers) -> Result<(), CdpError> {
    let (code, text, vk) = key_code_for(key);
    let code = if code.is_empty() { key } else { code };
    dispatch_key_event(client, "keyDown", key, code, None, modifiers, vk)?;
    if let Some(text) = text {
        dispatch_key_event(client, "char", key, code, Some(text), modifiers, vk)?;
    }
    dispatch_key_event(client, "keyUp", key, code, None, modifiers, vk)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    None,
    Left,
    Middle,
    Right,
}

impl MouseButton {
    fn as_cdp_str(self) -> &'static str {
        match self {
            MouseButton::None => "none",
            MouseButton::Left => "left",
            MouseButton::Middle => "middle",
            MouseButton::Right => "right",
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub fn dispatch_mouse_event(
    client: &CdpClient,
    kind: &str,
    x: f64,
    y: f64,
    button: MouseButton,
    click_count: Option<u32>,
    delta_x: Option<f64>,
    delta_y: Option<f64>,
    modifiers: Modifiers,
) -> Result<Value, CdpError> {
    let mut params = json!({
        "type": kind,
        "x": x,
        "y": y,
        "button": button.as_cdp_str(),
        "modifiers": modifiers.as_mask(),
    });
    if let Some(count) = click_count {
        params["clickCount"] = json!(count);
    }
    if let Some(dx) = delta_x {
        params["deltaX"] = json!(dx);
    }
    if let Some(dy) = delta_y {
        params["deltaY"] = json!(dy);
    }
    client.send_command("Input.dispatchMouseEvent", params)
}
