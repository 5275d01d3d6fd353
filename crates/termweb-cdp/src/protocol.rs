//! Thin, typed wrappers around the frozen CDP method subset (§6). These
//! build the `params` JSON object by hand instead of depending on a
//! generated CDP types crate — the point of C4 is to own this narrow
//! surface directly.

use serde_json::{Value, json};

use crate::client::CdpClient;
use crate::error::CdpError;

pub fn navigate(client: &CdpClient, url: &str) -> Result<(), CdpError> {
    client.send_command("Page.navigate", json!({ "url": url }))?;
    Ok(())
}

pub fn reload(client: &CdpClient, ignore_cache: bool) -> Result<(), CdpError> {
    client.send_command("Page.reload", json!({ "ignoreCache": ignore_cache }))?;
    Ok(())
}

pub fn go_back(client: &CdpClient) -> Result<(), CdpError> {
    client.send_command("Page.goBack", Value::Null)?;
    Ok(())
}

pub fn go_forward(client: &CdpClient) -> Result<(), CdpError> {
    client.send_command("Page.goForward", Value::Null)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NavigationHistory {
    pub current_index: i64,
    pub can_go_back: bool,
    pub can_go_forward: bool,
}

pub fn get_navigation_history(client: &CdpClient) -> Result<NavigationHistory, CdpError> {
    let result = client.send_command("Page.getNavigationHistory", Value::Null)?;
    let current_index = result.get("currentIndex").and_then(Value::as_i64).unwrap_or(0);
    let count = result
        .get("entries")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0) as i64;
    Ok(NavigationHistory {
        current_index,
        can_go_back: current_index > 0,
        can_go_forward: current_index + 1 < count,
    })
}

pub fn set_device_metrics_override(
    client: &CdpClient,
    width: u32,
    height: u32,
    device_scale_factor: f64,
    mobile: bool,
) -> Result<(), CdpError> {
    client.send_command(
        "Emulation.setDeviceMetricsOverride",
        json!({
            "width": width,
            "height": height,
            "deviceScaleFactor": device_scale_factor,
            "mobile": mobile,
        }),
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct ScreencastOptions {
    pub format: crate::screencast::ScreencastFormat,
    pub quality: u8,
    pub every_nth_frame: u32,
    pub max_width: u32,
    pub max_height: u32,
}

pub fn start_screencast(client: &CdpClient, opts: ScreencastOptions) -> Result<(), CdpError> {
    client.send_command(
        "Page.startScreencast",
        json!({
            "format": opts.format.as_cdp_str(),
            "quality": opts.quality,
            "everyNthFrame": opts.every_nth_frame,
            "maxWidth": opts.max_width,
            "maxHeight": opts.max_height,
        }),
    )?;
    Ok(())
}

pub fn stop_screencast(client: &CdpClient) -> Result<(), CdpError> {
    client.send_command("Page.stopScreencast", Value::Null)?;
    Ok(())
}

pub fn handle_javascript_dialog(
    client: &CdpClient,
    accept: bool,
    prompt_text: Option<&str>,
) -> Result<(), CdpError> {
    let mut params = json!({ "accept": accept });
    if let Some(text) = prompt_text {
        params["promptText"] = json!(text);
    }
    client.send_command("Page.handleJavaScriptDialog", params)?;
    Ok(())
}

pub fn handle_file_chooser(
    client: &CdpClient,
    action: &str,
    files: &[String],
) -> Result<(), CdpError> {
    client.send_command(
        "Page.handleFileChooser",
        json!({ "action": action, "files": files }),
    )?;
    Ok(())
}

pub fn runtime_enable(client: &CdpClient) -> Result<(), CdpError> {
    client.send_command("Runtime.enable", Value::Null)?;
    Ok(())
}

pub fn runtime_evaluate(client: &CdpClient, expression: &str) -> Result<Value, CdpError> {
    client.send_command(
        "Runtime.evaluate",
        json!({ "expression": expression, "returnByValue": true }),
    )
}

pub fn set_download_behavior(client: &CdpClient, behavior: &str, path: Option<&str>) -> Result<(), CdpError> {
    let mut params = json!({ "behavior": behavior });
    if let Some(path) = path {
        params["downloadPath"] = json!(path);
    }
    client.send_command("Browser.setDownloadBehavior", params)?;
    Ok(())
}
