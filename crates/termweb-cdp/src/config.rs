use std::path::PathBuf;

/// Viewport dimensions requested at launch and applied via
/// `Emulation.setDeviceMetricsOverride`.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            device_scale_factor: 1.0,
            mobile: false,
        }
    }
}

/// How to obtain a Chrome DevTools connection: spawn our own Chromium on a
/// pipe, or attach to an already-running instance via its debug port.
#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Spawn Chromium ourselves and talk over fds 3/4.
    SpawnPipe { chrome_bin: Option<PathBuf> },
    /// Discover `ws://host:port/devtools/browser/...` and connect over it.
    AttachPort { host: String, port: u16 },
    /// Connect directly to a known websocket debugger URL.
    AttachWs { url: String },
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub connect: ConnectMode,
    pub viewport: ViewportConfig,
    pub headless: bool,
    pub user_data_dir: Option<PathBuf>,
    pub persist_profile: bool,
    pub command_timeout: std::time::Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            connect: ConnectMode::SpawnPipe { chrome_bin: None },
            viewport: ViewportConfig::default(),
            headless: true,
            user_data_dir: None,
            persist_profile: false,
            command_timeout: std::time::Duration::from_secs(10),
        }
    }
}
