//! C15 — spawns Chromium (pipe transport) or discovers + attaches to an
//! already-running instance (WebSocket transport).

use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::client::{CdpClient, PipeTransport, Transport, WebSocketTransport};
use crate::config::{BrowserConfig, ConnectMode};
use crate::error::CdpError;

/// Chrome launch flags shared across pipe/port modes (§6). Kept minimal:
/// enough to get a stable, automatable headless instance without pulling in
/// every hardening flag the teacher's full product carries (profile
/// fingerprinting resistance, proxy plumbing, etc. are out of scope here).
const BASE_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-component-extensions-with-background-pages",
    "--disable-background-networking",
    "--disable-hang-monitor",
    "--disable-background-timer-throttling",
];

pub struct ChromeProcess {
    pub child: Option<std::process::Child>,
    pub client: Arc<CdpClient>,
    pub user_data_dir: Option<std::path::PathBuf>,
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub fn launch(config: &BrowserConfig) -> Result<ChromeProcess, CdpError> {
    match &config.connect {
        ConnectMode::SpawnPipe { chrome_bin } => spawn_pipe(config, chrome_bin.as_deref()),
        ConnectMode::AttachPort { host, port } => attach_port(config, host, *port),
        ConnectMode::AttachWs { url } => attach_ws(config, url),
    }
}

fn resolve_chrome_bin(explicit: Option<&std::path::Path>) -> std::path::PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    if let Ok(env_bin) = std::env::var("CHROME_BIN") {
        return std::path::PathBuf::from(env_bin);
    }
    for candidate in ["google-chrome", "chromium", "chromium-browser", "google-chrome-stable"] {
        if which_binary(candidate).is_some() {
            return std::path::PathBuf::from(candidate);
        }
    }
    std::path::PathBuf::from("chromium")
}

fn which_binary(name: &str) -> Option<std::path::PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
fn spawn_pipe(
    config: &BrowserConfig,
    chrome_bin: Option<&std::path::Path>,
) -> Result<ChromeProcess, CdpError> {
    use std::os::fd::AsRawFd;
    use std::os::unix::process::CommandExt;

    let bin = resolve_chrome_bin(chrome_bin);
    let (our_read, their_write) = pipe_pair()?;
    let (their_read, our_write) = pipe_pair()?;

    let user_data_dir = config.user_data_dir.clone().unwrap_or_else(|| {
        std::env::temp_dir().join(format!("termweb-profile-{}", std::process::id()))
    });

    let mut cmd = Command::new(&bin);
    cmd.arg(format!("--user-data-dir={}", user_data_dir.display()))
        .arg("--remote-debugging-pipe")
        .arg(format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ))
        .args(BASE_FLAGS)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if config.headless {
        cmd.arg("--headless=new");
    }

    // fd 3 = Chrome's read end (our write end dup'd there), fd 4 = Chrome's
    // write end (our read end dup'd there), matching the documented
    // DevTools pipe contract.
    let their_read_fd = their_read.as_raw_fd();
    let their_write_fd = their_write.as_raw_fd();
    unsafe {
        cmd.pre_exec(move || {
            let dup3 = |src: i32, dst: i32| -> std::io::Result<()> {
                if libc::dup2(src, dst) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            };
            dup3(their_read_fd, 3)?;
            dup3(their_write_fd, 4)?;
            Ok(())
        });
    }

    info!(bin = %bin.display(), "launching chromium over pipe");
    let child = cmd.spawn().map_err(|e| CdpError::Launch(e.to_string()))?;
    drop(their_read);
    drop(their_write);

    let write_file: std::fs::File = our_write.into();
    let read_file: std::fs::File = our_read.into();
    let transport: Arc<dyn Transport> = Arc::new(PipeTransport::new(write_file, read_file)?);
    let client = Arc::new(CdpClient::start(transport, config.command_timeout)?);

    Ok(ChromeProcess {
        child: Some(child),
        client,
        user_data_dir: Some(user_data_dir),
    })
}

#[cfg(unix)]
fn pipe_pair() -> Result<(std::os::fd::OwnedFd, std::os::fd::OwnedFd), CdpError> {
    use std::os::fd::FromRawFd;
    let mut fds = [0i32; 2];
    let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if rc < 0 {
        return Err(CdpError::Io(std::io::Error::last_os_error()));
    }
    // SAFETY: pipe(2) just returned these two fresh, valid descriptors.
    unsafe {
        Ok((
            std::os::fd::OwnedFd::from_raw_fd(fds[0]),
            std::os::fd::OwnedFd::from_raw_fd(fds[1]),
        ))
    }
}

#[cfg(not(unix))]
fn spawn_pipe(
    _config: &BrowserConfig,
    _chrome_bin: Option<&std::path::Path>,
) -> Result<ChromeProcess, CdpError> {
    Err(CdpError::Launch(
        "pipe transport is only supported on unix targets".to_string(),
    ))
}

#[derive(Deserialize)]
struct JsonVersion {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

fn discover_ws(host: &str, port: u16) -> Result<String, CdpError> {
    let url = format!("http://{host}:{port}/json/version");
    debug!(%url, "discovering chrome debugger websocket url");
    let client = reqwest::blocking::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| CdpError::Discovery(e.to_string()))?;
    let resp = client
        .get(&url)
        .send()
        .map_err(|e| CdpError::Discovery(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(CdpError::Discovery(format!(
            "chrome /json/version returned {}",
            resp.status()
        )));
    }
    let body: JsonVersion = resp.json().map_err(|e| CdpError::Discovery(e.to_string()))?;
    Ok(body.web_socket_debugger_url)
}

fn attach_port(config: &BrowserConfig, host: &str, port: u16) -> Result<ChromeProcess, CdpError> {
    let mut last_err = None;
    for attempt in 1..=10 {
        match discover_ws(host, port) {
            Ok(url) => return attach_ws(config, &url),
            Err(e) => {
                warn!(attempt, "websocket discovery failed: {e}");
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(300));
            }
        }
    }
    Err(last_err.unwrap_or_else(|| CdpError::Discovery("no attempts made".to_string())))
}

fn attach_ws(config: &BrowserConfig, url: &str) -> Result<ChromeProcess, CdpError> {
    info!(%url, "attaching to chrome over websocket");
    let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::connect(url)?);
    let client = Arc::new(CdpClient::start(transport, config.command_timeout)?);
    Ok(ChromeProcess {
        child: None,
        client,
        user_data_dir: None,
    })
}
