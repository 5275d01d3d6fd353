//! C14 — the `Options` configuration surface. No CLI parser lives here
//! (out of scope); a caller builds this directly or via `from_env`.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Options {
    pub initial_url: String,
    pub fps_cap: Option<u32>,
    pub show_toolbar: bool,
    pub disable_hotkeys: bool,
    pub disable_hints: bool,
    pub chrome_bin: Option<PathBuf>,
    pub force_shm: Option<bool>,
    pub natural_scroll: Option<bool>,
    pub debug_input: bool,
    pub connect_host: Option<String>,
    pub connect_port: Option<u16>,
    pub log_file: Option<PathBuf>,
}

impl Options {
    pub fn from_env(initial_url: String) -> Self {
        Self {
            initial_url,
            fps_cap: env_u32("TERMWEB_FPS_CAP"),
            show_toolbar: true,
            disable_hotkeys: false,
            disable_hints: false,
            chrome_bin: std::env::var_os("CHROME_BIN").map(PathBuf::from),
            force_shm: env_force_shm(),
            natural_scroll: env_bool("TERMWEB_NATURAL_SCROLL"),
            debug_input: env_flag("TERMWEB_DEBUG_INPUT"),
            connect_host: std::env::var("TERMWEB_CONNECT_HOST").ok(),
            connect_port: env_u16("TERMWEB_CONNECT_PORT"),
            log_file: std::env::var_os("TERMWEB_LOG_FILE").map(PathBuf::from),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).map(|v| v == "1").unwrap_or(false)
}

fn env_bool(name: &str) -> Option<bool> {
    match std::env::var(name).ok()?.as_str() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_u16(name: &str) -> Option<u16> {
    std::env::var(name).ok()?.parse().ok()
}

/// `TERMWEB_FORCE_SHM=1` wins over `TERMWEB_DISABLE_SHM=1` if both are set.
fn env_force_shm() -> Option<bool> {
    if env_flag("TERMWEB_FORCE_SHM") {
        Some(true)
    } else if env_flag("TERMWEB_DISABLE_SHM") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_applies_defaults_when_unset() {
        for var in [
            "TERMWEB_FPS_CAP",
            "CHROME_BIN",
            "TERMWEB_FORCE_SHM",
            "TERMWEB_DISABLE_SHM",
            "TERMWEB_NATURAL_SCROLL",
            "TERMWEB_DEBUG_INPUT",
            "TERMWEB_CONNECT_HOST",
            "TERMWEB_CONNECT_PORT",
            "TERMWEB_LOG_FILE",
        ] {
            unsafe { std::env::remove_var(var) };
        }
        let opts = Options::from_env("https://example.com".to_string());
        assert_eq!(opts.fps_cap, None);
        assert!(opts.show_toolbar);
        assert_eq!(opts.force_shm, None);
        assert_eq!(opts.log_file, None);
    }

    #[test]
    #[serial]
    fn force_shm_wins_over_disable() {
        unsafe {
            std::env::set_var("TERMWEB_FORCE_SHM", "1");
            std::env::set_var("TERMWEB_DISABLE_SHM", "1");
        }
        let opts = Options::from_env("about:blank".to_string());
        assert_eq!(opts.force_shm, Some(true));
        unsafe {
            std::env::remove_var("TERMWEB_FORCE_SHM");
            std::env::remove_var("TERMWEB_DISABLE_SHM");
        }
    }
}
