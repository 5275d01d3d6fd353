//! C12 — tracing subscriber setup and the panic hook that guarantees the
//! terminal is restored before the default panic message prints.

use tracing_subscriber::EnvFilter;

use crate::config::Options;
use crate::terminal::Terminal;

const DEFAULT_FILTER: &str = "termweb=info,termweb_cdp=info";

/// Stderr would otherwise land directly in the same terminal the viewer is
/// drawing Kitty graphics into, so log output is always routed to a file
/// when `TERMWEB_LOG_FILE` names one; a bare filename is treated as a
/// directory of daily-rotated logs, same as `tracing_appender::rolling`.
pub fn init_tracing(options: &Options) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let mut filter = EnvFilter::try_from_env("TERMWEB_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if options.debug_input {
        filter = filter.add_directive("termweb::terminal=trace".parse().expect("valid directive"));
    }

    match &options.log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("termweb.log"));
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Installs a panic hook that restores the terminal (disables raw mode,
/// shows the cursor, resets SGR) before delegating to the default hook, so a
/// panic never leaves the user's shell in raw mode.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        Terminal::emergency_restore();
        default_hook(info);
    }));
}
