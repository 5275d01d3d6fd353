use anyhow::Context;
use clap::Parser;
use termweb_cdp::config::{BrowserConfig, ConnectMode};
use tracing::info;

/// Renders a headless Chromium tab inside a Kitty-graphics-capable terminal.
#[derive(Parser, Debug)]
#[command(name = "termweb", version)]
struct Cli {
    /// URL to open on start.
    #[arg(default_value = "about:blank")]
    url: String,

    /// Attach to an already-running Chrome instance instead of spawning one.
    #[arg(long)]
    connect: Option<String>,

    /// Allow the virtual filesystem bridge to expose this directory to the page.
    #[arg(long = "allow-fs")]
    allow_fs: Vec<std::path::PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = termweb::Options::from_env(cli.url.clone());

    let _log_guard = termweb::logging::init_tracing(&options);
    termweb::logging::install_panic_hook();

    let connect = match (&cli.connect, options.connect_host.as_deref(), options.connect_port) {
        (Some(url), _, _) => ConnectMode::AttachWs { url: url.clone() },
        (None, Some(host), Some(port)) => ConnectMode::AttachPort { host: host.to_string(), port },
        _ => ConnectMode::SpawnPipe { chrome_bin: options.chrome_bin.clone() },
    };

    let browser_config = BrowserConfig {
        connect,
        ..BrowserConfig::default()
    };

    info!(url = %cli.url, "starting termweb");
    let chrome = termweb_cdp::launch(&browser_config).context("launching chromium")?;
    let client = chrome.client.clone();

    client
        .send_command("Page.enable", serde_json::json!({}))
        .context("Page.enable")?;
    termweb_cdp::protocol::runtime_enable(&client).context("Runtime.enable")?;
    termweb_cdp::protocol::navigate(&client, &cli.url).context("initial navigation")?;

    let size = termweb::terminal::Terminal::size().context("reading terminal size")?;
    let shm_enabled = options.force_shm.unwrap_or_else(termweb::kitty::shm_supported);
    let screencast_opts =
        termweb::viewer::screencast_options_for(size.width_px.max(1), size.height_px.max(1), shm_enabled);
    termweb_cdp::protocol::start_screencast(&client, screencast_opts).context("starting screencast")?;

    let mut viewer = termweb::Viewer::new(client, options, cli.allow_fs).context("starting viewer")?;
    viewer.run().context("viewer loop")?;

    Ok(())
}
