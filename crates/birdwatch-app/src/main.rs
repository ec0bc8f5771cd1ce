use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use birdwatch_app::terminal::{DEFAULT_DRAW_MILLIS, TerminalDashboard};
use birdwatch_app::settings::BACKEND_URL_ENV;
use birdwatch_app::{
    ClientSettings, HttpRemote, Orchestrator, create_command_bus, make_command_submit,
    spawn_command_loop,
};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "birdwatch",
    version,
    about = "Terminal dashboard for a remote bird migration simulation"
)]
struct Cli {
    /// Base URL of the simulation service (default http://localhost:8080).
    #[arg(long, env = BACKEND_URL_ENV)]
    backend_url: Option<String>,

    /// Snapshot poll cadence in milliseconds while the run is active.
    /// Falls back to BIRDWATCH_POLL_MS, then 100. A bad environment value is
    /// warned about and ignored rather than rejected.
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,

    /// Depth of the operator command queue.
    #[arg(long, default_value_t = 64)]
    command_capacity: usize,

    /// Dashboard redraw cadence in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DRAW_MILLIS)]
    draw_ms: u64,
}

impl Cli {
    fn settings(&self) -> ClientSettings {
        let mut settings = ClientSettings::from_env();
        if let Some(url) = self.backend_url.as_deref().map(str::trim)
            && !url.is_empty()
        {
            settings = settings.with_backend_url(url);
        }
        if let Some(ms) = self.poll_ms.filter(|ms| *ms > 0) {
            settings.poll_interval = Duration::from_millis(ms);
        }
        settings.request_timeout = Duration::from_secs(self.timeout_secs.max(1));
        settings
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(!TerminalDashboard::headless_requested());

    let settings = cli.settings();
    let remote =
        Arc::new(HttpRemote::from_settings(&settings).context("failed to build HTTP client")?);
    info!(
        backend = %settings.backend_url,
        poll_ms = settings.poll_interval.as_millis() as u64,
        "Starting Birdwatch dashboard"
    );

    let orchestrator = Orchestrator::new(remote, settings);
    orchestrator.mount().await;

    let (sender, receiver) = create_command_bus(cli.command_capacity);
    let command_loop = spawn_command_loop(orchestrator.clone(), receiver);
    let submit = make_command_submit(sender);

    let draw_interval = Duration::from_millis(cli.draw_ms.max(10));
    let result = TerminalDashboard::with_draw_interval(draw_interval)
        .run(orchestrator.clone(), submit)
        .await;

    orchestrator.shutdown();
    command_loop.abort();
    info!("Birdwatch dashboard closed");
    result
}

/// The interactive dashboard owns stdout, so it only logs (to stderr) when
/// `RUST_LOG` asks for it.
fn init_tracing(interactive: bool) {
    if interactive && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn backend_url_flag_reads_the_environment() {
        let command = Cli::command();
        let arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == "backend_url")
            .expect("backend_url flag");
        assert_eq!(
            arg.get_env().and_then(|name| name.to_str()),
            Some(BACKEND_URL_ENV)
        );
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from([
            "birdwatch",
            "--backend-url",
            "http://sim.local:9000",
            "--poll-ms",
            "250",
            "--timeout-secs",
            "0",
        ])
        .expect("valid flags");
        let settings = cli.settings();
        assert_eq!(settings.backend_url, "http://sim.local:9000");
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.request_timeout, Duration::from_secs(1));
    }
}
