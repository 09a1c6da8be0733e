use clap::Parser;
use patchrss_core::PatchConfig;
use patchrss_gateway::PatchServer;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "patchrss", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (missing file means defaults)
    #[arg(short, long, env = "PATCHRSS_CONFIG", default_value = "patchrss.toml")]
    config: String,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Authority this gateway is reachable at, used for loop detection
    #[arg(long)]
    self_host: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "PATCHRSS_LOG_JSON")]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json().flatten_event(true)).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = PatchConfig::load_or_default(&args.config);
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(self_host) = args.self_host {
        config.server.self_host = self_host;
    }

    info!(
        "Starting patchrss (fetch timeout {}ms, request timeout {}ms, policy {:?})",
        config.fetch.timeout_ms, config.server.request_timeout_ms, config.fetch.network_policy
    );

    let server = PatchServer::new(&config)?;
    server.serve().await
}
