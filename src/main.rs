//! CLI entry point.

use clap::Parser;

use mcp_bridge::cli::Args;
use mcp_bridge::config::ProxyConfig;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match ProxyConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("mcp-bridge: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = mcp_bridge::run(config).await {
        tracing::error!(error = %e, "fatal error");
        eprintln!("mcp-bridge: {e}");
        std::process::exit(1);
    }
}

/// Initialise the tracing subscriber with stderr output. `--verbose` forces
/// the `debug` level; otherwise `RUST_LOG` is respected.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
