//! pagerd — the pager API server daemon.
//!
//! Initializes the API registry, completes the server configuration,
//! assembles the server, and serves until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! pagerd serve --bind 0.0.0.0:8443 --data-dir /var/lib/pager
//! pagerd serve --in-memory --enabled-versions pager.k8s.co/v1beta1
//! ```

mod serve;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,pagerd=debug,pager=debug";

#[derive(Parser)]
#[command(name = "pagerd", about = "Pager API server")]
struct Cli {
    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the pager API.
    Serve(serve::ServeArgs),
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => {
            let settings = serve::ServeSettings::load(&args)?;
            serve::run(settings).await
        }
    }
}
