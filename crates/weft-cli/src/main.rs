//! Weft - thread-bound document databases from the command line

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weft_cli::{AppState, CliConfig, Command};

#[derive(Parser, Debug)]
#[command(name = "weft")]
#[command(about = "Thread-bound document databases")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short = 'D', long, default_value = ".weft", env = "WEFT_DATA_DIR", global = true)]
    data_dir: PathBuf,

    /// Multiaddr this host is reachable at (repeatable, or comma separated)
    #[arg(long = "host-addr", env = "WEFT_HOST_ADDR", value_delimiter = ',', global = true)]
    host_addrs: Vec<String>,

    /// Abort the command after this many seconds
    #[arg(long, env = "WEFT_TIMEOUT", global = true)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, env = "WEFT_DEBUG", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr; stdout carries the JSON output
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "weft_cli={0},weft_db={0},weft_net={0},weft_store={0}",
                log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let output = match args.command {
        Command::Id(command) => weft_cli::run_id(command)?,
        command => {
            let config = CliConfig {
                data_dir: args.data_dir,
                host_addrs: args.host_addrs,
                timeout_secs: args.timeout,
                debug: args.debug,
            };

            let state = AppState::open(config).await?;
            let result = weft_cli::run(&state, command).await;
            state.close().await?;
            result?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
