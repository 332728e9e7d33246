use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod loopback;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley CLI - replay gateway events through the conversation router", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event script and print the resulting conversations
    Replay {
        /// File with one raw gateway event or UI command per line
        #[arg(long)]
        events: PathBuf,
        /// Router config (defaults to ~/.config/parley/router.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Agent id of the logged-in user
        #[arg(long)]
        self_id: Option<Uuid>,
        /// Name of the logged-in user
        #[arg(long, default_value = "Parley User")]
        self_name: String,
        /// Make the loopback gateway report itself disconnected, so script
        /// sends are rejected
        #[arg(long)]
        disconnected: bool,
        /// Also print change events as JSON lines
        #[arg(long)]
        print_events: bool,
    },
    /// Print the effective router configuration as TOML
    Config {
        /// Config file to load instead of the default location
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Commands::Replay {
            events,
            config,
            self_id,
            self_name,
            disconnected,
            print_events,
        } => {
            commands::replay::run(commands::replay::ReplayOptions {
                events,
                config,
                self_id: self_id.unwrap_or_else(Uuid::new_v4),
                self_name,
                connected: !disconnected,
                print_events,
            })
            .await?
        }
        Commands::Config { path } => commands::config::run(path.as_deref())?,
    }

    Ok(())
}
