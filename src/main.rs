use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod commands;
mod config;

use app::App;
use commands::{
    BackupCommand, ConfigCommand, QueueCommand, ShowCommand, StatusCommand, SubmitCommand,
    SyncCommand, WatchCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "leaderbook")]
#[command(version)]
#[command(about = "Offline-first client for the Leaderbook data store", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a create, update or delete
    Submit(SubmitCommand),

    /// Sync with the remote store now
    Sync(SyncCommand),

    /// Show sync status
    Status(StatusCommand),

    /// Show a cached collection
    Show(ShowCommand),

    /// Inspect or clear pending changes
    Queue(QueueCommand),

    /// Sync in the background until interrupted
    Watch(WatchCommand),

    /// Export or import local data
    Backup(BackupCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leaderbook=info,leaderbook_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let Some(command) = &cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    // Config commands never touch the database
    if let Commands::Config(cmd) = command {
        return cmd.run(&config, cli_config_path);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute_command(command, &config))
}

async fn execute_command(
    command: &Commands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = App::open(config).await?;

    match command {
        Commands::Submit(cmd) => cmd.run(&app).await,
        Commands::Sync(cmd) => cmd.run(&app).await,
        Commands::Status(cmd) => cmd.run(&app).await,
        Commands::Show(cmd) => cmd.run(&app).await,
        Commands::Queue(cmd) => cmd.run(&app).await,
        Commands::Watch(cmd) => cmd.run(&app, config).await,
        Commands::Backup(cmd) => cmd.run(&app).await,
        Commands::Config(_) => Ok(()),
    }
}
