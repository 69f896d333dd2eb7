use clap::{Args, Subcommand};
use std::io::{self, Write};

use super::{local_time, OutputFormat};
use crate::app::App;

#[derive(Args)]
pub struct QueueCommand {
    #[command(subcommand)]
    pub command: QueueSubcommand,
}

#[derive(Subcommand)]
pub enum QueueSubcommand {
    /// List mutations waiting to be synced, oldest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Discard every pending mutation and cached collection
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl QueueCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            QueueSubcommand::List { format } => {
                let records = app.engine.queued_records();
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        if records.is_empty() {
                            println!("No pending changes.");
                            return Ok(());
                        }
                        println!(
                            "{:<24} {:<7} {:<12} {:>8}  ENQUEUED",
                            "ID", "KIND", "COLLECTION", "ATTEMPTS"
                        );
                        for record in &records {
                            println!(
                                "{:<24} {:<7} {:<12} {:>8}  {}",
                                record.id,
                                record.kind.to_string(),
                                record.collection,
                                record.attempts,
                                local_time(record.enqueued_at)
                            );
                        }
                    }
                }
                Ok(())
            }

            QueueSubcommand::Clear { force } => {
                let pending = app.engine.queue_size();
                if !force && pending > 0 {
                    print!(
                        "Discard {} pending change(s) and the local cache? [y/N] ",
                        pending
                    );
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;
                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Cancelled.");
                        return Ok(());
                    }
                }

                app.engine.clear_all().await?;
                println!("Cleared {} pending change(s) and the local cache.", pending);
                Ok(())
            }
        }
    }
}
