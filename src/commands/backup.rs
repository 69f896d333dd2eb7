use clap::{Args, Subcommand};
use leaderbook_core::backup;
use std::path::PathBuf;

use crate::app::App;

#[derive(Args)]
pub struct BackupCommand {
    #[command(subcommand)]
    pub command: BackupSubcommand,
}

#[derive(Subcommand)]
pub enum BackupSubcommand {
    /// Write cached collections and pending changes to a file
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Restore cached collections and pending changes from a file
    Import {
        /// Backup file
        path: PathBuf,
    },
}

impl BackupCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            BackupSubcommand::Export { path } => {
                let backup = app.engine.export_backup().await?;
                backup::write_file(&backup, path)?;
                println!(
                    "Exported {} collection(s) and {} pending change(s) to {}",
                    backup.data.snapshots.len(),
                    backup.data.queue.len(),
                    path.display()
                );
            }
            BackupSubcommand::Import { path } => {
                let backup = backup::read_file(path)?;
                let summary = app.engine.import_backup(&backup).await?;
                println!(
                    "Imported {} collection(s) and {} pending change(s) from {}",
                    summary.snapshots,
                    summary.queued,
                    path.display()
                );
            }
        }
        Ok(())
    }
}
