use clap::Args;

use super::{local_time, OutputFormat};
use crate::app::App;

/// Show the cached entities of a collection
#[derive(Args)]
pub struct ShowCommand {
    /// Collection name
    pub collection: String,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let Some(snapshot) = app.engine.snapshot(&self.collection).await? else {
            match self.format {
                OutputFormat::Json => println!("[]"),
                OutputFormat::Text => println!(
                    "Collection '{}' has not been synced yet.",
                    self.collection
                ),
            }
            return Ok(());
        };

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&snapshot.entities())?);
            }
            OutputFormat::Text => {
                println!(
                    "{} ({} item{}, synced {})",
                    snapshot.collection,
                    snapshot.len(),
                    if snapshot.len() == 1 { "" } else { "s" },
                    local_time(snapshot.last_synced_at)
                );
                println!();
                for (id, entity) in &snapshot.items {
                    println!("{}  {}", id, entity);
                }
            }
        }
        Ok(())
    }
}
