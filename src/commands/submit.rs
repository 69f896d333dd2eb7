use clap::Args;
use leaderbook_core::{MutationKind, SubmitOutcome};

use crate::app::App;

/// Submit a mutation (runs now if online, otherwise queued)
#[derive(Args)]
pub struct SubmitCommand {
    /// Mutation kind: create, update or delete
    pub kind: MutationKind,

    /// Target collection (e.g. people, leaders, tags)
    pub collection: String,

    /// JSON payload; update and delete need an "id" field
    pub payload: String,
}

impl SubmitCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let payload: serde_json::Value = serde_json::from_str(&self.payload)
            .map_err(|e| format!("Invalid JSON payload: {}", e))?;

        match app
            .engine
            .submit(self.kind, &self.collection, payload)
            .await?
        {
            SubmitOutcome::Applied(Some(entity)) => {
                println!("Applied {} on {}:", self.kind, self.collection);
                println!("{}", serde_json::to_string_pretty(&entity)?);
            }
            SubmitOutcome::Applied(None) => {
                println!("Applied {} on {}", self.kind, self.collection);
            }
            SubmitOutcome::Queued(id) => {
                println!("Queued {} on {} as {}", self.kind, self.collection, id);
                println!("{} change(s) pending sync", app.engine.queue_size());
            }
        }

        Ok(())
    }
}
