use chrono::{DateTime, Utc};
use clap::Args;
use leaderbook_core::DurableStore;
use serde::Serialize;

use super::{local_time, OutputFormat};
use crate::app::App;

/// Show pending changes, remote reachability and cached collections
#[derive(Args)]
pub struct StatusCommand {
    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct CollectionSummary {
    collection: String,
    items: usize,
    last_synced_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct StatusReport {
    remote: Option<String>,
    online: bool,
    pending_changes: usize,
    persistent_storage: bool,
    collections: Vec<CollectionSummary>,
}

impl StatusCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        let engine = &app.engine;
        let report = StatusReport {
            remote: app.probe_url.clone(),
            online: !engine.is_offline(),
            pending_changes: engine.queue_size(),
            persistent_storage: engine.store().is_persistent(),
            collections: engine
                .snapshots()
                .await?
                .into_iter()
                .map(|s| CollectionSummary {
                    items: s.len(),
                    last_synced_at: s.last_synced_at,
                    collection: s.collection,
                })
                .collect(),
        };

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_text(&report),
        }
        Ok(())
    }
}

fn print_text(report: &StatusReport) {
    println!("Sync Status");
    println!("===========");
    println!();

    match &report.remote {
        Some(url) => println!(
            "Remote:   {} ({})",
            url,
            if report.online { "reachable" } else { "unreachable" }
        ),
        None => println!("Remote:   not configured"),
    }
    println!("Pending:  {} change(s)", report.pending_changes);
    if !report.persistent_storage {
        println!("Storage:  in-memory only (database unavailable)");
    }
    println!();

    if report.collections.is_empty() {
        println!("No collections cached yet. Run 'leaderbook sync'.");
        return;
    }

    println!("{:<16} {:>6}  LAST SYNCED", "COLLECTION", "ITEMS");
    for c in &report.collections {
        println!(
            "{:<16} {:>6}  {}",
            c.collection,
            c.items,
            local_time(c.last_synced_at)
        );
    }
}
