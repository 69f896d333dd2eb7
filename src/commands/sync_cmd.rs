//! Manual sync command.

use clap::Args;
use leaderbook_core::{SyncOutcome, SyncReport};

use crate::app::App;

/// Drain pending changes and refresh every collection now
#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn run(&self, app: &App) -> Result<(), Box<dyn std::error::Error>> {
        if app.probe_url.is_none() {
            println!("Status: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  remote:");
            println!("    url: \"https://your-project.supabase.co\"");
            println!("    api_key: \"...\"");
            println!();
            println!("Or set environment variables:");
            println!("  LEADERBOOK_REMOTE_URL");
            println!("  LEADERBOOK_REMOTE_API_KEY");
            return Ok(());
        }

        println!("Syncing with remote store...");
        println!();

        match app.engine.force_sync().await {
            SyncOutcome::Completed(report) => print_report(&report),
            SyncOutcome::AlreadyInProgress => println!("A sync is already in progress."),
            SyncOutcome::Offline => {
                println!("Remote store unreachable; working offline.");
                println!("{} change(s) pending sync", app.engine.queue_size());
            }
        }

        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    match &report.drain {
        Some(drain) if !drain.is_empty() => println!(
            "  Pending changes: {} applied, {} will retry, {} dropped",
            drain.succeeded, drain.failed, drain.dropped
        ),
        Some(_) => println!("  Pending changes: none"),
        None => println!("  ✗ Pending changes could not be processed"),
    }

    for collection in &report.collections {
        match &collection.result {
            Ok(count) => println!(
                "  ✓ {} ({} item{})",
                collection.collection,
                count,
                if *count == 1 { "" } else { "s" }
            ),
            Err(e) => println!("  ✗ {} - {}", collection.collection, e),
        }
    }

    println!();
    if report.is_success() {
        println!("Sync complete.");
    } else {
        println!("Sync finished with errors.");
    }
    println!("Status: {}", report.status);
}
