use clap::Args;
use leaderbook_core::spawn_probe;

use crate::app::App;
use crate::config::Config;

/// Keep syncing in the background until Ctrl-C
#[derive(Args)]
pub struct WatchCommand {}

impl WatchCommand {
    pub async fn run(&self, app: &App, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let engine = &app.engine;

        let subscription = engine.subscribe(|status| println!("[sync] {}", status));
        let connectivity = engine.connectivity().on_change(|online| {
            println!(
                "[network] {}",
                if *online { "online" } else { "offline" }
            )
        });

        let probe = app.probe_url.clone().map(|url| {
            spawn_probe(
                engine.connectivity().clone(),
                url,
                config.sync_interval(),
                config.remote_timeout(),
            )
        });
        let scheduler = engine.start_scheduler(config.sync_interval());

        println!(
            "Watching (sync every {}s, {} pending). Press Ctrl-C to stop.",
            config.sync_interval().as_secs(),
            engine.queue_size()
        );

        tokio::signal::ctrl_c().await?;

        println!();
        println!("Stopping...");
        scheduler.stop().await;
        if let Some(probe) = probe {
            probe.stop().await;
        }
        subscription.unsubscribe();
        connectivity.unsubscribe();

        Ok(())
    }
}
