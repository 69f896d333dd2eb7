use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;

mod backup;
mod config_cmd;
mod queue;
mod show;
mod status;
mod submit;
mod sync_cmd;
mod watch;

pub use backup::BackupCommand;
pub use config_cmd::ConfigCommand;
pub use queue::QueueCommand;
pub use show::ShowCommand;
pub use status::StatusCommand;
pub use submit::SubmitCommand;
pub use sync_cmd::SyncCommand;
pub use watch::WatchCommand;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders a stored UTC timestamp in the user's local time zone.
pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
