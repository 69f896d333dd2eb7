use clap::{Args, Subcommand};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!();

                        println!(
                            "remote.url: {}",
                            config.remote.url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "remote.api_key: {}",
                            if config.remote.api_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!();

                        println!("sync.interval_secs: {}", config.sync_interval_secs.value);
                        println!("  source: {}", config.sync_interval_secs.source);
                        println!("sync.timeout_secs: {}", config.sync_timeout_secs.value);
                        println!("  source: {}", config.sync_timeout_secs.source);
                        println!("sync.collections: {}", config.collections.value.join(", "));
                        println!("  source: {}", config.collections.source);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = cli_config_path.unwrap_or_else(Config::default_config_path);

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'leaderbook config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let default_config = r#"# leaderbook configuration

# Path to SQLite database (default: ~/.local/share/leaderbook/leaderbook.db)
# database_path: ~/.local/share/leaderbook/leaderbook.db

# Hosted data store
# remote:
#   url: https://your-project.supabase.co
#   api_key: your-anon-key

sync:
  interval_secs: 30
  timeout_secs: 30
  collections: [people, leaders, tags]
"#;

                let mut file = fs::File::create(&config_path)?;
                file.write_all(default_config.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
