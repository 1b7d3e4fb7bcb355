use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;

use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

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

const DEFAULT_CONFIG: &str = r#"# wearsync configuration

# What the channel does when a connect attempt fails:
#   surface-once  report the first failure (default)
#   auto-retry    reconnect until max_attempts is reached
retry_policy:
  mode: surface-once
  max_attempts: 3

# Temperature unit published to the watch: metric or imperial
units: metric

# Text fitting on the watch face
# layout:
#   min_scale: 6.0
#   max_iterations: 6
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
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

                        println!("retry_mode: {}", config.retry_mode.value);
                        println!("  source: {}", config.retry_mode.source);
                        println!();

                        println!("max_attempts: {}", config.max_attempts.value);
                        println!("  source: {}", config.max_attempts.source);
                        println!();

                        println!("units: {}", config.units.value);
                        println!("  source: {}", config.units.source);
                        println!();

                        println!("layout.min_scale: {}", config.layout.min_scale);
                        println!("layout.max_iterations: {}", config.layout.max_iterations);
                    }
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'wearsync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}
