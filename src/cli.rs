use clap::Parser;
use std::path::PathBuf;

use crate::config::CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "rfp-link-validator")]
#[command(about = "Checks RFP landing-page URLs against their bid platform and keeps only the live ones")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/rfp-link-validator.toml
    #[arg(long)]
    pub init: bool,

    /// Configuration file to use instead of ./config/rfp-link-validator.toml
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input CSV (overrides input.path from the config file)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory for the cleaned CSV (overrides the preferred/fallback directories)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Verbose logging (use -v for failure reasons, -vv for debug details)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Export execution logs to a file (specify file path)
    #[arg(long)]
    pub log_file: Option<String>,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_PATH))
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(dir) = &self.output_dir {
            if !dir.is_dir() {
                return Err(format!("Output directory does not exist: {}", dir.display()));
            }
        }

        if let Some(log_file) = &self.log_file {
            if log_file.trim().is_empty() {
                return Err("Log file path cannot be empty".to_string());
            }
        }

        Ok(())
    }
}
