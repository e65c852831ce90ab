use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rfp_link_validator::batch::run_batch;
use rfp_link_validator::browser::ChromeRenderer;
use rfp_link_validator::cli::Cli;
use rfp_link_validator::config::{AppConfig, ConfigError};
use rfp_link_validator::export::{export_sheet, OutputPlan};
use rfp_link_validator::logger::{RunLogger, VerbosityLevel};
use rfp_link_validator::platform::Platform;
use rfp_link_validator::records::load_sheet;
use rfp_link_validator::validator::LinkValidator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config_at(&config_path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run rfp-link-validator again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let app_config = match AppConfig::load_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config(&path) {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run rfp-link-validator again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    init_tracing(verbosity);

    let logger = match &cli.log_file {
        Some(log_file_path) => RunLogger::with_log_file(verbosity, log_file_path.clone()),
        None => RunLogger::new(verbosity),
    };

    if let Err(e) = cli.validate() {
        logger.error(&format!("Invalid arguments: {}", e));
        std::process::exit(1);
    }

    let input_path = cli
        .input
        .clone()
        .unwrap_or_else(|| PathBuf::from(&app_config.input.path));

    let sheet = match load_sheet(&input_path, &app_config.input) {
        Ok(sheet) => sheet,
        Err(e) => {
            logger.error(&e.to_string());
            std::process::exit(1);
        }
    };
    logger.log_run_start(&input_path, sheet.records.len(), sheet.dropped);

    let browser_rows = sheet
        .records
        .iter()
        .filter(|r| Platform::from_label(&r.platform).needs_browser())
        .count();
    if browser_rows > 0 {
        logger.debug(&format!("{} rows need a headless browser", browser_rows));
    }

    let renderer = Arc::new(ChromeRenderer::new(app_config.browser.clone()));
    let validator = match LinkValidator::from_config(&app_config, renderer) {
        Ok(v) => v,
        Err(e) => {
            logger.error(&format!("Failed to set up HTTP client: {}", e));
            std::process::exit(1);
        }
    };

    let show_progress = !cli.no_progress && verbosity < VerbosityLevel::Debug;
    if show_progress {
        logger.start_progress(sheet.records.len() as u64);
    }

    let records = sheet.records.clone();
    let outcome = run_batch(&validator, records, sheet.dropped, &logger).await;
    logger.finish_progress();

    let plan = OutputPlan::resolve(&app_config.output, cli.output_dir.as_deref());
    let exported = match export_sheet(&plan, &sheet, &outcome.retained) {
        Ok(path) => {
            logger.log_export_success(&path);
            Some(path)
        }
        Err(e) => {
            logger.error(&e.to_string());
            None
        }
    };

    logger.print_final_summary(&outcome.summary, exported.as_deref());

    if logger.is_log_export_enabled() {
        if let Err(e) = logger.export_logs() {
            eprintln!("⚠️  Failed to write log file: {}", e);
        }
    }

    if exported.is_none() {
        std::process::exit(1);
    }

    Ok(())
}

/// Route library `tracing` events to stderr. `RUST_LOG` overrides the
/// verbosity-derived default.
fn init_tracing(verbosity: VerbosityLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,rfp_link_validator={}", verbosity.tracing_directive()))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
