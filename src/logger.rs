use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::batch::BatchSummary;
use crate::platform::{Platform, Verdict};

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Only show progress bar and final summary
    Summary = 1,   // Per-row outcome (default)
    Detailed = 2,  // Failure reasons, resolved URLs, timeouts
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }

    /// Default `tracing` filter directive for this level
    pub fn tracing_directive(&self) -> &'static str {
        match self {
            VerbosityLevel::Silent | VerbosityLevel::Summary => "warn",
            VerbosityLevel::Detailed => "info",
            VerbosityLevel::Debug => "debug",
        }
    }
}

/// Console logger for a validation run: timestamped lines, an optional
/// progress bar, and an optional copy of every line written to a log file.
#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<Mutex<Option<ProgressBar>>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(Mutex::new(None)),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            log_file_path: Some(log_file_path),
            ..Self::new(verbosity)
        }
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are never hidden
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Self::timestamp(), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print through the progress bar so it stays pinned to the bottom line
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn timestamp() -> String {
        chrono::Local::now().format("%H:%M:%S%.3f").to_string()
    }

    pub fn start_progress(&self, total_rows: u64) {
        let pb = ProgressBar::new(total_rows);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Validating...");

        if let Ok(mut guard) = self.progress_bar.lock() {
            *guard = Some(pb);
        }
    }

    pub fn advance_progress(&self, message: &str) {
        if let Ok(guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.as_ref() {
                pb.set_message(message.to_string());
                pb.inc(1);
            }
        }
    }

    pub fn finish_progress(&self) {
        if let Ok(mut guard) = self.progress_bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    // Row-level messages

    pub fn log_run_start(&self, input: &Path, rows: usize, dropped: usize) {
        self.info(&format!("Processing {} rows from {}", rows, input.display()));
        if dropped > 0 {
            self.warn(&format!("Dropped {} rows missing a URL or platform", dropped));
        }
    }

    pub fn log_row_start(&self, index: usize, total: usize, platform: Platform, url: &str) {
        self.info(&format!("[{}/{}] Validating ({}): {}", index, total, platform, url));
    }

    pub fn log_row_verdict(&self, index: usize, verdict: &Verdict) {
        if verdict.render_timed_out {
            self.info(&format!("Row {}: TIMEOUT waiting for page to render", index));
        }

        match &verdict.failure {
            None => {
                self.info(&format!("Row {}: VALID", index));
                self.debug(&format!("Row {}: resolved URL {}", index, verdict.resolved_url));
            }
            Some(failure) => {
                self.info(&format!("Row {}: INVALID ({})", index, failure));
                self.debug(&format!("Row {}: kept URL {}", index, verdict.resolved_url));
            }
        }
    }

    pub fn log_export_success(&self, path: &Path) {
        self.info(&format!("Cleaned file saved as {}", path.display()));
    }

    /// Final summary, printed regardless of verbosity
    pub fn print_final_summary(&self, summary: &BatchSummary, output: Option<&Path>) {
        println!("\n=== VALIDATION SUMMARY ===");
        println!("Duration: {:.2}s", summary.duration_secs);
        println!("Rows read: {}", summary.input_rows + summary.dropped_rows);
        println!("Rows dropped (missing fields): {}", summary.dropped_rows);
        println!("Rows validated: {}", summary.input_rows);
        println!("Valid rows: {}", summary.passed);
        println!("Invalid rows: {}", summary.failed);
        if summary.render_timeouts > 0 {
            println!("Render timeouts: {}", summary.render_timeouts);
        }

        for (platform, counts) in &summary.per_platform {
            println!("  {}: {} valid, {} invalid", platform, counts.passed, counts.failed);
        }

        if let Some(path) = output {
            println!("Results Exported: {}", path.display());
        }
        println!("==========================\n");
    }

    /// Export all collected logs to the specified file
    pub fn export_logs(&self) -> io::Result<()> {
        let Some(ref log_file_path) = self.log_file_path else {
            return Ok(());
        };
        let Ok(buffer) = self.log_buffer.lock() else {
            return Ok(());
        };

        if let Some(parent) = Path::new(log_file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_file_path)?;

        for log_entry in buffer.iter() {
            writeln!(file, "{}", log_entry)?;
        }

        file.flush()
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn get_log_count(&self) -> usize {
        self.log_buffer.lock().map(|buffer| buffer.len()).unwrap_or(0)
    }
}
