//! Output placement for the cleaned sheet.
//!
//! The cleaned CSV goes to the preferred directory when it exists, otherwise
//! to the fallback directory. A write that is denied is retried under a
//! timestamped name; any other failure is retried under a `_backup` name.
//! Only when every candidate fails is the export an error.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::records::{write_sheet_to_path, BidRecord, BidSheet};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to save output after {} attempts: {}", .attempts.len(), describe_attempts(.attempts))]
    Exhausted { attempts: Vec<(PathBuf, io::Error)> },
}

fn describe_attempts(attempts: &[(PathBuf, io::Error)]) -> String {
    attempts
        .iter()
        .map(|(path, e)| format!("{} ({})", path.display(), e))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Where the cleaned sheet will be written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub primary: PathBuf,
    pub fallback_dir: PathBuf,
    pub file_stem: String,
}

impl OutputPlan {
    /// Resolve the output location. An explicit directory wins and also holds
    /// the fallback names; otherwise the preferred directory is used only when
    /// it exists.
    pub fn resolve(config: &OutputConfig, override_dir: Option<&Path>) -> Self {
        let (dir, fallback_dir) = match override_dir {
            Some(dir) => (dir.to_path_buf(), dir.to_path_buf()),
            None => {
                let fallback_dir = config.fallback_dir();
                match config.preferred_dir() {
                    Some(preferred) if preferred.is_dir() => (preferred, fallback_dir),
                    _ => (fallback_dir.clone(), fallback_dir),
                }
            }
        };

        Self {
            primary: dir.join(format!("{}.csv", config.file_stem)),
            fallback_dir,
            file_stem: config.file_stem.clone(),
        }
    }

    pub fn timestamped_path(&self, timestamp: &str) -> PathBuf {
        self.fallback_dir.join(format!("{}_{}.csv", self.file_stem, timestamp))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.fallback_dir.join(format!("{}_backup.csv", self.file_stem))
    }

    /// Fallback order after the primary write failed with `kind`.
    pub fn fallbacks(&self, kind: io::ErrorKind, timestamp: &str) -> Vec<PathBuf> {
        let timestamped = self.timestamped_path(timestamp);
        let backup = self.backup_path();
        if kind == io::ErrorKind::PermissionDenied {
            vec![timestamped, backup]
        } else {
            vec![backup, timestamped]
        }
    }
}

/// Write the retained records following the plan. Returns the path written.
pub fn export_sheet(plan: &OutputPlan, sheet: &BidSheet, records: &[BidRecord]) -> Result<PathBuf, ExportError> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    export_with(plan, &timestamp, |path| write_sheet_to_path(path, sheet, records))
}

/// Run `write` against the primary path, then the fallbacks, until one succeeds.
pub fn export_with<F>(plan: &OutputPlan, timestamp: &str, mut write: F) -> Result<PathBuf, ExportError>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut attempts = Vec::new();

    let first_kind = match write(&plan.primary) {
        Ok(()) => {
            info!("Saved cleaned sheet to {}", plan.primary.display());
            return Ok(plan.primary.clone());
        }
        Err(e) => {
            warn!("Failed to save {}: {}", plan.primary.display(), e);
            let kind = e.kind();
            attempts.push((plan.primary.clone(), e));
            kind
        }
    };

    for candidate in plan.fallbacks(first_kind, timestamp) {
        match write(&candidate) {
            Ok(()) => {
                info!("Saved cleaned sheet to fallback location {}", candidate.display());
                return Ok(candidate);
            }
            Err(e) => {
                warn!("Failed to save {}: {}", candidate.display(), e);
                attempts.push((candidate, e));
            }
        }
    }

    Err(ExportError::Exhausted { attempts })
}
