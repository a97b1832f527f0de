//! Retention engine for backup files and snapshot directories.
//!
//! Callers decide what is expired; this module removes it:
//! - Dry run mode: reports what would be deleted
//! - Execute mode: deletes files or whole directories, collecting errors
//!
//! A failed deletion never stops the rest of the batch.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneMode {
    DryRun,
    Execute,
}

/// A backup file or snapshot directory selected for removal.
#[derive(Debug, Clone)]
pub struct PruneTarget {
    pub path: PathBuf,
    pub size_bytes: u64,
}

#[derive(Debug, Default)]
pub struct PruneResult {
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub bytes_freed: u64,
}

pub fn run(targets: Vec<PruneTarget>, mode: PruneMode) -> PruneResult {
    let mut result = PruneResult::default();

    match mode {
        PruneMode::DryRun => {
            for target in targets {
                result.bytes_freed += target.size_bytes;
                result.deleted.push(target.path);
            }
        }
        PruneMode::Execute => {
            for target in targets {
                match delete_path(&target.path) {
                    Ok(()) => {
                        debug!(path = %target.path.display(), "pruned");
                        result.bytes_freed += target.size_bytes;
                        result.deleted.push(target.path);
                    }
                    Err(e) => {
                        warn!(path = %target.path.display(), error = %e, "failed to prune");
                        result.errors.push(format!("failed to delete {}: {e}", target.path.display()));
                    }
                }
            }
        }
    }

    result
}

fn delete_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Total size of a file, or of every file below a directory.
pub fn path_size(path: &Path) -> u64 {
    if path.is_file() {
        return path.metadata().map(|m| m.len()).unwrap_or(0);
    }

    walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn target(path: PathBuf) -> PruneTarget {
        let size_bytes = path_size(&path);
        PruneTarget { path, size_bytes }
    }

    #[test]
    fn dry_run_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.db");
        fs::write(&file, b"12345").unwrap();

        let result = run(vec![target(file.clone())], PruneMode::DryRun);
        assert_eq!(result.deleted, vec![file.clone()]);
        assert_eq!(result.bytes_freed, 5);
        assert!(file.exists());
    }

    #[test]
    fn execute_removes_files_and_directories() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.db");
        let sub = dir.path().join("snap");
        fs::write(&file, b"abc").unwrap();
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("before.db"), b"abcd").unwrap();

        let result = run(vec![target(file.clone()), target(sub.clone())], PruneMode::Execute);
        assert_eq!(result.deleted.len(), 2);
        assert_eq!(result.bytes_freed, 7);
        assert!(result.errors.is_empty());
        assert!(!file.exists());
        assert!(!sub.exists());
    }

    #[test]
    fn missing_target_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.db");
        fs::write(&present, b"x").unwrap();
        let missing = PruneTarget {
            path: dir.path().join("missing.db"),
            size_bytes: 0,
        };

        let result = run(vec![missing, target(present.clone())], PruneMode::Execute);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.deleted, vec![present]);
    }
}
