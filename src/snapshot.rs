//! Before/after snapshots around single snippet mutations.
//!
//! Layout, relative to the database's directory:
//!
//! ```text
//! backups/auto/<YYYYMMDD_HHMMSS_ffffff>/before.db
//!                                      /after.db       (once completed)
//!                                      /metadata.json
//! backups/manual/safety_before_restore_<stamp>_backup.db
//! ```
//!
//! The directory name is the snapshot id. Ids are timestamps, so reverse
//! lexical order is newest first. A snapshot starts `in-progress` with only
//! `before.db` and becomes `completed` once `after.db` is written; it never
//! goes back.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::backup::{self, BACKUPS_DIR};
use crate::error::{Error, Result};
use crate::prune::{self, PruneMode, PruneResult, PruneTarget};
use crate::store::{self, diff};
use crate::util;

pub const AUTO_DIR: &str = "auto";
pub const MANUAL_DIR: &str = "manual";
pub const BEFORE_FILE: &str = "before.db";
pub const AFTER_FILE: &str = "after.db";
pub const METADATA_FILE: &str = "metadata.json";

/// Snapshots kept by the opportunistic cleanup after each mutation.
pub const DEFAULT_KEEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotStatus {
    InProgress,
    Completed,
}

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub snapshot_id: String,
    pub operation: Operation,
    pub snippet_name: String,
    #[serde(with = "util::iso_timestamp")]
    pub before_timestamp: NaiveDateTime,
    #[serde(with = "util::iso_timestamp::option")]
    pub after_timestamp: Option<NaiveDateTime>,
    pub status: SnapshotStatus,
}

#[derive(Debug, Clone)]
pub struct BeforeSnapshot {
    pub snapshot_id: String,
    pub snapshot_dir: PathBuf,
    pub backup_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AfterSnapshot {
    pub snapshot_dir: PathBuf,
    pub backup_path: PathBuf,
}

/// A listed snapshot with the sizes of whichever copies exist.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub metadata: SnapshotMetadata,
    pub snapshot_dir: PathBuf,
    pub before_size: Option<u64>,
    pub after_size: Option<u64>,
}

/// `<db dir>/backups/auto`
pub fn snapshots_root(db_path: &Path) -> PathBuf {
    backup::db_dir(db_path).join(BACKUPS_DIR).join(AUTO_DIR)
}

/// `<db dir>/backups/manual`
pub fn manual_root(db_path: &Path) -> PathBuf {
    backup::db_dir(db_path).join(BACKUPS_DIR).join(MANUAL_DIR)
}

/// Ids are `YYYYMMDD_HHMMSS_ffffff`; anything else is not ours and must not
/// be joined onto a path.
fn is_snapshot_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 22
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 15 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

fn snapshot_dir(db_path: &Path, snapshot_id: &str) -> Result<PathBuf> {
    let dir = snapshots_root(db_path).join(snapshot_id);
    if !is_snapshot_id(snapshot_id) || !dir.is_dir() {
        return Err(Error::not_found(format!("Snapshot not found: {snapshot_id}")));
    }
    Ok(dir)
}

fn read_metadata(dir: &Path) -> Result<SnapshotMetadata> {
    let raw = fs::read(dir.join(METADATA_FILE))?;
    Ok(serde_json::from_slice(&raw)?)
}

fn write_metadata(dir: &Path, metadata: &SnapshotMetadata) -> Result<()> {
    // write-then-rename so a crash never leaves half a metadata file
    let tmp = dir.join(format!("{METADATA_FILE}.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(metadata)?)?;
    fs::rename(&tmp, dir.join(METADATA_FILE))?;
    Ok(())
}

/// Starts a snapshot: new directory, copy of the live database as
/// `before.db`, metadata marked in-progress.
pub fn before(db_path: &Path, operation: Operation, snippet_name: &str) -> Result<BeforeSnapshot> {
    let root = snapshots_root(db_path);
    fs::create_dir_all(&root)?;

    let (snapshot_id, snapshot_dir) = util::reserve_stamp(|stamp| {
        let dir = root.join(stamp);
        fs::create_dir(&dir).map(|_| dir)
    })?;

    let backup_path = snapshot_dir.join(BEFORE_FILE);
    let copied = backup::copy_new(db_path, &backup_path).map_err(Error::from);
    let started = copied.and_then(|_| {
        write_metadata(
            &snapshot_dir,
            &SnapshotMetadata {
                snapshot_id: snapshot_id.clone(),
                operation,
                snippet_name: snippet_name.to_string(),
                before_timestamp: util::now(),
                after_timestamp: None,
                status: SnapshotStatus::InProgress,
            },
        )
    });

    if let Err(e) = started {
        // an id without a before copy is useless; don't leave it behind
        let _ = fs::remove_dir_all(&snapshot_dir);
        return Err(e);
    }

    info!(snapshot_id = %snapshot_id, %operation, snippet = snippet_name, "before snapshot created");
    Ok(BeforeSnapshot {
        snapshot_id,
        snapshot_dir,
        backup_path,
    })
}

/// Completes a snapshot: copy of the live database as `after.db`, metadata
/// marked completed. Completing twice is rejected.
pub fn after(db_path: &Path, snapshot_id: &str) -> Result<AfterSnapshot> {
    let snapshot_dir = snapshot_dir(db_path, snapshot_id)?;
    let mut metadata = read_metadata(&snapshot_dir)?;
    if metadata.status == SnapshotStatus::Completed {
        return Err(Error::validation(format!(
            "Snapshot {snapshot_id} is already completed"
        )));
    }

    let backup_path = snapshot_dir.join(AFTER_FILE);
    backup::copy_over(db_path, &backup_path)?;

    metadata.after_timestamp = Some(util::now());
    metadata.status = SnapshotStatus::Completed;
    write_metadata(&snapshot_dir, &metadata)?;

    info!(snapshot_id, "after snapshot created");
    Ok(AfterSnapshot {
        snapshot_dir,
        backup_path,
    })
}

/// Snapshot directories, newest first.
fn snapshot_dirs(db_path: &Path) -> Vec<PathBuf> {
    let root = snapshots_root(db_path);
    if !root.is_dir() {
        return Vec::new();
    }

    let mut dirs: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable snapshot entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| is_snapshot_id(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect();

    dirs.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    dirs
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Up to `limit` snapshots, newest first. Entries with unreadable metadata are
/// logged and skipped.
pub fn list(db_path: &Path, limit: usize) -> Result<Vec<SnapshotInfo>> {
    let mut snapshots = Vec::new();

    for dir in snapshot_dirs(db_path) {
        if snapshots.len() >= limit {
            break;
        }

        match read_metadata(&dir) {
            Ok(metadata) => snapshots.push(SnapshotInfo {
                metadata,
                before_size: file_size(&dir.join(BEFORE_FILE)),
                after_size: file_size(&dir.join(AFTER_FILE)),
                snapshot_dir: dir,
            }),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping snapshot with unreadable metadata");
            }
        }
    }

    Ok(snapshots)
}

pub fn get(db_path: &Path, snapshot_id: &str) -> Result<SnapshotInfo> {
    let dir = snapshot_dir(db_path, snapshot_id)?;
    Ok(SnapshotInfo {
        metadata: read_metadata(&dir)?,
        before_size: file_size(&dir.join(BEFORE_FILE)),
        after_size: file_size(&dir.join(AFTER_FILE)),
        snapshot_dir: dir,
    })
}

/// Snapshot directories a cleanup keeping `keep_count` would remove.
pub fn expired(db_path: &Path, keep_count: usize) -> Vec<PathBuf> {
    snapshot_dirs(db_path).into_iter().skip(keep_count).collect()
}

pub fn prune(db_path: &Path, keep_count: usize, mode: PruneMode) -> PruneResult {
    let targets = expired(db_path, keep_count)
        .into_iter()
        .map(|path| PruneTarget {
            size_bytes: prune::path_size(&path),
            path,
        })
        .collect();

    prune::run(targets, mode)
}

/// Removes whole snapshot directories beyond the `keep_count` newest.
/// Returns how many were removed.
pub fn cleanup(db_path: &Path, keep_count: usize) -> Result<usize> {
    let result = prune(db_path, keep_count, PruneMode::Execute);
    if let Some(first) = result.errors.first() {
        return Err(Error::storage(format!(
            "removed {} snapshots, {} failed: {first}",
            result.deleted.len(),
            result.errors.len()
        )));
    }

    if !result.deleted.is_empty() {
        debug!(deleted = result.deleted.len(), keep_count, "old snapshots removed");
    }
    Ok(result.deleted.len())
}

/// Overwrites the live database with the snapshot's `before.db`
/// (`use_before`) or `after.db`. The live file is first copied to
/// `backups/manual/safety_before_restore_<stamp>_backup.db`; that path is
/// returned when a live file existed.
pub fn restore_from(db_path: &Path, snapshot_id: &str, use_before: bool) -> Result<Option<PathBuf>> {
    let dir = snapshot_dir(db_path, snapshot_id)?;
    let source = dir.join(if use_before { BEFORE_FILE } else { AFTER_FILE });
    if !source.is_file() {
        return Err(Error::not_found(format!(
            "Snapshot {snapshot_id} has no {} copy",
            if use_before { "before" } else { "after" }
        )));
    }

    let safety = if db_path.exists() {
        let manual = manual_root(db_path);
        fs::create_dir_all(&manual)?;
        let (_, path) = util::reserve_stamp(|stamp| {
            let path = manual.join(format!("safety_before_restore_{stamp}_backup.db"));
            backup::copy_new(db_path, &path).map(|_| path)
        })?;
        info!(path = %path.display(), "safety copy of live database written");
        Some(path)
    } else {
        None
    };

    backup::copy_over(&source, db_path)?;
    info!(snapshot_id, use_before, "database restored from snapshot");
    Ok(safety)
}

/// What the snapshot's operation changed, comparing `before.db` with
/// `after.db`. In-progress snapshots are compared against the live database.
pub fn diff(db_path: &Path, snapshot_id: &str) -> Result<diff::DiffResult> {
    let dir = snapshot_dir(db_path, snapshot_id)?;
    let before = store::read_snippets_at(&dir.join(BEFORE_FILE))?;
    let after_path = dir.join(AFTER_FILE);
    let after = if after_path.is_file() {
        store::read_snippets_at(&after_path)?
    } else {
        store::read_snippets_at(db_path)?
    };

    Ok(diff::compare_snippets(&before, &after))
}
