//! Manual full-file backups of the live database.
//!
//! Backups are plain byte copies named `<stem>_backup_<YYYYMMDD_HHMMSS_ffffff>.db`.
//! Their size and age come from the filesystem; nothing else is recorded.
//! Restoring always copies the current live file aside first
//! (`<db>.pre_restore_<YYYYMMDD_HHMMSS>`, with `_N` appended if that name is
//! already taken).

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::prune::{self, PruneMode, PruneResult, PruneTarget};
use crate::util;

/// Directory (next to the database) that holds manual backups.
pub const BACKUPS_DIR: &str = "backups";

const BACKUP_INFIX: &str = "_backup_";
const BACKUP_EXTENSION: &str = "db";

#[derive(Debug, Clone)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

/// `<db dir>/backups`
pub fn default_dir(db_path: &Path) -> PathBuf {
    db_dir(db_path).join(BACKUPS_DIR)
}

pub(crate) fn db_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn db_stem(db_path: &Path) -> String {
    db_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snippets".to_string())
}

/// Copies `src` into a new file at `dst`. Fails with `AlreadyExists` instead of
/// overwriting, so concurrent stamps can't clobber each other.
pub(crate) fn copy_new(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let mut writer = File::options().write(true).create_new(true).open(dst)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(bytes)
}

/// Overwrites `dst` in place with the contents of `src`.
pub(crate) fn copy_over(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let mut writer = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)?;
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(bytes)
}

/// Copies the live database into `target_dir` (default `<db dir>/backups`),
/// creating the directory if needed. Returns the new backup's path.
pub fn backup(db_path: &Path, target_dir: Option<&Path>) -> Result<PathBuf> {
    if !db_path.is_file() {
        return Err(Error::not_found(format!(
            "Database file not found: {}",
            db_path.display()
        )));
    }

    let target_dir = target_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_dir(db_path));
    fs::create_dir_all(&target_dir)?;

    let stem = db_stem(db_path);
    let (_, (path, bytes)) = util::reserve_stamp(|stamp| {
        let path = target_dir.join(format!("{stem}{BACKUP_INFIX}{stamp}.{BACKUP_EXTENSION}"));
        copy_new(db_path, &path).map(|bytes| (path, bytes))
    })?;

    info!(path = %path.display(), bytes, "database backup created");
    Ok(path)
}

/// Replaces the live database with `backup_path`.
///
/// If a live file exists it is first copied to `<db>.pre_restore_<stamp>`
/// regardless of `keep_backup`; that path is returned. With `keep_backup`
/// false the backup file is removed after a successful restore.
pub fn restore(backup_path: &Path, db_path: &Path, keep_backup: bool) -> Result<Option<PathBuf>> {
    if !backup_path.is_file() {
        return Err(Error::not_found(format!(
            "Backup file not found: {}",
            backup_path.display()
        )));
    }

    let safety = if db_path.exists() {
        let path = claim_pre_restore(db_path, &util::second_stamp(&util::now()))?;
        info!(path = %path.display(), "safety copy of live database written");
        Some(path)
    } else {
        None
    };

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    copy_over(backup_path, db_path)?;
    info!(from = %backup_path.display(), to = %db_path.display(), "database restored from backup");

    if !keep_backup {
        fs::remove_file(backup_path)?;
        info!(path = %backup_path.display(), "consumed backup removed");
    }

    Ok(safety)
}

const MAX_PRE_RESTORE_SUFFIX: u32 = 1000;

/// Copies the live database to `<db>.pre_restore_<stamp>`, never replacing an
/// earlier safety copy: a taken name gets `_1`, `_2`, ... appended.
fn claim_pre_restore(db_path: &Path, stamp: &str) -> io::Result<PathBuf> {
    let mut base = OsString::from(db_path.as_os_str());
    base.push(".pre_restore_");
    base.push(stamp);

    for suffix in 0..MAX_PRE_RESTORE_SUFFIX {
        let mut name = base.clone();
        if suffix > 0 {
            name.push(format!("_{suffix}"));
        }
        let path = PathBuf::from(name);
        match copy_new(db_path, &path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        "no free name for pre-restore safety copy",
    ))
}

fn is_backup_file_name(name: &str) -> bool {
    name.contains(BACKUP_INFIX)
        && Path::new(name)
            .extension()
            .is_some_and(|ext| ext == BACKUP_EXTENSION)
}

/// Backups in `target_dir`, newest first. A missing directory yields an empty list.
pub fn list(target_dir: &Path) -> Result<Vec<BackupEntry>> {
    if !target_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries: Vec<BackupEntry> = walkdir::WalkDir::new(target_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable backup entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_backup_file_name(&name) {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            Some(BackupEntry {
                name,
                path: entry.into_path(),
                size_bytes: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            })
        })
        .collect();

    // names carry the stamp, so they break mtime ties in creation order
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(entries)
}

/// Backups that a cleanup keeping `keep_count` would remove.
pub fn expired(target_dir: &Path, keep_count: usize) -> Result<Vec<BackupEntry>> {
    Ok(list(target_dir)?.into_iter().skip(keep_count).collect())
}

pub fn prune(target_dir: &Path, keep_count: usize, mode: PruneMode) -> Result<PruneResult> {
    let targets = expired(target_dir, keep_count)?
        .into_iter()
        .map(|entry| PruneTarget {
            path: entry.path,
            size_bytes: entry.size_bytes,
        })
        .collect();

    Ok(prune::run(targets, mode))
}

/// Deletes all but the `keep_count` newest backups; returns how many were removed.
pub fn cleanup(target_dir: &Path, keep_count: usize) -> Result<usize> {
    let result = prune(target_dir, keep_count, PruneMode::Execute)?;
    if !result.deleted.is_empty() {
        info!(dir = %target_dir.display(), deleted = result.deleted.len(), "old backups removed");
    }
    Ok(result.deleted.len())
}
