//! `SnippetManager`: the one entry point front ends talk to.
//!
//! Validates input, forwards to the store, and wraps every add, update and
//! delete in a before/after snapshot followed by snapshot retention.
//! Snapshot trouble is logged and never fails the mutation itself.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, info_span, warn};

use crate::backup::{self, BackupEntry};
use crate::error::{Error, Result};
use crate::prune::{PruneMode, PruneResult};
use crate::snapshot::{self, Operation, SnapshotInfo};
use crate::snippet::{split_tags, Snippet};
use crate::store::diff::DiffResult;
use crate::store::Store;
use crate::transfer::{self, ImportStats};

#[derive(Debug, Clone, Copy)]
pub struct ManagerOptions {
    /// Bracket mutations with before/after snapshots.
    pub snapshots: bool,
    /// Snapshots kept after each bracketed mutation.
    pub snapshot_keep: usize,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        ManagerOptions {
            snapshots: true,
            snapshot_keep: snapshot::DEFAULT_KEEP,
        }
    }
}

/// User-editable fields of a snippet, as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetInput {
    pub name: String,
    pub description: String,
    pub command_text: String,
    pub tags: String,
}

impl SnippetInput {
    pub fn new(name: impl Into<String>, command_text: impl Into<String>) -> Self {
        SnippetInput {
            name: name.into(),
            command_text: command_text.into(),
            ..SnippetInput::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Trimmed copy; name and command must not be blank.
    fn validated(&self) -> Result<SnippetInput> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Snippet name cannot be empty"));
        }
        let command_text = self.command_text.trim();
        if command_text.is_empty() {
            return Err(Error::validation("Command text cannot be empty"));
        }

        Ok(SnippetInput {
            name: name.to_string(),
            description: self.description.trim().to_string(),
            command_text: command_text.to_string(),
            tags: self.tags.trim().to_string(),
        })
    }
}

pub struct SnippetManager {
    /// `None` once a restore has left the database file unopenable.
    store: Option<Store>,
    db_path: PathBuf,
    options: ManagerOptions,
}

impl SnippetManager {
    pub fn new(store: Store, options: ManagerOptions) -> Self {
        SnippetManager {
            db_path: store.path().to_path_buf(),
            store: Some(store),
            options,
        }
    }

    /// Opens (and migrates) the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>, options: ManagerOptions) -> Result<Self> {
        Ok(Self::new(Store::open(db_path)?, options))
    }

    /// The open store, or a storage error if a failed restore closed it.
    pub fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or_else(|| closed_error(&self.db_path))
    }

    fn store_mut(&mut self) -> Result<&mut Store> {
        self.store.as_mut().ok_or_else(|| closed_error(&self.db_path))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Creates a snippet and returns its id. With `allow_duplicate_names`
    /// false an existing snippet of the same name is a validation error.
    pub fn add(&self, input: &SnippetInput, allow_duplicate_names: bool) -> Result<i64> {
        let input = input.validated()?;
        if !allow_duplicate_names && self.store()?.name_exists(&input.name, None)? {
            return Err(Error::validation(format!(
                "A snippet with the name '{}' already exists",
                input.name
            )));
        }

        let snippet = Snippet::new(input.name, input.command_text)
            .with_description(input.description)
            .with_tags(input.tags);

        let id = self.bracketed(Operation::Add, &snippet.name, |store| store.insert(&snippet))?;
        info!(id, name = %snippet.name, "snippet added");
        Ok(id)
    }

    pub fn get(&self, id: i64) -> Result<Option<Snippet>> {
        self.store()?.get_by_id(id)
    }

    /// Like `get`, but a missing id is an error.
    pub fn details(&self, id: i64) -> Result<Snippet> {
        self.store()?
            .get_by_id(id)?
            .ok_or_else(|| Error::not_found(format!("Snippet with ID {id} not found")))
    }

    /// Most recently used first.
    pub fn all(&self) -> Result<Vec<Snippet>> {
        self.store()?.get_all()
    }

    /// Search by term plus a comma-separated tag filter; see `Store::search`.
    pub fn find(&self, term: &str, tags_filter: &str) -> Result<Vec<Snippet>> {
        self.store()?.search(term, &split_tags(tags_filter))
    }

    /// Rewrites the editable fields of `id`. `last_used` and `created_at`
    /// keep their stored values.
    pub fn update(&self, id: i64, input: &SnippetInput) -> Result<()> {
        let input = input.validated()?;
        let existing = self.details(id)?;

        let updated = Snippet {
            id,
            name: input.name,
            description: input.description,
            command_text: input.command_text,
            tags: input.tags,
            last_used: existing.last_used,
            created_at: existing.created_at,
        };

        let changed = self.bracketed(Operation::Update, &updated.name, |store| store.update(&updated))?;
        if !changed {
            return Err(Error::not_found(format!("Snippet with ID {id} not found")));
        }
        info!(id, name = %updated.name, "snippet updated");
        Ok(())
    }

    /// Deletes `id`. A missing id is not an error; the return value says
    /// whether anything was removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let name = match self.store()?.get_by_id(id)? {
            Some(snippet) => snippet.name,
            None => format!("#{id}"),
        };

        let removed = self.bracketed(Operation::Delete, &name, |store| store.delete(id))?;
        info!(id, removed, "snippet deleted");
        Ok(removed)
    }

    /// Marks `id` as just used. Call whenever a command is copied or run.
    pub fn record_usage(&self, id: i64) -> Result<()> {
        if !self.store()?.touch_last_used(id)? {
            return Err(Error::not_found(format!("Snippet with ID {id} not found")));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        self.store()?.count()
    }

    /// Every tag in use, sorted and de-duplicated.
    pub fn tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .store()?
            .get_all()?
            .iter()
            .flat_map(Snippet::tags_list)
            .collect();
        Ok(tags.into_iter().collect())
    }

    fn bracketed<T>(
        &self,
        operation: Operation,
        snippet_name: &str,
        mutate: impl FnOnce(&Store) -> Result<T>,
    ) -> Result<T> {
        let store = self.store()?;
        if !self.options.snapshots {
            return mutate(store);
        }

        let db_path = self.db_path.as_path();
        let span = info_span!("bracket", %operation, snippet = snippet_name);
        let _guard = span.enter();

        let before = match snapshot::before(db_path, operation, snippet_name) {
            Ok(before) => Some(before),
            Err(e) => {
                warn!(error = %e, "before snapshot failed; continuing without it");
                None
            }
        };

        let result = mutate(store);

        if let (Some(before), Ok(_)) = (&before, &result) {
            if let Err(e) = snapshot::after(db_path, &before.snapshot_id) {
                warn!(snapshot_id = %before.snapshot_id, error = %e, "after snapshot failed");
            }
        }

        if let Err(e) = snapshot::cleanup(db_path, self.options.snapshot_keep) {
            warn!(error = %e, "snapshot cleanup failed");
        }

        result
    }

    // backups

    /// Full copy of the database into `target_dir` (default `<db dir>/backups`).
    pub fn backup(&self, target_dir: Option<&Path>) -> Result<PathBuf> {
        backup::backup(&self.db_path, target_dir)
    }

    pub fn backups_dir(&self) -> PathBuf {
        backup::default_dir(&self.db_path)
    }

    pub fn list_backups(&self, target_dir: Option<&Path>) -> Result<Vec<BackupEntry>> {
        backup::list(&self.backup_target(target_dir))
    }

    pub fn prune_backups(
        &self,
        target_dir: Option<&Path>,
        keep_count: usize,
        mode: PruneMode,
    ) -> Result<PruneResult> {
        backup::prune(&self.backup_target(target_dir), keep_count, mode)
    }

    /// Replaces the live database with `backup_path` and reopens it. Returns
    /// the pre-restore safety copy, if one was written.
    pub fn restore_backup(&mut self, backup_path: &Path, keep_backup: bool) -> Result<Option<PathBuf>> {
        self.with_store_closed(|db_path| backup::restore(backup_path, db_path, keep_backup))
    }

    fn backup_target(&self, target_dir: Option<&Path>) -> PathBuf {
        target_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.backups_dir())
    }

    // snapshots

    pub fn list_snapshots(&self, limit: usize) -> Result<Vec<SnapshotInfo>> {
        snapshot::list(&self.db_path, limit)
    }

    pub fn snapshot(&self, snapshot_id: &str) -> Result<SnapshotInfo> {
        snapshot::get(&self.db_path, snapshot_id)
    }

    pub fn snapshot_diff(&self, snapshot_id: &str) -> Result<DiffResult> {
        snapshot::diff(&self.db_path, snapshot_id)
    }

    pub fn prune_snapshots(&self, keep_count: usize, mode: PruneMode) -> PruneResult {
        snapshot::prune(&self.db_path, keep_count, mode)
    }

    /// Rolls the live database back (`use_before`) or forward to a snapshot
    /// and reopens it. Returns the safety copy path, if one was written.
    pub fn restore_snapshot(&mut self, snapshot_id: &str, use_before: bool) -> Result<Option<PathBuf>> {
        self.with_store_closed(|db_path| snapshot::restore_from(db_path, snapshot_id, use_before))
    }

    // export / import

    pub fn export_json(&self) -> Result<String> {
        transfer::export_json(self.store()?)
    }

    pub fn export_to_file(&self, path: Option<&Path>) -> Result<PathBuf> {
        transfer::export_to_file(self.store()?, path)
    }

    pub fn import_json(&mut self, json: &str, replace_existing: bool) -> Result<ImportStats> {
        transfer::import_all(self.store_mut()?, json, replace_existing)
    }

    pub fn import_from_file(&mut self, path: &Path, replace_existing: bool) -> Result<ImportStats> {
        transfer::import_from_file(self.store_mut()?, path, replace_existing)
    }

    /// Runs a restore `f` with the live connection closed, then reopens the
    /// database. If the restored file cannot be opened, the safety copy `f`
    /// returned is put back. Without a safety copy the manager stays closed
    /// and snippet operations fail until a working restore succeeds.
    fn with_store_closed(
        &mut self,
        f: impl FnOnce(&Path) -> Result<Option<PathBuf>>,
    ) -> Result<Option<PathBuf>> {
        self.store = None;
        let outcome = f(&self.db_path);

        let reopen_error = match Store::open(&self.db_path) {
            Ok(store) => {
                self.store = Some(store);
                return outcome;
            }
            Err(e) => e,
        };
        error!(path = %self.db_path.display(), error = %reopen_error, "database unusable after restore");

        let safety = match outcome {
            Ok(Some(safety)) => safety,
            _ => return Err(reopen_error),
        };

        backup::copy_over(&safety, &self.db_path)?;
        self.store = Some(Store::open(&self.db_path)?);
        warn!(from = %safety.display(), "previous database put back");

        Err(Error::storage(format!(
            "Restored file is not a usable database ({reopen_error}); previous database put back from {}",
            safety.display()
        )))
    }
}

fn closed_error(db_path: &Path) -> Error {
    Error::storage(format!(
        "Database {} is closed after a failed restore; restore a working backup",
        db_path.display()
    ))
}
