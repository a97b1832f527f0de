//! Portable JSON export and import of all snippets.
//!
//! Document shape:
//!
//! ```json
//! {
//!   "version": 1,
//!   "exported_at": "2024-03-09T07:05:02.000042",
//!   "snippets": [
//!     { "id": 1, "name": "...", "description": "...", "command_text": "...",
//!       "tags": "...", "last_used": "...", "created_at": "..." }
//!   ]
//! }
//! ```
//!
//! `version` gates compatibility. Imported records get fresh ids.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::snippet::Snippet;
use crate::store::{self, Store};
use crate::util;

pub const EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: u32,
    #[serde(with = "util::iso_timestamp")]
    pub exported_at: NaiveDateTime,
    pub snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub imported: usize,
    /// Reserved for duplicate handling; nothing is skipped today.
    pub skipped: usize,
    pub failed: usize,
}

/// One entry of an incoming document. Timestamps are taken as given and
/// must be present; description and tags may be null.
#[derive(Debug, Deserialize)]
struct IncomingSnippet {
    name: String,
    #[serde(default)]
    description: Option<String>,
    command_text: String,
    #[serde(default)]
    tags: Option<String>,
    last_used: String,
    created_at: String,
}

impl IncomingSnippet {
    fn into_snippet(self) -> std::result::Result<Snippet, String> {
        if self.name.trim().is_empty() {
            return Err("empty name".to_string());
        }
        if self.command_text.trim().is_empty() {
            return Err("empty command_text".to_string());
        }

        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let last_used = parse_timestamp(&self.last_used, "last_used")?;

        Ok(Snippet {
            id: 0,
            name: self.name,
            description: self.description.unwrap_or_default(),
            command_text: self.command_text,
            tags: self.tags.unwrap_or_default(),
            last_used,
            created_at,
        })
    }
}

fn parse_timestamp(raw: &str, field: &str) -> std::result::Result<NaiveDateTime, String> {
    util::parse_iso(raw).ok_or_else(|| format!("invalid {field}: {raw}"))
}

/// All snippets, oldest first.
pub fn export_all(store: &Store) -> Result<ExportDocument> {
    Ok(ExportDocument {
        version: EXPORT_VERSION,
        exported_at: util::now(),
        snippets: store.get_all_by_creation()?,
    })
}

pub fn export_json(store: &Store) -> Result<String> {
    let document = export_all(store)?;
    let json = serde_json::to_string_pretty(&document)?;
    info!(snippets = document.snippets.len(), "snippets exported");
    Ok(json)
}

/// `snippets_backup_<YYYYMMDD_HHMMSS>.json`
pub fn default_export_file_name() -> String {
    format!("snippets_backup_{}.json", util::second_stamp(&util::now()))
}

/// Writes the export to `path`, or to the default file name in the current
/// directory. Returns the path written.
pub fn export_to_file(store: &Store, path: Option<&Path>) -> Result<PathBuf> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(default_export_file_name()));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(&path, export_json(store)?)?;
    Ok(path)
}

/// Imports every entry of `json` in a single transaction.
///
/// The document must carry `version` and `snippets`; anything else, or an
/// unsupported version, is a validation error and nothing is written.
/// `replace_existing` empties the table first. Each entry's `id` is dropped
/// and the rest inserted as given, timestamps included. Entries that cannot
/// be read or inserted (missing timestamps among them) are counted as failed
/// and the rest carry on.
pub fn import_all(store: &mut Store, json: &str, replace_existing: bool) -> Result<ImportStats> {
    let mut document: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| Error::validation(format!("Invalid backup format: {e}")))?;

    let version = document
        .get("version")
        .ok_or_else(|| Error::validation("Invalid backup format: missing version"))?;
    if version.as_u64() != Some(u64::from(EXPORT_VERSION)) {
        return Err(Error::validation(format!(
            "Unsupported backup version: {version}"
        )));
    }

    let entries = match document.get_mut("snippets").map(serde_json::Value::take) {
        Some(serde_json::Value::Array(entries)) => entries,
        Some(_) => return Err(Error::validation("Invalid backup format: snippets is not a list")),
        None => return Err(Error::validation("Invalid backup format: missing snippets")),
    };

    let mut stats = ImportStats {
        total: entries.len(),
        ..ImportStats::default()
    };
    let tx = store.conn_mut().transaction()?;
    if replace_existing {
        let cleared = tx.execute("DELETE FROM snippets", [])?;
        info!(cleared, "existing snippets cleared before import");
    }

    for (index, entry) in entries.into_iter().enumerate() {
        let snippet = serde_json::from_value::<IncomingSnippet>(entry)
            .map_err(|e| e.to_string())
            .and_then(IncomingSnippet::into_snippet);

        let outcome = snippet.and_then(|s| {
            store::insert_row(&tx, &s)
                .map(|_| ())
                .map_err(|e| format!("{} ({e})", s.name))
        });

        match outcome {
            Ok(()) => stats.imported += 1,
            Err(reason) => {
                warn!(index, reason = %reason, "snippet not imported");
                stats.failed += 1;
            }
        }
    }

    tx.commit()?;
    info!(
        total = stats.total,
        imported = stats.imported,
        failed = stats.failed,
        "import completed"
    );
    Ok(stats)
}

pub fn import_from_file(store: &mut Store, path: &Path, replace_existing: bool) -> Result<ImportStats> {
    if !path.is_file() {
        return Err(Error::not_found(format!(
            "Import file not found: {}",
            path.display()
        )));
    }
    let json = fs::read_to_string(path)?;
    import_all(store, &json, replace_existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::store::DB_FILE_NAME;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join(DB_FILE_NAME)).unwrap();
        (dir, store)
    }

    fn fingerprint(store: &Store) -> Vec<(String, String, String, String)> {
        let mut rows: Vec<_> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.description, s.command_text, s.tags))
            .collect();
        rows.sort();
        rows
    }

    #[test]
    fn export_is_oldest_first() {
        let (_dir, store) = open_temp();
        let mut newer = Snippet::new("newer", "echo 2");
        newer.created_at = util::parse_iso("2024-01-01T00:00:00").unwrap();
        let mut older = Snippet::new("older", "echo 1");
        older.created_at = util::parse_iso("2020-01-01T00:00:00").unwrap();
        store.insert(&newer).unwrap();
        store.insert(&older).unwrap();

        let document = export_all(&store).unwrap();
        assert_eq!(document.version, EXPORT_VERSION);
        let names: Vec<_> = document.snippets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["older", "newer"]);
    }

    #[test]
    fn export_then_replace_import_reproduces_records() {
        let (_dir, source) = open_temp();
        source
            .insert(&Snippet::new("List", "ls -la").with_tags("fs").with_description("list"))
            .unwrap();
        source.insert(&Snippet::new("Status", "git status").with_tags("git")).unwrap();
        let json = export_json(&source).unwrap();

        let (_dir2, mut target) = open_temp();
        target.insert(&Snippet::new("Stale", "rm -rf /tmp/x")).unwrap();
        let stats = import_all(&mut target, &json, true).unwrap();

        assert_eq!(stats, ImportStats { total: 2, imported: 2, skipped: 0, failed: 0 });
        assert_eq!(fingerprint(&target), fingerprint(&source));
    }

    #[test]
    fn import_keeps_existing_without_replace() {
        let (_dir, mut store) = open_temp();
        store.insert(&Snippet::new("Keep", "true")).unwrap();
        let json = r#"{"version": 1, "snippets": [
            {"id": 7, "name": "New", "description": "", "command_text": "echo new", "tags": "",
             "last_used": "2024-01-01T00:00:00", "created_at": "2024-01-01T00:00:00"}
        ]}"#;

        let stats = import_all(&mut store, json, false).unwrap();
        assert_eq!(stats.imported, 1);
        assert_eq!(store.count().unwrap(), 2);
        let imported = store.search("New", &[]).unwrap();
        assert_ne!(imported[0].id, 7);
    }

    #[test]
    fn bad_entries_are_counted_not_fatal() {
        let (_dir, mut store) = open_temp();
        let json = r#"{"version": 1, "snippets": [
            {"name": "ok", "command_text": "echo ok", "description": null, "tags": null,
             "last_used": "2023-02-01T08:00:00", "created_at": "2023-01-01 08:00:00"},
            {"name": "no command", "last_used": "2023-01-01T00:00:00", "created_at": "2023-01-01T00:00:00"},
            {"name": "", "command_text": "echo",
             "last_used": "2023-01-01T00:00:00", "created_at": "2023-01-01T00:00:00"},
            {"name": "bad time", "command_text": "echo",
             "last_used": "2023-01-01T00:00:00", "created_at": "last tuesday"},
            {"name": "no times", "command_text": "echo"},
            {"name": "null time", "command_text": "echo", "last_used": null, "created_at": "2023-01-01T00:00:00"},
            42
        ]}"#;

        let stats = import_all(&mut store, json, false).unwrap();
        assert_eq!(stats.total, 7);
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.failed, 6);
        assert_eq!(store.count().unwrap(), 1);

        let kept = &store.get_all().unwrap()[0];
        assert_eq!(kept.name, "ok");
        assert_eq!(kept.created_at, util::parse_iso("2023-01-01T08:00:00").unwrap());
        assert_eq!(kept.last_used, util::parse_iso("2023-02-01T08:00:00").unwrap());
    }

    #[test]
    fn malformed_documents_are_rejected_untouched() {
        let (_dir, mut store) = open_temp();
        store.insert(&Snippet::new("Keep", "true")).unwrap();

        for json in [
            "not json",
            r#"{"snippets": []}"#,
            r#"{"version": 1}"#,
            r#"{"version": 2, "snippets": []}"#,
            r#"{"version": 1, "snippets": {}}"#,
        ] {
            let err = import_all(&mut store, json, true).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{json}");
        }
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn file_roundtrip_uses_given_path() {
        let (dir, store) = open_temp();
        store.insert(&Snippet::new("a", "echo a")).unwrap();
        let path = dir.path().join("out").join("export.json");

        assert_eq!(export_to_file(&store, Some(&path)).unwrap(), path);

        let (_dir2, mut target) = open_temp();
        let stats = import_from_file(&mut target, &path, false).unwrap();
        assert_eq!(stats.imported, 1);
    }

    #[test]
    fn import_from_missing_file_is_not_found() {
        let (dir, mut store) = open_temp();
        let err = import_from_file(&mut store, &dir.path().join("nope.json"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn default_name_shape() {
        let name = default_export_file_name();
        assert!(name.starts_with("snippets_backup_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "snippets_backup_20240309_070502.json".len());
    }
}
