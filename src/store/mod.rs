//! SQLite snippet storage.
//!
//! One live database file with two tables:
//! - snippets: id, name, description, command_text, tags, last_used, created_at
//! - schema_version: version, applied_at, description
//!
//! Timestamps are stored as fixed-width ISO-8601 text so `ORDER BY` on them
//! is chronological. Schema migrations run once, inside `Store::open`, before
//! anything else reads the table.

pub mod diff;
pub mod migrate;

use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::snippet::Snippet;
use crate::util;

/// File name of the live database inside the data directory.
pub const DB_FILE_NAME: &str = "snippets.db";

const SELECT_COLUMNS: &str =
    "SELECT id, name, description, command_text, tags, last_used, created_at FROM snippets";

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snippets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            command_text TEXT NOT NULL,
            tags TEXT,
            last_used TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

fn init_indexes(conn: &Connection) -> rusqlite::Result<()> {
    // the v1 rebuild drops indexes along with the old table, so this runs after migrations
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_snippets_last_used ON snippets(last_used)",
        [],
    )?;

    Ok(())
}

/// Database handle. Open once, reuse across all operations.
pub struct Store {
    conn: Connection,
    path: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the database at `path` and brings its schema
    /// to the latest version. A failed migration is returned as an error and
    /// the store is not usable.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "opening snippet database");
        let mut conn = Connection::open(&path)?;
        init_schema(&conn)?;
        let applied = migrate::ensure_latest(&mut conn)?;
        init_indexes(&conn)?;

        if !applied.is_empty() {
            info!(path = %path.display(), steps = applied.len(), "database schema migrated");
        }

        Ok(Store { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Inserts a snippet as given (timestamps included) and returns its new id.
    /// The `id` field of the argument is ignored.
    pub fn insert(&self, snippet: &Snippet) -> Result<i64> {
        let id = insert_row(&self.conn, snippet)?;
        debug!(id, name = %snippet.name, "inserted snippet");
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Snippet>> {
        let snippet = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                snippet_from_row,
            )
            .optional()?;

        Ok(snippet)
    }

    /// All snippets, most recently used first.
    pub fn get_all(&self) -> Result<Vec<Snippet>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY last_used DESC, id DESC"))?;

        let snippets = stmt
            .query_map([], snippet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(snippets)
    }

    /// All snippets, oldest first. Used for export.
    pub fn get_all_by_creation(&self) -> Result<Vec<Snippet>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"))?;

        let snippets = stmt
            .query_map([], snippet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(snippets)
    }

    /// Case-insensitive substring search.
    ///
    /// A non-blank `term` must match name, description, command_text or tags.
    /// A non-empty `tags` list additionally requires at least one of the tags
    /// to appear in the tags column. Both empty returns everything.
    pub fn search(&self, term: &str, tags: &[String]) -> Result<Vec<Snippet>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut args: Vec<String> = Vec::new();

        let term = term.trim();
        if !term.is_empty() {
            sql.push_str(
                " AND (name LIKE ?1 ESCAPE '\\' OR description LIKE ?1 ESCAPE '\\' \
                 OR command_text LIKE ?1 ESCAPE '\\' OR tags LIKE ?1 ESCAPE '\\')",
            );
            args.push(like_pattern(term));
        }

        let tag_conditions: Vec<String> = tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| {
                args.push(like_pattern(t));
                format!("tags LIKE ?{} ESCAPE '\\'", args.len())
            })
            .collect();

        if !tag_conditions.is_empty() {
            sql.push_str(&format!(" AND ({})", tag_conditions.join(" OR ")));
        }

        sql.push_str(" ORDER BY last_used DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let snippets = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), snippet_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(term, tags = tags.len(), results = snippets.len(), "searched snippets");
        Ok(snippets)
    }

    /// Rewrites name, description, command_text and tags of `snippet.id`.
    /// Timestamps are left alone. Returns false if no such row exists.
    pub fn update(&self, snippet: &Snippet) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE snippets SET name = ?1, description = ?2, command_text = ?3, tags = ?4
             WHERE id = ?5",
            params![
                snippet.name,
                snippet.description,
                snippet.command_text,
                snippet.tags,
                snippet.id
            ],
        )?;

        debug!(id = snippet.id, changed, "updated snippet");
        Ok(changed > 0)
    }

    /// Deletes `id`. Deleting a missing id is not an error; the return value
    /// only reports whether a row was removed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM snippets WHERE id = ?1", params![id])?;

        debug!(id, changed, "deleted snippet");
        Ok(changed > 0)
    }

    /// Exact, case-sensitive name match, optionally ignoring one id.
    pub fn name_exists(&self, name: &str, exclude_id: Option<i64>) -> Result<bool> {
        let found = match exclude_id {
            Some(exclude) => self
                .conn
                .query_row(
                    "SELECT 1 FROM snippets WHERE name = ?1 AND id != ?2 LIMIT 1",
                    params![name, exclude],
                    |_| Ok(()),
                )
                .optional()?,
            None => self
                .conn
                .query_row(
                    "SELECT 1 FROM snippets WHERE name = ?1 LIMIT 1",
                    params![name],
                    |_| Ok(()),
                )
                .optional()?,
        };

        Ok(found.is_some())
    }

    /// Sets last_used to now. Returns false if no such row exists.
    pub fn touch_last_used(&self, id: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE snippets SET last_used = ?1 WHERE id = ?2",
            params![util::to_iso(&util::now()), id],
        )?;

        Ok(changed > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM snippets", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

/// Inserts on any connection or transaction. Shared by `Store::insert` and import.
pub(crate) fn insert_row(conn: &Connection, snippet: &Snippet) -> rusqlite::Result<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO snippets (name, description, command_text, tags, last_used, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    stmt.execute(params![
        snippet.name,
        snippet.description,
        snippet.command_text,
        snippet.tags,
        util::to_iso(&snippet.last_used),
        util::to_iso(&snippet.created_at)
    ])?;

    Ok(conn.last_insert_rowid())
}

/// Reads every snippet from a database file without migrating or writing to it.
pub(crate) fn read_snippets_at(path: &Path) -> Result<Vec<Snippet>> {
    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
    let snippets = stmt
        .query_map([], snippet_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(snippets)
}

fn like_pattern(raw: &str) -> String {
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn snippet_from_row(row: &rusqlite::Row) -> rusqlite::Result<Snippet> {
    let id: i64 = row.get(0)?;
    let last_used: Option<String> = row.get(5)?;
    let created_at: Option<String> = row.get(6)?;

    let created_at = read_timestamp(id, "created_at", created_at.as_deref());
    let last_used = last_used
        .as_deref()
        .and_then(util::parse_iso)
        .unwrap_or(created_at);

    Ok(Snippet {
        id,
        name: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        command_text: row.get(3)?,
        tags: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        last_used,
        created_at,
    })
}

fn read_timestamp(id: i64, column: &str, raw: Option<&str>) -> chrono::NaiveDateTime {
    match raw.and_then(util::parse_iso) {
        Some(ts) => ts,
        None => {
            warn!(id, column, raw, "unreadable timestamp, using current time");
            util::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join(DB_FILE_NAME)).unwrap();
        (dir, store)
    }

    fn sample(name: &str, tags: &str) -> Snippet {
        Snippet::new(name, format!("echo {name}")).with_tags(tags)
    }

    #[test]
    fn insert_then_get_roundtrips() {
        let (_dir, store) = open_temp();
        let snippet = Snippet::new("Test Snippet", "echo \"test command\"")
            .with_description("A test snippet")
            .with_tags("test, unit-test");

        let id = store.insert(&snippet).unwrap();
        assert!(id > 0);

        let loaded = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.name, snippet.name);
        assert_eq!(loaded.description, snippet.description);
        assert_eq!(loaded.command_text, snippet.command_text);
        assert_eq!(loaded.tags, snippet.tags);
        assert_eq!(loaded.created_at, snippet.created_at);
        assert_eq!(loaded.last_used, snippet.last_used);
    }

    #[test]
    fn duplicate_names_are_allowed() {
        let (_dir, store) = open_temp();
        let first = store.insert(&Snippet::new("Same", "cmd1")).unwrap();
        let second = store.insert(&Snippet::new("Same", "cmd2")).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn missing_id_returns_none() {
        let (_dir, store) = open_temp();
        assert!(store.get_by_id(999).unwrap().is_none());
    }

    #[test]
    fn get_all_orders_by_last_used() {
        let (_dir, store) = open_temp();
        let mut old = sample("old", "");
        old.last_used = util::parse_iso("2020-01-01T00:00:00").unwrap();
        let mut new = sample("new", "");
        new.last_used = util::parse_iso("2024-01-01T00:00:00").unwrap();
        store.insert(&old).unwrap();
        store.insert(&new).unwrap();

        let names: Vec<_> = store.get_all().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["new", "old"]);
    }

    #[test]
    fn search_matches_any_field_case_insensitively() {
        let (_dir, store) = open_temp();
        store.insert(&sample("Test Python", "python,script")).unwrap();
        store.insert(&sample("Test Git", "git,vcs")).unwrap();
        store.insert(&sample("Python Debug", "python,debug")).unwrap();

        let mut names: Vec<_> = store
            .search("python", &[])
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Python Debug", "Test Python"]);

        assert_eq!(store.search("TEST", &[]).unwrap().len(), 2);
    }

    #[test]
    fn search_tags_are_or_and_combine_with_term() {
        let (_dir, store) = open_temp();
        store.insert(&sample("Test Python", "python,script")).unwrap();
        store.insert(&sample("Test Git", "git,vcs")).unwrap();
        store.insert(&sample("Python Debug", "python,debug")).unwrap();

        let tags = vec!["vcs".to_string(), "debug".to_string()];
        assert_eq!(store.search("", &tags).unwrap().len(), 2);
        let hits = store.search("test", &tags).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Test Git");
    }

    #[test]
    fn empty_search_equals_get_all() {
        let (_dir, store) = open_temp();
        store.insert(&sample("a", "x")).unwrap();
        store.insert(&sample("b", "y")).unwrap();

        let all: Vec<_> = store.get_all().unwrap().into_iter().map(|s| s.id).collect();
        let found: Vec<_> = store
            .search("  ", &[" ".to_string()])
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(all, found);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let (_dir, store) = open_temp();
        store.insert(&Snippet::new("percent", "printf '100%'")).unwrap();
        store.insert(&Snippet::new("plain", "printf 100")).unwrap();

        let hits = store.search("100%", &[]).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "percent");
    }

    #[test]
    fn update_keeps_timestamps() {
        let (_dir, store) = open_temp();
        let id = store.insert(&sample("before", "a")).unwrap();
        let mut snippet = store.get_by_id(id).unwrap().unwrap();
        let created = snippet.created_at;

        snippet.name = "after".into();
        snippet.command_text = "echo after".into();
        snippet.created_at = util::now();
        assert!(store.update(&snippet).unwrap());

        let loaded = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(loaded.name, "after");
        assert_eq!(loaded.command_text, "echo after");
        assert_eq!(loaded.created_at, created);
    }

    #[test]
    fn update_missing_row_reports_false() {
        let (_dir, store) = open_temp();
        let mut ghost = sample("ghost", "");
        ghost.id = 42;
        assert!(!store.update(&ghost).unwrap());
    }

    #[test]
    fn delete_removes_row() {
        let (_dir, store) = open_temp();
        let id = store.insert(&sample("gone", "")).unwrap();
        assert!(store.delete(id).unwrap());
        assert!(store.get_by_id(id).unwrap().is_none());
    }

    #[test]
    fn delete_missing_row_is_not_an_error() {
        let (_dir, store) = open_temp();
        assert!(store.delete(999).is_ok());
    }

    #[test]
    fn name_exists_honours_exclusion() {
        let (_dir, store) = open_temp();
        let id = store.insert(&sample("unique", "")).unwrap();

        assert!(store.name_exists("unique", None).unwrap());
        assert!(!store.name_exists("unique", Some(id)).unwrap());
        assert!(!store.name_exists("other", None).unwrap());
    }

    #[test]
    fn touch_last_used_moves_snippet_forward() {
        let (_dir, store) = open_temp();
        let mut snippet = sample("stale", "");
        snippet.last_used = util::parse_iso("2020-01-01T00:00:00").unwrap();
        snippet.created_at = snippet.last_used;
        let id = store.insert(&snippet).unwrap();

        assert!(store.touch_last_used(id).unwrap());
        let loaded = store.get_by_id(id).unwrap().unwrap();
        assert!(loaded.last_used > loaded.created_at);
        assert!(!store.touch_last_used(999).unwrap());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        let id = Store::open(&path).unwrap().insert(&sample("kept", "")).unwrap();

        let store = Store::open(&path).unwrap();
        assert_eq!(store.get_by_id(id).unwrap().unwrap().name, "kept");
    }
}
