//! Schema version tracking and ordered migration steps.
//!
//! The applied versions live in `schema_version`; the current version is the
//! highest recorded one (0 when empty). Each step runs in its own transaction
//! together with the insert of its version row, so a failing step leaves the
//! database at the previous version with no partial changes.

use rusqlite::{params, Connection, Transaction};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::util;

/// What a step found when it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The transformation was performed.
    Applied,
    /// The schema already had the shape the step produces; only the version was recorded.
    AlreadySatisfied,
}

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    apply: fn(&Transaction) -> rusqlite::Result<StepOutcome>,
}

/// Every known step, ascending by version.
pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Remove UNIQUE constraint from name column",
    apply: drop_unique_name,
}];

pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

fn create_version_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL,
            description TEXT
        )",
        [],
    )?;
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<u32> {
    create_version_table(conn)?;
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.map(|v| v.max(0) as u32).unwrap_or(0))
}

/// Applies every step newer than the recorded version. Returns the steps run
/// by this call; an up-to-date database yields an empty list.
pub fn ensure_latest(conn: &mut Connection) -> Result<Vec<(u32, StepOutcome)>> {
    run_steps(conn, MIGRATIONS)
}

fn run_steps(conn: &mut Connection, steps: &[Migration]) -> Result<Vec<(u32, StepOutcome)>> {
    let current = current_version(conn)?;
    info!(current, latest = steps.last().map(|m| m.version).unwrap_or(0), "checking schema version");

    let mut applied = Vec::new();
    for step in steps.iter().filter(|m| m.version > current) {
        let outcome = run_step(conn, step).map_err(|e| {
            error!(version = step.version, error = %e, "migration failed, rolled back");
            Error::migration(step.version, e.to_string())
        })?;

        info!(version = step.version, ?outcome, "migration step recorded");
        applied.push((step.version, outcome));
    }

    Ok(applied)
}

fn run_step(conn: &mut Connection, step: &Migration) -> rusqlite::Result<StepOutcome> {
    // dropping the transaction without commit rolls the step back
    let tx = conn.transaction()?;
    let outcome = (step.apply)(&tx)?;

    let description = match outcome {
        StepOutcome::Applied => step.description.to_string(),
        StepOutcome::AlreadySatisfied => format!("Schema already at version {}", step.version),
    };

    tx.execute(
        "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        params![step.version, util::to_iso(&util::now()), description],
    )?;
    tx.commit()?;

    Ok(outcome)
}

/// v1: early databases declared `name TEXT NOT NULL UNIQUE`. Rebuild the
/// table without the constraint, keeping ids and every row. sqlite's
/// `CURRENT_TIMESTAMP` form (`YYYY-MM-DD HH:MM:SS`) is rewritten with the `T`
/// separator so old and new rows sort together.
fn drop_unique_name(tx: &Transaction) -> rusqlite::Result<StepOutcome> {
    if !name_has_unique_constraint(tx)? {
        return Ok(StepOutcome::AlreadySatisfied);
    }

    info!("found UNIQUE constraint on snippets.name, rebuilding table");
    tx.execute_batch(
        "CREATE TABLE snippets_new (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            command_text TEXT NOT NULL,
            tags TEXT,
            last_used TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        INSERT INTO snippets_new (id, name, description, command_text, tags, last_used, created_at)
            SELECT id, name, description, command_text, tags,
                   replace(COALESCE(last_used, created_at, strftime('%Y-%m-%dT%H:%M:%f', 'now', 'localtime')), ' ', 'T'),
                   replace(COALESCE(created_at, strftime('%Y-%m-%dT%H:%M:%f', 'now', 'localtime')), ' ', 'T')
            FROM snippets;
        DROP TABLE snippets;
        ALTER TABLE snippets_new RENAME TO snippets;",
    )?;

    Ok(StepOutcome::Applied)
}

fn name_has_unique_constraint(conn: &Connection) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM pragma_index_list('snippets') AS il
         JOIN pragma_index_info(il.name) AS ii
         WHERE il.origin = 'u' AND ii.name = 'name'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
