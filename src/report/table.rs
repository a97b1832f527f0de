//! Plain-text rendering for the terminal.
//!
//! - Snippet lists as fixed-width columns, most recently used first
//! - Backup and snapshot listings with sizes and ages
//! - Snapshot diffs grouped by change type

use crate::backup::BackupEntry;
use crate::prune::PruneResult;
use crate::snapshot::{SnapshotInfo, SnapshotStatus};
use crate::snippet::Snippet;
use crate::store::diff::{DiffResult, DiffType};
use crate::transfer::ImportStats;
use crate::util::{format_age, format_bytes};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn render_snippets(snippets: &[Snippet]) -> String {
    if snippets.is_empty() {
        return String::from("No snippets found.\n");
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:>5}  {:24} {:40} {:20} {:16}\n",
        "ID", "Name", "Command", "Tags", "Last used"
    ));
    output.push_str(&"-".repeat(110));
    output.push('\n');

    for snippet in snippets {
        output.push_str(&format!(
            "{:>5}  {:24} {:40} {:20} {:16}\n",
            snippet.id,
            truncate(&snippet.name, 24),
            truncate(&one_line(&snippet.command_text), 40),
            truncate(&snippet.tags_list().join(", "), 20),
            snippet.last_used.format(DATE_FORMAT)
        ));
    }

    output.push_str(&format!("\n{} snippet(s)\n", snippets.len()));
    output
}

pub fn render_snippet(snippet: &Snippet) -> String {
    let mut output = String::new();
    output.push_str(&format!("#{} {}\n", snippet.id, snippet.name));
    if !snippet.description.is_empty() {
        output.push_str(&format!("\n{}\n", snippet.description));
    }
    output.push_str(&format!("\n  {}\n\n", snippet.command_text));

    let tags = snippet.tags_list();
    if !tags.is_empty() {
        output.push_str(&format!("tags:      {}\n", tags.join(", ")));
    }
    output.push_str(&format!("created:   {}\n", snippet.created_at.format(DATE_FORMAT)));
    output.push_str(&format!("last used: {}\n", snippet.last_used.format(DATE_FORMAT)));
    output
}

pub fn render_tags(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::from("No tags in use.\n");
    }
    let mut output = tags.join("\n");
    output.push('\n');
    output
}

pub fn render_backups(backups: &[BackupEntry]) -> String {
    if backups.is_empty() {
        return String::from("No backups found.\n");
    }

    let mut output = String::new();
    for entry in backups {
        output.push_str(&format!(
            "  {:48} {:>10}  {}\n",
            truncate(&entry.name, 48),
            format_bytes(entry.size_bytes),
            format_age(entry.modified)
        ));
    }

    let total: u64 = backups.iter().map(|e| e.size_bytes).sum();
    output.push_str(&format!(
        "\n{} backup(s), {}\n",
        backups.len(),
        format_bytes(total)
    ));
    output
}

fn status_label(status: SnapshotStatus) -> &'static str {
    match status {
        SnapshotStatus::InProgress => "in-progress",
        SnapshotStatus::Completed => "completed",
    }
}

fn size_or_dash(size: Option<u64>) -> String {
    size.map(format_bytes).unwrap_or_else(|| "-".to_string())
}

pub fn render_snapshots(snapshots: &[SnapshotInfo]) -> String {
    if snapshots.is_empty() {
        return String::from("No snapshots found.\n");
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:22}  {:7} {:24} {:11} {:>10} {:>10}\n",
        "ID", "Op", "Snippet", "Status", "Before", "After"
    ));
    output.push_str(&"-".repeat(90));
    output.push('\n');

    for snap in snapshots {
        let meta = &snap.metadata;
        output.push_str(&format!(
            "{:22}  {:7} {:24} {:11} {:>10} {:>10}\n",
            meta.snapshot_id,
            meta.operation.as_str(),
            truncate(&meta.snippet_name, 24),
            status_label(meta.status),
            size_or_dash(snap.before_size),
            size_or_dash(snap.after_size)
        ));
    }

    output
}

pub fn render_snapshot(snap: &SnapshotInfo, diff: &DiffResult) -> String {
    let meta = &snap.metadata;
    let mut output = String::new();

    output.push_str(&format!("snapshot:  {}\n", meta.snapshot_id));
    output.push_str(&format!("operation: {} \"{}\"\n", meta.operation, meta.snippet_name));
    output.push_str(&format!("status:    {}\n", status_label(meta.status)));
    output.push_str(&format!(
        "before:    {} ({})\n",
        meta.before_timestamp.format("%Y-%m-%d %H:%M:%S"),
        size_or_dash(snap.before_size)
    ));
    if let Some(after) = meta.after_timestamp {
        output.push_str(&format!(
            "after:     {} ({})\n",
            after.format("%Y-%m-%d %H:%M:%S"),
            size_or_dash(snap.after_size)
        ));
    }
    output.push('\n');
    output.push_str(&render_diff(diff));
    output
}

pub fn render_diff(result: &DiffResult) -> String {
    if result.is_empty() {
        return String::from("No changes detected.\n");
    }

    let mut output = String::new();
    for entry in &result.entries {
        let line = match entry.diff_type {
            DiffType::Added => format!("  [+] #{} {}\n", entry.id, entry.name),
            DiffType::Removed => format!("  [-] #{} {}\n", entry.id, entry.name),
            DiffType::Changed => format!(
                "  [~] #{} {} ({})\n",
                entry.id,
                entry.name,
                entry.fields.join(", ")
            ),
        };
        output.push_str(&line);
    }

    output.push_str(&format!(
        "\nsnippets: {} -> {}\n",
        result.before_count, result.after_count
    ));
    output
}

pub fn render_prune(result: &PruneResult, dry_run: bool) -> String {
    let mut output = String::new();
    for path in &result.deleted {
        output.push_str(&format!("{}\n", path.display()));
    }

    let verb = if dry_run { "would free" } else { "freed" };
    output.push_str(&format!(
        "\n{} item(s), {verb} {}\n",
        result.deleted.len(),
        format_bytes(result.bytes_freed)
    ));
    output
}

pub fn render_import(stats: &ImportStats) -> String {
    format!(
        "imported {} of {} snippet(s) ({} skipped, {} failed)\n",
        stats.imported, stats.total, stats.skipped, stats.failed
    )
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{truncated}...")
    }
}
