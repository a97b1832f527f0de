//! Record comparison between two copies of the database.
//!
//! Used to show what a snapshot's operation actually changed:
//! - Matches snippets by id (ids are never reused for a different record)
//! - Reports added, removed and changed snippets
//! - Changed entries list which fields differ

use crate::snippet::Snippet;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DiffType {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub id: i64,
    pub name: String,
    pub diff_type: DiffType,
    /// Field names that differ; empty for added and removed entries.
    pub fields: Vec<&'static str>,
}

pub struct DiffResult {
    pub entries: Vec<DiffEntry>,
    pub before_count: usize,
    pub after_count: usize,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn changed_fields(old: &Snippet, new: &Snippet) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if old.name != new.name {
        fields.push("name");
    }
    if old.description != new.description {
        fields.push("description");
    }
    if old.command_text != new.command_text {
        fields.push("command_text");
    }
    if old.tags != new.tags {
        fields.push("tags");
    }
    if old.last_used != new.last_used {
        fields.push("last_used");
    }
    fields
}

/// Compare two record sets; output is ordered by id.
pub fn compare_snippets(before: &[Snippet], after: &[Snippet]) -> DiffResult {
    let before_map: BTreeMap<i64, &Snippet> = before.iter().map(|s| (s.id, s)).collect();
    let after_map: BTreeMap<i64, &Snippet> = after.iter().map(|s| (s.id, s)).collect();

    let mut entries = Vec::new();

    for (id, new) in &after_map {
        match before_map.get(id) {
            Some(old) => {
                let fields = changed_fields(old, new);
                if !fields.is_empty() {
                    entries.push(DiffEntry {
                        id: *id,
                        name: new.name.clone(),
                        diff_type: DiffType::Changed,
                        fields,
                    });
                }
            }
            None => entries.push(DiffEntry {
                id: *id,
                name: new.name.clone(),
                diff_type: DiffType::Added,
                fields: Vec::new(),
            }),
        }
    }

    for (id, old) in &before_map {
        if !after_map.contains_key(id) {
            entries.push(DiffEntry {
                id: *id,
                name: old.name.clone(),
                diff_type: DiffType::Removed,
                fields: Vec::new(),
            });
        }
    }

    entries.sort_by_key(|e| e.id);

    DiffResult {
        entries,
        before_count: before.len(),
        after_count: after.len(),
    }
}
