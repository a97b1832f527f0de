use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::util;

/// A stored shell command with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Assigned by the store; 0 until inserted.
    pub id: i64,
    pub name: String,
    pub description: String,
    pub command_text: String,
    /// Comma-separated, free-form.
    pub tags: String,
    #[serde(with = "util::iso_timestamp")]
    pub last_used: NaiveDateTime,
    #[serde(with = "util::iso_timestamp")]
    pub created_at: NaiveDateTime,
}

impl Snippet {
    /// Unsaved snippet with both timestamps set to now.
    pub fn new(name: impl Into<String>, command_text: impl Into<String>) -> Self {
        let now = util::now();
        Snippet {
            id: 0,
            name: name.into(),
            description: String::new(),
            command_text: command_text.into(),
            tags: String::new(),
            last_used: now,
            created_at: now,
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

    pub fn tags_list(&self) -> Vec<String> {
        split_tags(&self.tags)
    }
}

/// Splits a comma-separated tag string, trimming and dropping empties.
/// Order is kept, duplicates are dropped.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
