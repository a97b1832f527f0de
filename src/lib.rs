//! Snippet storage core: a SQLite record store with schema migrations,
//! manual backups, automatic before/after snapshots around every change,
//! and JSON export/import. `SnippetManager` ties them together.

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod prune;
pub mod report;
pub mod snapshot;
pub mod snippet;
pub mod store;
pub mod transfer;
pub mod util;

pub use error::{Error, ErrorKind, Result};
pub use manager::{ManagerOptions, SnippetInput, SnippetManager};
pub use snippet::Snippet;
