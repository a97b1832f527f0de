use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snipkeep")]
#[command(about = "Keep, search and reuse shell command snippets")]
#[command(version)]
pub struct Cli {
    /// Directory holding snippets.db (overrides the config file)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save a new snippet
    Add(AddArgs),

    /// List all snippets, most recently used first
    List(ListArgs),

    /// Search snippets by text and tags
    Search(SearchArgs),

    /// Show one snippet in full
    Show(ShowArgs),

    /// Change an existing snippet
    Edit(EditArgs),

    /// Delete a snippet
    Delete(IdArg),

    /// Print a snippet's command and mark it as used
    Use(IdArg),

    /// List every tag in use
    Tags,

    /// Full database backups
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Automatic before/after snapshots
    #[command(subcommand)]
    Snapshot(SnapshotCommand),

    /// Write all snippets to a JSON file
    Export(ExportArgs),

    /// Load snippets from a JSON export
    Import(ImportArgs),
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,

    /// The command text
    #[arg(long)]
    pub command: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Comma-separated tags
    #[arg(long, default_value = "")]
    pub tags: String,

    /// Refuse to add if a snippet with this name exists
    #[arg(long, default_value_t = false)]
    pub unique: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Text matched against name, description, command and tags
    #[arg(default_value = "")]
    pub term: String,

    /// Comma-separated tags; any one must match
    #[arg(long, default_value = "")]
    pub tags: String,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: i64,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct IdArg {
    pub id: i64,
}

/// Fields left out keep their current value.
#[derive(Args)]
pub struct EditArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub command: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Subcommand)]
pub enum BackupCommand {
    /// Copy the database into the backups directory
    Create(BackupDirArg),

    /// List backups, newest first
    List(BackupDirArg),

    /// Replace the database with a backup
    Restore(BackupRestoreArgs),

    /// Delete all but the newest backups
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct BackupDirArg {
    /// Backups directory (defaults to <data dir>/backups)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BackupRestoreArgs {
    pub path: PathBuf,

    /// Delete the backup file after restoring
    #[arg(long, default_value_t = false)]
    pub discard: bool,
}

#[derive(Args)]
pub struct PruneArgs {
    /// How many to keep (defaults to the configured count)
    #[arg(long)]
    pub keep: Option<usize>,

    /// Show what would be deleted without deleting
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// List snapshots, newest first
    List(SnapshotListArgs),

    /// Show a snapshot and what its operation changed
    Show(SnapshotIdArg),

    /// Restore the database from a snapshot
    Restore(SnapshotRestoreArgs),

    /// Delete all but the newest snapshots
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct SnapshotListArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Args)]
pub struct SnapshotIdArg {
    pub id: String,
}

#[derive(Args)]
pub struct SnapshotRestoreArgs {
    pub id: String,

    /// Restore the state after the operation instead of before it
    #[arg(long, default_value_t = false)]
    pub after: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output file (defaults to snippets_backup_<timestamp>.json)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,

    /// Delete all existing snippets first
    #[arg(long, default_value_t = false)]
    pub replace: bool,
}
