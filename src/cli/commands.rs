use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tn", about = concat!("tabnote v", env!("CARGO_PKG_VERSION"), " - one task per tab"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Storage file shared by every tab
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Config file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// More diagnostics on stderr (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a tab: reconcile its URL with storage and print the result
    Open(OpenArgs),
    /// Edit the task of a tab and save it
    Edit(EditArgs),
    /// List every task in storage
    List(ListArgs),
    /// Print the share link of a task
    Link(IdArg),
    /// Permanently delete a task
    Delete(IdArg),
    /// Export or import a backup file
    Backup(BackupCmd),
    /// Show storage usage and backup freshness
    Status,
    /// Keep a tab open, refreshing the task list as storage changes
    Watch(WatchArgs),
}

#[derive(Args)]
pub struct OpenArgs {
    /// Tab location (default: the configured base URL, which mints a new task)
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Tab location, carrying `win=<id>`
    #[arg(long)]
    pub url: String,
    /// New title
    #[arg(long)]
    pub title: Option<String>,
    /// New details
    #[arg(long)]
    pub details: Option<String>,
    /// Due date (YYYY-MM-DD), or "none" to clear it
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Sort order: none, updated, title
    #[arg(long, default_value = "none")]
    pub sort: String,
    /// Hide tasks with no title, details or due date
    #[arg(long)]
    pub hide_empty: bool,
}

#[derive(Args)]
pub struct IdArg {
    /// Task id (with or without the win_ prefix)
    pub id: String,
}

#[derive(Args)]
pub struct BackupCmd {
    #[command(subcommand)]
    pub action: BackupAction,
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Write every task to a backup file
    Export(ExportArgs),
    /// Restore tasks from a backup file
    Import(ImportArgs),
}

#[derive(Args)]
pub struct ExportArgs {
    /// Output path, or "-" for stdout (default: tasks-backup-<date>.json)
    #[arg(long)]
    pub out: Option<String>,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Backup file to restore
    pub file: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Tab location
    #[arg(long)]
    pub url: Option<String>,
    /// Sort order: none, updated, title
    #[arg(long, default_value = "none")]
    pub sort: String,
    /// Stop after this many seconds (default: run until interrupted)
    #[arg(long)]
    pub duration: Option<u64>,
}
