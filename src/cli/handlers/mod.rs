use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::clock::{SharedClock, SystemClock};
use crate::io::config_io;
use crate::io::file_store::{FileStore, atomic_write};
use crate::io::watcher::StoreWatcher;
use crate::model::config::Config;
use crate::model::{DueDate, SessionId, TextField};
use crate::ops::advisory::Advisory;
use crate::ops::backup;
use crate::ops::pipeline::{PipelineEvent, PipelineOutput};
use crate::ops::reconcile::InitialState;
use crate::ops::scan::{SessionSummary, SortMode};
use crate::session::Session;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Resolved global options, shared by every command.
struct Env {
    store_path: PathBuf,
    config: Config,
    json: bool,
}

impl Env {
    fn from_cli(cli: &Cli) -> Self {
        let config_path = cli
            .config
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(config_io::config_path);
        let store_path = cli
            .store
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(config_io::data_path);
        Env {
            store_path,
            config: config_io::read_config_from(&config_path),
            json: cli.json,
        }
    }

    /// Open a tab at `url`, or at the base URL when none is given.
    fn open(
        &self,
        url: Option<&str>,
    ) -> Result<(Session<FileStore>, InitialState), Box<dyn std::error::Error>> {
        let store = FileStore::open(&self.store_path)?;
        let clock: SharedClock = Arc::new(SystemClock);
        let location = url.unwrap_or(&self.config.session.base_url);
        Ok(Session::open(store, location, clock, self.config.clone())?)
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CliResult {
    let env = Env::from_cli(&cli);

    match cli.command {
        Commands::Open(args) => cmd_open(&env, args),
        Commands::Edit(args) => cmd_edit(&env, args),
        Commands::List(args) => cmd_list(&env, args),
        Commands::Link(args) => cmd_link(&env, args),
        Commands::Delete(args) => cmd_delete(&env, args),
        Commands::Backup(cmd) => match cmd.action {
            BackupAction::Export(args) => cmd_backup_export(&env, args),
            BackupAction::Import(args) => cmd_backup_import(&env, args),
        },
        Commands::Status => cmd_status(&env),
        Commands::Watch(args) => cmd_watch(&env, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_id(raw: &str) -> Result<SessionId, Box<dyn std::error::Error>> {
    SessionId::parse(raw).ok_or_else(|| format!("invalid task id: '{}'", raw).into())
}

fn parse_sort(raw: &str) -> Result<SortMode, Box<dyn std::error::Error>> {
    raw.parse::<SortMode>().map_err(Box::<dyn std::error::Error>::from)
}

/// `none` clears the date; anything else must be a real `YYYY-MM-DD` date.
fn parse_due(raw: &str) -> Result<DueDate, Box<dyn std::error::Error>> {
    if raw.eq_ignore_ascii_case("none") || raw.is_empty() {
        return Ok(DueDate::NoDate);
    }
    DueDate::parse_strict(raw)
        .map(DueDate::Date)
        .ok_or_else(|| format!("invalid due date: '{}' (expected YYYY-MM-DD or none)", raw).into())
}

fn warn_advisory(advisory: &Advisory) {
    eprintln!("warning: {}", advisory);
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_sessions(sessions: &[SessionSummary], json: bool) -> CliResult {
    let today = today();
    if json {
        let list: Vec<SessionJson> = sessions.iter().map(|s| session_to_json(s, today)).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        let now = chrono::Utc::now();
        for summary in sessions {
            println!("{}", format_session_line(summary, today, now));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_open(env: &Env, args: OpenArgs) -> CliResult {
    let (mut session, initial) = env.open(args.url.as_deref())?;
    let url = session.location().to_string();

    if env.json {
        println!("{}", serde_json::to_string_pretty(&open_to_json(&initial, &url))?);
    } else {
        println!("{}", url);
        if !initial.title.is_empty() {
            println!("title: {}", initial.title);
        }
        if !initial.details.is_empty() {
            println!("details: {}", initial.details);
        }
        if initial.due_date.is_set() {
            println!("due: {}", initial.due_date);
        }
    }

    for advisory in [session.check_storage()?, session.check_backup()?].iter().flatten() {
        warn_advisory(advisory);
    }
    Ok(())
}

fn cmd_edit(env: &Env, args: EditArgs) -> CliResult {
    let due = args.due.as_deref().map(parse_due).transpose()?;
    let (mut session, _) = env.open(Some(&args.url))?;

    if let Some(title) = args.title {
        session.record_edit(TextField::Title, title)?;
    }
    if let Some(details) = args.details {
        session.record_edit(TextField::Details, details)?;
    }
    if let Some(due) = due {
        session.select_due_date(due)?;
    }
    // The invocation ends here, like a tab being hidden
    session.dispatch(PipelineEvent::Hidden)?;

    for field in [TextField::Title, TextField::Details] {
        let report = session.length_report(field);
        if report.over_limit() {
            eprintln!(
                "warning: {} is {} characters, over the suggested {}",
                field.name(),
                report.length,
                report.limit
            );
        }
    }

    println!("{}", session.location());
    Ok(())
}

fn cmd_list(env: &Env, args: ListArgs) -> CliResult {
    let sort = parse_sort(&args.sort)?;
    let (session, _) = env.open(None)?;
    let mut sessions = session.scan_directory(sort);
    if args.hide_empty {
        sessions.retain(|s| !s.is_blank());
    }
    print_sessions(&sessions, env.json)
}

fn cmd_link(env: &Env, args: IdArg) -> CliResult {
    let id = parse_id(&args.id)?;
    let (session, _) = env.open(None)?;
    println!("{}", session.share_link(&id));
    Ok(())
}

fn cmd_delete(env: &Env, args: IdArg) -> CliResult {
    let id = parse_id(&args.id)?;
    let (mut session, _) = env.open(None)?;
    if !session.scan_directory(SortMode::Insertion).iter().any(|s| s.session_id == id) {
        return Err(format!("task not found: {}", id).into());
    }
    session.delete_session(&id)?;
    println!("Deleted {}", id);
    Ok(())
}

fn cmd_backup_export(env: &Env, args: ExportArgs) -> CliResult {
    let (mut session, _) = env.open(None)?;
    let document = session.export_backup()?;
    let json = document.to_json()?;

    match args.out.as_deref() {
        Some("-") => println!("{}", json),
        out => {
            let path = out
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(backup::backup_file_name(today())));
            atomic_write(&path, json.as_bytes())?;
            println!(
                "Backup saved: {} ({} tasks)",
                path.display(),
                document.tabs.len()
            );
        }
    }
    Ok(())
}

fn cmd_backup_import(env: &Env, args: ImportArgs) -> CliResult {
    let text = std::fs::read_to_string(&args.file)
        .map_err(|e| format!("could not read {}: {}", args.file, e))?;
    let payload = backup::parse_backup(&text)?;
    let (mut session, _) = env.open(None)?;
    let restored = session.import_backup(&payload)?;

    if env.json {
        println!("{}", serde_json::to_string_pretty(&ImportJson { restored })?);
    } else {
        println!("Restored {} items from backup", restored);
    }
    Ok(())
}

fn cmd_status(env: &Env) -> CliResult {
    let (mut session, _) = env.open(None)?;
    let usage = session.storage_usage();
    let stale_hours = env.config.limits.backup_stale_hours;
    let backup_stale = usage
        .last_backup
        .is_none_or(|t| (chrono::Utc::now() - t).num_hours() >= stale_hours);

    let advisories: Vec<Advisory> = [session.check_storage()?, session.check_backup()?]
        .into_iter()
        .flatten()
        .collect();

    if env.json {
        let status = StatusJson {
            usage,
            backup_stale,
            advisories,
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_usage(&usage) {
            println!("{}", line);
        }
        if backup_stale {
            println!("backup: stale");
        }
        for advisory in &advisories {
            warn_advisory(advisory);
        }
    }
    Ok(())
}

fn cmd_watch(env: &Env, args: WatchArgs) -> CliResult {
    let sort = parse_sort(&args.sort)?;
    let (mut session, _) = env.open(args.url.as_deref())?;
    session.set_sort_mode(sort);
    let watcher = StoreWatcher::start(&env.store_path)?;
    let stop_at = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    println!("{}", session.location());
    print_sessions(&session.scan_directory(sort), env.json)?;

    loop {
        if stop_at.is_some_and(|at| Instant::now() >= at) {
            break;
        }

        let mut outputs = Vec::new();
        if watcher.poll().is_some() {
            outputs.extend(session.dispatch(PipelineEvent::ManualRefresh)?);
        }
        outputs.extend(session.dispatch(PipelineEvent::Tick)?);

        for output in outputs {
            match output {
                PipelineOutput::DirectoryRefreshed(sessions) => {
                    if !env.json {
                        println!();
                    }
                    print_sessions(&sessions, env.json)?;
                }
                PipelineOutput::Advisory(advisory) => warn_advisory(&advisory),
                PipelineOutput::Saved(_) | PipelineOutput::DueDateSaved(_) => {}
            }
        }

        // Sleep until the next timer, but wake often enough to see file changes
        let now = chrono::Utc::now().timestamp_millis();
        let wait = session
            .next_deadline()
            .map_or(200, |at| (at - now).clamp(10, 200));
        std::thread::sleep(Duration::from_millis(wait as u64));
    }
    Ok(())
}
