//! Claude session monitor - CLI entry point
//!
//! This binary provides the command-line interface for the `cmon` daemon.
//! It supports running in foreground or daemonized mode, reading the
//! published snapshot, managing configuration, and appending hook events.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};

use claude_monitor::config::xdg;
use claude_monitor::daemon::hook_log::{self, HookEvent};
use claude_monitor::daemon::{load_config, run_daemon, SnapshotStore};
use claude_monitor::{HookEventKind, MonitoringSnapshot};

/// Claude session monitoring daemon
#[derive(Parser)]
#[command(name = "cmon")]
#[command(version, about = "Claude session monitoring daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the cmon CLI
#[derive(Subcommand)]
enum Commands {
    /// Start the monitor daemon
    Daemon {
        /// Run as a background daemon (detached from terminal)
        #[arg(long)]
        daemonize: bool,

        /// Path to the configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a summary of the current snapshot
    Status {
        /// Path to the configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the raw snapshot JSON
    Dump {
        /// Path to the configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Manage configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Append a hook event to the event log (invoked by Claude Code hooks,
    /// reads the hook JSON from stdin for the working directory)
    Hook {
        /// Event kind: pre-tool-use or stop
        kind: HookEventKind,

        /// Project path override; when absent the hook JSON's `cwd` field
        /// (or the current directory) is used
        #[arg(long)]
        project_path: Option<PathBuf>,

        /// Path to the configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Actions for the `config` subcommand.
#[derive(Subcommand)]
enum ConfigAction {
    /// Create default configuration file
    Init {
        /// Overwrite existing configuration (creates backup)
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
    /// Validate configuration file
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon { daemonize, config } => {
            if let Err(e) = run_daemon(config.as_deref(), daemonize) {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        Commands::Status { config } => {
            return run_status_command(config.as_deref());
        }
        Commands::Dump { config } => {
            return run_dump_command(config.as_deref());
        }
        Commands::Config { action } => {
            use claude_monitor::config::{default, ConfigLoader};
            let result = match action {
                ConfigAction::Init { force } => match default::create_default_config(force) {
                    Ok(path) => {
                        println!("Created configuration at {}", path.display());
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                ConfigAction::Path => {
                    println!("{}", xdg::config_path().display());
                    Ok(())
                }
                ConfigAction::Validate => match ConfigLoader::load_default() {
                    Ok(config) => {
                        println!("Configuration is valid");
                        println!("{config:#?}");
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
            };
            if let Err(e) = result {
                eprintln!("Config error: {e}");
                return ExitCode::FAILURE;
            }
        }
        Commands::Hook {
            kind,
            project_path,
            config,
        } => {
            return run_hook_command(kind, project_path, config.as_deref());
        }
    }

    ExitCode::SUCCESS
}

/// Open the snapshot store described by the configuration.
fn open_store(config_path: Option<&Path>) -> Result<(SnapshotStore, std::time::Duration), String> {
    let config = load_config(config_path).map_err(|e| e.to_string())?;
    let snapshot_path = config
        .daemon
        .snapshot_path
        .as_deref()
        .map(xdg::expand_tilde)
        .unwrap_or_else(xdg::snapshot_path);
    let mirror_path = config.daemon.mirror_path.as_deref().map(xdg::expand_tilde);
    Ok((
        SnapshotStore::new(snapshot_path, mirror_path),
        config.daemon.stale_after(),
    ))
}

/// Reads the snapshot and prints a human summary with a staleness verdict.
fn run_status_command(config_path: Option<&Path>) -> ExitCode {
    let (store, stale_after) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match store.read() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("Error: {} (is the daemon running?)", e);
            return ExitCode::FAILURE;
        }
    };

    print_status(&store, &snapshot, stale_after);
    ExitCode::SUCCESS
}

fn print_status(store: &SnapshotStore, snapshot: &MonitoringSnapshot, stale_after: std::time::Duration) {
    let freshness = if store.is_stale(stale_after) {
        "stale"
    } else {
        "fresh"
    };
    let age = store
        .age()
        .map(|a| format!("{}s old", a.as_secs()))
        .unwrap_or_else(|| "age unknown".to_string());

    println!("Snapshot: {} ({}, {})", store.path().display(), age, freshness);
    println!(
        "Billing period: {} → {}",
        snapshot.billing.period_start.format("%Y-%m-%d"),
        snapshot.billing.period_end.format("%Y-%m-%d")
    );
    println!(
        "Sessions: {} (${:.4}, {} tokens, max {}/session)",
        snapshot.billing.session_count,
        snapshot.billing.total_cost_usd,
        snapshot.billing.total_tokens,
        snapshot.billing.max_tokens_per_session
    );
    match &snapshot.last_collection_at {
        Some(at) => println!("Last collection: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Last collection: never"),
    }

    if snapshot.activity.is_empty() {
        println!("Activity: none");
    } else {
        println!("Activity:");
        for session in &snapshot.activity {
            let idle = (snapshot.generated_at - session.last_event_at)
                .num_seconds()
                .max(0);
            println!(
                "  {:<24} {:<8} (last event {}s before snapshot)",
                session.project_name, session.status, idle
            );
        }
    }
}

/// Prints the snapshot document verbatim.
fn run_dump_command(config_path: Option<&Path>) -> ExitCode {
    let (store, _) = match open_store(config_path) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match std::fs::read_to_string(store.path()) {
        Ok(content) => {
            println!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to read {}: {} (is the daemon running?)", store.path().display(), e);
            ExitCode::FAILURE
        }
    }
}

/// Appends one event to the hook log.
///
/// The project path comes from `--project-path`, else from the `cwd` field
/// of the hook JSON on stdin, else from the current directory. Output stays
/// quiet on success — hooks run inside Claude Code and should not pollute
/// the transcript.
fn run_hook_command(
    kind: HookEventKind,
    project_path: Option<PathBuf>,
    config_path: Option<&Path>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let log_path = config
        .activity
        .log_path
        .as_deref()
        .map(xdg::expand_tilde)
        .unwrap_or_else(xdg::hook_log_path);

    let project_path = project_path
        .or_else(cwd_from_stdin)
        .or_else(|| std::env::current_dir().ok());
    let Some(project_path) = project_path else {
        eprintln!("Error: could not determine project path");
        return ExitCode::FAILURE;
    };

    let event = HookEvent {
        project_path,
        kind,
        timestamp: Utc::now(),
    };
    if let Err(e) = hook_log::append_event(&log_path, &event) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Extract the `cwd` field from the Claude Code hook JSON on stdin.
///
/// Returns `None` when stdin is empty, unreadable, or not the expected
/// shape — the hook must degrade gracefully rather than fail Claude Code.
fn cwd_from_stdin() -> Option<PathBuf> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input).ok()?;
    if input.trim().is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&input).ok()?;
    value.get("cwd")?.as_str().map(PathBuf::from)
}
