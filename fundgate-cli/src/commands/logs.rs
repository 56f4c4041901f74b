//! Logs command - view and manage the transfer event log

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use fundgate_core::services::{EntryPoint, LoggingService};

use super::get_fundgate_dir;
use crate::output;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete log entries
    Clear {
        /// Only delete entries older than N days
        #[arg(long)]
        older_than_days: Option<u64>,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show per-event counts and the database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    let dir = get_fundgate_dir()?;
    std::fs::create_dir_all(&dir)?;
    LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = get_logging_service()?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            json,
        } => {
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Event", "Method", "Flow", "Command", "Error"]);
            for entry in entries {
                let error = entry
                    .error_message
                    .as_deref()
                    .map(|e| e.red().to_string())
                    .unwrap_or_default();
                table.add_row(vec![
                    output::format_timestamp(entry.timestamp),
                    entry.event,
                    entry.method.unwrap_or_default(),
                    entry.flow.unwrap_or_default(),
                    entry.command.unwrap_or_default(),
                    error,
                ]);
            }
            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            if !force && !json {
                use dialoguer::Confirm;
                let prompt = match older_than_days {
                    Some(days) => format!("Delete log entries older than {} days?", days),
                    None => "Delete all log entries?".to_string(),
                };
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = match older_than_days {
                Some(days) => {
                    let cutoff_ms =
                        Utc::now().timestamp_millis() - (days as i64 * 24 * 60 * 60 * 1000);
                    service.delete_before(cutoff_ms)?
                }
                None => service.clear()?,
            };

            if json {
                println!("{}", serde_json::json!({"deleted": deleted}));
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats { json } => {
            let total = service.count()?;
            let by_event = service.stats()?;
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "events": by_event,
                        "database_path": db_path.to_string_lossy(),
                        "database_size_bytes": size_bytes
                    })
                );
                return Ok(());
            }

            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Database: {}", db_path.display());
            println!("  Size: {} bytes", size_bytes);
            if !by_event.is_empty() {
                let mut table = output::create_table();
                table.set_header(vec!["Event", "Count"]);
                for count in by_event {
                    table.add_row(vec![count.event, count.count.to_string()]);
                }
                println!();
                println!("{}", table);
            }
        }
    }

    Ok(())
}
