//! Session command - inspect or clear the step-up authorization

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use fundgate_core::services::SessionInvalidity;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Show whether withdrawals can skip the passcode prompt
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget the stored authorization
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn describe(invalidity: SessionInvalidity) -> &'static str {
    match invalidity {
        SessionInvalidity::Missing => "no authorization on file",
        SessionInvalidity::Expired => "authorization expired",
        SessionInvalidity::NotAuthenticated => "no account configured",
        SessionInvalidity::WrongAccount => "authorization belongs to another account",
    }
}

pub fn run(command: SessionCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        SessionCommands::Status { json } => {
            let now = Utc::now().timestamp_millis();
            match ctx.session_guard.valid_session()? {
                Ok(session) => {
                    let remaining = session.remaining_ms(now);
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "valid": true,
                                "accountId": session.bound_account_id,
                                "expiresAtEpochMs": session.expires_at_epoch_ms,
                                "remainingMs": remaining,
                            })
                        );
                    } else {
                        println!(
                            "Authorization {} for {}",
                            "active".green(),
                            output::format_duration_ms(remaining)
                        );
                        println!("  Account: {}", session.bound_account_id);
                    }
                }
                Err(invalidity) => {
                    if json {
                        println!(
                            "{}",
                            serde_json::json!({
                                "valid": false,
                                "reason": describe(invalidity),
                            })
                        );
                    } else {
                        println!(
                            "Authorization {} ({})",
                            "inactive".yellow(),
                            describe(invalidity)
                        );
                        println!("The next withdrawal will ask for your passcode.");
                    }
                }
            }
        }
        SessionCommands::Clear { json } => {
            ctx.session_guard.revoke()?;
            if json {
                println!("{}", serde_json::json!({"cleared": true}));
            } else {
                output::success("Authorization cleared");
            }
        }
    }

    Ok(())
}
