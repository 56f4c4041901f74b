//! Fund command - hand off to a wallet app and wait for the deposit

use std::time::Duration;

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;

use fundgate_core::adapters::demo::DEMO_DEPOSIT_ADDRESS;
use fundgate_core::domain::{FundingSession, WalletProvider};
use fundgate_core::services::{events, GateOutcome, LogEvent};
use fundgate_core::{
    Destination, FundingStatus, SubmissionOutcome, TransferFlow, TransferMethod,
    WithdrawalRequest,
};

use super::{get_context, get_logger, log_event};
use crate::output;

fn spinner(json: bool) -> Option<ProgressBar> {
    if json || atty::isnt(atty::Stream::Stderr) {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

pub async fn run(amount: Decimal, wallet: &str, to: Option<String>, json: bool) -> Result<()> {
    let provider: WalletProvider = wallet.parse()?;
    let method = TransferMethod::Wallet(provider);
    let ctx = get_context()?;
    let logger = get_logger();

    let recipient = match to {
        Some(address) => address,
        None if ctx.demo_backend.is_some() => DEMO_DEPOSIT_ADDRESS.to_string(),
        None => bail!("A deposit address is required (--to)"),
    };

    let request = WithdrawalRequest::new(method, amount, Destination::Address(recipient));
    let outcome = match ctx.transfers.submit(request, TransferFlow::Fund, None).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new(events::FUNDING_FAILED)
                    .with_method(method)
                    .with_flow(TransferFlow::Fund)
                    .with_command("fund")
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    let signature = match outcome {
        GateOutcome::Completed(SubmissionOutcome::FundingStarted { signature }) => signature,
        _ => bail!("Unexpected response to a funding request"),
    };
    log_event(
        &logger,
        LogEvent::new(events::FUNDING_STARTED)
            .with_method(method)
            .with_flow(TransferFlow::Fund)
            .with_command("fund"),
    );

    if !json {
        output::info(&format!(
            "Opened {} for {}",
            provider,
            output::format_usd(amount)
        ));
        if let Some(sig) = &signature {
            println!("  Signature: {}", sig.dimmed());
        }
    }

    let pb = spinner(json);
    let mut rx = ctx.transfers.subscribe_funding();
    let settled: FundingSession = loop {
        let current = rx.borrow_and_update().clone();
        if current.status != FundingStatus::Pending {
            break current;
        }
        if let Some(pb) = &pb {
            pb.set_message(format!("Waiting for confirmation (check {})", current.attempts));
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break ctx.transfers.funding_session();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                ctx.transfers.reset_funding();
                break ctx.transfers.funding_session();
            }
        }
    };
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let event = match settled.status {
        FundingStatus::Confirmed => Some(events::FUNDING_CONFIRMED),
        FundingStatus::TimedOut => Some(events::FUNDING_TIMED_OUT),
        _ => None,
    };
    if let Some(event) = event {
        log_event(
            &logger,
            LogEvent::new(event)
                .with_method(method)
                .with_flow(TransferFlow::Fund)
                .with_command("fund"),
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&settled)?);
        return Ok(());
    }

    match settled.status {
        FundingStatus::Confirmed => output::success("Account funded"),
        FundingStatus::TimedOut => output::warning(
            "Still waiting on the network. The deposit may take a few more minutes to appear.",
        ),
        _ => output::info("Stopped waiting for confirmation"),
    }
    Ok(())
}
