//! Withdraw command - submit a withdrawal through the authorization gate

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use rust_decimal::Decimal;

use fundgate_core::domain::Challenge;
use fundgate_core::services::{
    events, GateOutcome, GateSnapshot, LogEvent, LoggingService, TransferOutcome,
};
use fundgate_core::{
    Destination, Error, FundgateContext, OperationResult, SubmissionOutcome, TransferFlow,
    TransferMethod, WithdrawalRequest,
};

use super::{get_context, get_logger, log_event};
use crate::output;

const MAX_PASSCODE_ATTEMPTS: u32 = 3;

pub struct WithdrawArgs {
    pub amount: Decimal,
    pub method: String,
    pub to: Option<String>,
    pub routing: Option<String>,
    pub asset: Option<String>,
    pub chain: Option<String>,
    pub passcode: Option<String>,
    pub json: bool,
}

fn build_request(args: &WithdrawArgs) -> Result<WithdrawalRequest> {
    let method: TransferMethod = args.method.parse()?;
    let destination = match method {
        TransferMethod::Fiat => Destination::RoutingNumber(
            args.routing
                .clone()
                .context("--routing is required for bank withdrawals")?,
        ),
        TransferMethod::Asset(_) => Destination::AssetSymbol(
            args.asset
                .clone()
                .context("--asset is required for trades")?,
        ),
        TransferMethod::Crypto | TransferMethod::Wallet(_) => Destination::Address(
            args.to
                .clone()
                .context("--to is required for crypto withdrawals")?,
        ),
    };
    let mut request = WithdrawalRequest::new(method, args.amount, destination);
    if let Some(chain) = &args.chain {
        request = request.with_chain(chain.clone());
    }
    Ok(request)
}

/// Answer challenges until the withdrawal runs, fails or the user gives up
async fn authorize(
    ctx: &FundgateContext,
    logger: &Option<LoggingService>,
    method: TransferMethod,
    mut outcome: std::result::Result<TransferOutcome, Error>,
    mut passcode: Option<String>,
    json: bool,
) -> Result<SubmissionOutcome> {
    let mut attempts = 0;
    loop {
        let snapshot: GateSnapshot = match outcome {
            Ok(GateOutcome::Completed(result)) => return Ok(result),
            Ok(GateOutcome::ChallengeRequired(snapshot)) => {
                log_event(
                    logger,
                    LogEvent::new(events::AUTHORIZATION_REQUIRED)
                        .with_method(method)
                        .with_flow(TransferFlow::Withdraw),
                );
                snapshot
            }
            Err(Error::InvalidPasscode) => {
                log_event(
                    logger,
                    LogEvent::new(events::PASSCODE_REJECTED).with_method(method),
                );
                ctx.transfers.gate_snapshot()
            }
            Err(Error::BiometricUnavailable(_)) => ctx.transfers.gate_snapshot(),
            Err(e) => return Err(e.into()),
        };

        if let Some(message) = &snapshot.message {
            if !json {
                output::warning(message);
            }
        }

        if snapshot.challenge == Some(Challenge::Biometric) {
            outcome = ctx.transfers.authorize_biometric().await;
            continue;
        }

        if attempts >= MAX_PASSCODE_ATTEMPTS {
            ctx.transfers.cancel();
            bail!("Too many incorrect passcodes; withdrawal cancelled");
        }
        attempts += 1;

        let code = match passcode.take() {
            Some(code) => code,
            None if json || atty::isnt(atty::Stream::Stdin) => {
                ctx.transfers.cancel();
                bail!("A passcode is required; pass --passcode or set FUNDGATE_PASSCODE");
            }
            None => Password::new().with_prompt("Passcode").interact()?,
        };
        outcome = ctx.transfers.verify_passcode(&code).await;
    }
}

pub async fn run(args: WithdrawArgs) -> Result<()> {
    let request = build_request(&args)?;
    let method = request.method;
    let ctx = get_context()?;
    let logger = get_logger();

    let outcome = ctx
        .transfers
        .submit(request, TransferFlow::Withdraw, None)
        .await;
    let result = authorize(&ctx, &logger, method, outcome, args.passcode, args.json).await;

    let submitted = match result {
        Ok(submitted) => submitted,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new(events::WITHDRAWAL_FAILED)
                    .with_method(method)
                    .with_flow(TransferFlow::Withdraw)
                    .with_command("withdraw")
                    .with_error(e.to_string()),
            );
            if args.json {
                let failed: OperationResult<SubmissionOutcome> = OperationResult::fail(e.to_string());
                println!("{}", serde_json::to_string_pretty(&failed)?);
            }
            return Err(e);
        }
    };

    let event = match &submitted {
        SubmissionOutcome::TradeRedirect { .. } => events::TRADE_REDIRECTED,
        _ => events::WITHDRAWAL_SUBMITTED,
    };
    log_event(
        &logger,
        LogEvent::new(event)
            .with_method(method)
            .with_flow(TransferFlow::Withdraw)
            .with_command("withdraw"),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&OperationResult::ok(&submitted))?);
        return Ok(());
    }

    match submitted {
        SubmissionOutcome::Withdrawn { receipt } => {
            output::success(&format!(
                "Withdrawal of {} submitted",
                output::format_usd(args.amount)
            ));
            if let Some(id) = receipt.id {
                println!("  Reference: {}", id);
            }
            if let Some(status) = receipt.status {
                println!("  Status: {}", status);
            }
        }
        SubmissionOutcome::TradeRedirect {
            side,
            symbol,
            amount,
        } => {
            output::info(&format!(
                "Continue the {} of {} ${} in the trade screen",
                TransferMethod::Asset(side),
                symbol,
                amount
            ));
        }
        SubmissionOutcome::FundingStarted { .. } => {
            output::info("Funding started");
        }
    }
    Ok(())
}
