//! Fundgate CLI - fund and withdraw from your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::Level;

mod commands;
mod output;

use commands::{demo, fund, logs, session, status, withdraw};

/// Fundgate - fund and withdraw from your terminal
#[derive(Parser)]
#[command(name = "fg", version, about, long_about = None)]
struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fund the account from an external wallet and wait for confirmation
    Fund {
        /// Amount in USD
        amount: Decimal,
        /// Wallet app to hand off to (phantom, solflare, backpack)
        #[arg(long, short)]
        wallet: String,
        /// Deposit address (defaults to the demo address in demo mode)
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw funds (asks for your passcode when needed)
    Withdraw {
        /// Amount in USD
        amount: Decimal,
        /// crypto, fiat, buy, sell or a wallet provider
        #[arg(long, short, default_value = "crypto")]
        method: String,
        /// Destination address
        #[arg(long)]
        to: Option<String>,
        /// Bank routing number (fiat)
        #[arg(long)]
        routing: Option<String>,
        /// Asset symbol (buy/sell)
        #[arg(long)]
        asset: Option<String>,
        /// Destination chain
        #[arg(long)]
        chain: Option<String>,
        /// Passcode (prompted for when omitted)
        #[arg(long, env = "FUNDGATE_PASSCODE", hide_env_values = true)]
        passcode: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and authorization status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the step-up authorization session
    Session {
        #[command(subcommand)]
        command: session::SessionCommands,
    },

    /// View and manage the transfer event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Fund {
            amount,
            wallet,
            to,
            json,
        } => fund::run(amount, &wallet, to, json).await,
        Commands::Withdraw {
            amount,
            method,
            to,
            routing,
            asset,
            chain,
            passcode,
            json,
        } => {
            withdraw::run(withdraw::WithdrawArgs {
                amount,
                method,
                to,
                routing,
                asset,
                chain,
                passcode,
                json,
            })
            .await
        }
        Commands::Status { json } => status::run(json),
        Commands::Session { command } => session::run(command),
        Commands::Logs { command } => logs::run(command),
        Commands::Demo { command } => demo::run(command),
    }
}
