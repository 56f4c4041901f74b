//! Demo command - manage demo mode

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use fundgate_core::adapters::demo::{hash_demo_passcode, DEMO_PASSCODE};
use fundgate_core::adapters::file_store::FileAuthStore;
use fundgate_core::config::Config;
use fundgate_core::ports::AuthStore;

use super::get_fundgate_dir;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off,
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let dir = get_fundgate_dir()?;
    std::fs::create_dir_all(&dir)?;
    let mut config = Config::load(&dir)?;

    match command {
        Some(DemoCommands::On) => {
            config.enable_demo_mode();
            if config.demo_passcode_hash.is_none() {
                config.demo_passcode_hash =
                    Some(hash_demo_passcode(DEMO_PASSCODE).context("Failed to hash demo passcode")?);
            }
            config.save(&dir)?;
            println!("{}", "Demo mode enabled".green());
            println!(
                "Transfers now run against a simulated ledger. Demo passcode: {}",
                DEMO_PASSCODE.bold()
            );
        }
        Some(DemoCommands::Off) => {
            config.disable_demo_mode();
            config.save(&dir)?;
            // A demo authorization must not carry over to the real account
            FileAuthStore::new(&dir, None).invalidate()?;
            println!("{}", "Demo mode disabled".yellow());
        }
        Some(DemoCommands::Status) | None => {
            if config.demo_mode {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
        }
    }
    Ok(())
}
