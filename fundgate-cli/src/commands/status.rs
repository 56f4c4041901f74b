//! Status command - configuration, limits and authorization at a glance

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use fundgate_core::adapters::http::DEFAULT_API_URL;
use fundgate_core::config::Config;
use fundgate_core::domain::withdrawal::normalize_amount;
use fundgate_core::ports::AuthStore;

use super::get_context;
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusSummary {
    demo_mode: bool,
    account_id: Option<String>,
    api_url: String,
    wallet_bridge: bool,
    authorization_active: bool,
    poll_interval_ms: u64,
    timeout_ms: u64,
    balance_epsilon: String,
    limits: Vec<(String, Option<String>)>,
    demo_balance: Option<String>,
}

fn limits(config: &Config) -> Vec<(String, Option<String>)> {
    let l = &config.limits;
    [
        ("crypto", l.crypto),
        ("wallet", l.wallet),
        ("asset", l.asset),
        ("fiat", l.fiat),
    ]
    .into_iter()
    .map(|(name, limit)| (name.to_string(), limit.map(normalize_amount)))
    .collect()
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let config = &ctx.config;

    let summary = StatusSummary {
        demo_mode: config.demo_mode,
        account_id: ctx.auth_store.current_account_id(),
        api_url: config
            .api
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        wallet_bridge: config.api.wallet_bridge_url.is_some(),
        authorization_active: ctx.session_guard.is_valid(),
        poll_interval_ms: config.funding.poll_interval_ms,
        timeout_ms: config.funding.timeout_ms,
        balance_epsilon: config.funding.balance_epsilon.to_string(),
        limits: limits(config),
        demo_balance: ctx
            .demo_backend
            .as_ref()
            .map(|b| normalize_amount(b.balance())),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", "Fundgate Status".bold());
    println!();

    let mut table = output::create_table();
    let mode = if summary.demo_mode {
        "demo".yellow().to_string()
    } else {
        "live".green().to_string()
    };
    table.add_row(vec!["Mode".to_string(), mode]);
    table.add_row(vec![
        "Account".to_string(),
        summary.account_id.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    if !summary.demo_mode {
        table.add_row(vec!["API".to_string(), summary.api_url.clone()]);
        table.add_row(vec![
            "Wallet bridge".to_string(),
            if summary.wallet_bridge { "configured" } else { "not configured" }.to_string(),
        ]);
    }
    if let Some(balance) = &summary.demo_balance {
        table.add_row(vec!["Demo balance".to_string(), format!("${}", balance)]);
    }
    table.add_row(vec![
        "Authorization".to_string(),
        if summary.authorization_active { "active" } else { "inactive" }.to_string(),
    ]);
    table.add_row(vec![
        "Confirmation".to_string(),
        format!(
            "every {}ms, gives up after {}",
            summary.poll_interval_ms,
            output::format_duration_ms(summary.timeout_ms as i64)
        ),
    ]);
    println!("{}", table);

    let mut limits_table = output::create_table();
    limits_table.set_header(vec!["Method", "Limit"]);
    for (name, limit) in &summary.limits {
        limits_table.add_row(vec![
            name.clone(),
            limit
                .as_ref()
                .map(|l| format!("${}", l))
                .unwrap_or_else(|| "none".to_string()),
        ]);
    }
    println!();
    println!("{}", "Limits".bold());
    println!("{}", limits_table);

    Ok(())
}
