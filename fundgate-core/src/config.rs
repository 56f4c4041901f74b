//! Configuration management
//!
//! Settings live in `settings.json` inside the fundgate directory:
//! ```json
//! {
//!   "app": { "demoMode": false, ... },
//!   "accountId": "acct_123",
//!   "funding": { "pollIntervalMs": 2000, "timeoutMs": 90000, "balanceEpsilon": "0.01" },
//!   "limits": { "crypto": "10000", "wallet": "5000", "fiat": "25000" },
//!   "authorization": { "sessionTtlMs": 300000, "preferBiometric": false },
//!   "api": { "baseUrl": "https://api.example.com/v1" }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::TransferMethod;

/// Environment variable forcing demo mode on or off
pub const DEMO_MODE_ENV: &str = "FUNDGATE_DEMO_MODE";

/// Environment variable overriding `api.baseUrl`
pub const API_URL_ENV: &str = "FUNDGATE_API_URL";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    account_id: Option<String>,
    #[serde(default)]
    funding: FundingSettings,
    #[serde(default)]
    limits: MethodLimits,
    #[serde(default)]
    authorization: AuthorizationSettings,
    #[serde(default)]
    api: ApiSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    demo_passcode_hash: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    demo_mode: bool,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Funding confirmation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Tolerance for ledger rounding in the balance-delta check
    #[serde(default = "default_balance_epsilon")]
    pub balance_epsilon: Decimal,
    #[serde(default = "default_activity_page_size")]
    pub activity_page_size: u32,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_timeout_ms() -> u64 {
    90_000
}

fn default_balance_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

fn default_activity_page_size() -> u32 {
    20
}

impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
            balance_epsilon: default_balance_epsilon(),
            activity_page_size: default_activity_page_size(),
        }
    }
}

impl FundingSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Per-method maximum amounts in USD (absent = unlimited)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat: Option<Decimal>,
}

impl MethodLimits {
    pub fn limit_for(&self, method: TransferMethod) -> Option<Decimal> {
        match method {
            TransferMethod::Crypto => self.crypto,
            TransferMethod::Wallet(_) => self.wallet,
            TransferMethod::Asset(_) => self.asset,
            TransferMethod::Fiat => self.fiat,
        }
    }
}

/// Step-up authorization tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationSettings {
    #[serde(default = "default_session_ttl_ms")]
    pub session_ttl_ms: i64,
    #[serde(default)]
    pub prefer_biometric: bool,
}

fn default_session_ttl_ms() -> i64 {
    5 * 60 * 1000
}

impl Default for AuthorizationSettings {
    fn default() -> Self {
        Self {
            session_ttl_ms: default_session_ttl_ms(),
            prefer_biometric: false,
        }
    }
}

/// Remote service endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub wallet_bridge_url: Option<String>,
}

/// Fundgate configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub demo_mode: bool,
    pub account_id: Option<String>,
    pub funding: FundingSettings,
    pub limits: MethodLimits,
    pub authorization: AuthorizationSettings,
    pub api: ApiSettings,
    pub demo_passcode_hash: Option<String>,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the fundgate directory
    ///
    /// Demo mode can be enabled via:
    /// 1. Settings file (fg demo on)
    /// 2. Environment variable FUNDGATE_DEMO_MODE (for CI/testing)
    pub fn load(fundgate_dir: &Path) -> Result<Self> {
        let settings_path = fundgate_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let demo_mode = match std::env::var(DEMO_MODE_ENV).ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => false,
            _ => raw.app.demo_mode,
        };

        let mut api = raw.api.clone();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            api.base_url = Some(url);
        }

        Ok(Self {
            demo_mode,
            account_id: raw.account_id.clone(),
            funding: raw.funding.clone(),
            limits: raw.limits.clone(),
            authorization: raw.authorization.clone(),
            api,
            demo_passcode_hash: raw.demo_passcode_hash.clone(),
            _raw_settings: raw,
        })
    }

    /// Save config to the fundgate directory
    /// Preserves other settings that the CLI doesn't manage
    pub fn save(&self, fundgate_dir: &Path) -> Result<()> {
        let settings_path = fundgate_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.app.demo_mode = self.demo_mode;
        settings.account_id = self.account_id.clone();
        settings.funding = self.funding.clone();
        settings.limits = self.limits.clone();
        settings.authorization = self.authorization.clone();
        settings.demo_passcode_hash = self.demo_passcode_hash.clone();
        // Env overrides are not persisted
        if std::env::var(API_URL_ENV).is_err() {
            settings.api = self.api.clone();
        }

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Enable demo mode
    pub fn enable_demo_mode(&mut self) {
        self.demo_mode = true;
    }

    /// Disable demo mode
    pub fn disable_demo_mode(&mut self) {
        self.demo_mode = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.funding.poll_interval_ms, 2_000);
        assert_eq!(config.funding.timeout_ms, 90_000);
        assert_eq!(config.funding.balance_epsilon, Decimal::new(1, 2));
        assert_eq!(config.authorization.session_ttl_ms, 300_000);
        assert!(config.limits.crypto.is_none());
    }

    #[test]
    fn test_reads_camel_case_settings() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "accountId": "acct_1",
                "funding": { "timeoutMs": 30000, "balanceEpsilon": "0.05" },
                "limits": { "wallet": "500" },
                "authorization": { "preferBiometric": true }
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.account_id.as_deref(), Some("acct_1"));
        assert_eq!(config.funding.timeout_ms, 30_000);
        assert_eq!(config.funding.poll_interval_ms, 2_000);
        assert_eq!(config.funding.balance_epsilon, Decimal::new(5, 2));
        assert_eq!(config.limits.wallet, Some(Decimal::new(500, 0)));
        assert!(config.authorization.prefer_biometric);
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "app": { "theme": "dark" }, "featureFlags": { "x": true } }"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.account_id = Some("acct_2".into());
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["app"]["theme"], "dark");
        assert_eq!(value["featureFlags"]["x"], true);
        assert_eq!(value["accountId"], "acct_2");
    }
}
