//! Transfer methods and wallet providers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::Error;

/// External wallet applications a funding hand-off can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletProvider {
    Phantom,
    Solflare,
    Backpack,
}

impl WalletProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletProvider::Phantom => "phantom",
            WalletProvider::Solflare => "solflare",
            WalletProvider::Backpack => "backpack",
        }
    }
}

impl fmt::Display for WalletProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phantom" => Ok(WalletProvider::Phantom),
            "solflare" => Ok(WalletProvider::Solflare),
            "backpack" => Ok(WalletProvider::Backpack),
            other => Err(Error::validation(format!("Unknown wallet provider: {}", other))),
        }
    }
}

/// Direction of an asset trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// How money leaves (or enters) the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "variant", rename_all = "lowercase")]
pub enum TransferMethod {
    /// On-chain transfer to an arbitrary address
    Crypto,
    /// Wallet-specific variant (withdraw to, or fund from, an external wallet)
    Wallet(WalletProvider),
    /// Asset trade routing; never moves third-party funds
    Asset(TradeSide),
    /// Bank transfer
    Fiat,
}

impl TransferMethod {
    /// Key used for per-method limits in settings
    pub fn limit_key(&self) -> &'static str {
        match self {
            TransferMethod::Crypto => "crypto",
            TransferMethod::Wallet(_) => "wallet",
            TransferMethod::Asset(_) => "asset",
            TransferMethod::Fiat => "fiat",
        }
    }

    /// Crypto-family methods share the on-chain withdrawal mutation
    pub fn is_crypto_family(&self) -> bool {
        matches!(self, TransferMethod::Crypto | TransferMethod::Wallet(_))
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMethod::Crypto => f.write_str("crypto"),
            TransferMethod::Wallet(p) => write!(f, "{}", p),
            TransferMethod::Asset(TradeSide::Buy) => f.write_str("buy"),
            TransferMethod::Asset(TradeSide::Sell) => f.write_str("sell"),
            TransferMethod::Fiat => f.write_str("fiat"),
        }
    }
}

impl FromStr for TransferMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crypto" => Ok(TransferMethod::Crypto),
            "fiat" | "bank" => Ok(TransferMethod::Fiat),
            "buy" => Ok(TransferMethod::Asset(TradeSide::Buy)),
            "sell" => Ok(TransferMethod::Asset(TradeSide::Sell)),
            other => other.parse::<WalletProvider>().map(TransferMethod::Wallet).map_err(|_| {
                Error::validation(format!("Unknown transfer method: {}", other))
            }),
        }
    }
}

/// Whether a submission adds money to the account or takes it out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFlow {
    Fund,
    Withdraw,
}
