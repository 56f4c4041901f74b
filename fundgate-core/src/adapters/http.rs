//! HTTP client for the ledger, withdrawal and passcode services
//!
//! Endpoints (relative to the configured base URL):
//! - `GET  /ledger/deposits?page=N&pageSize=M` returns `{ deposits: [...] }`, newest first
//! - `GET  /station/balance` returns `{ balanceUsd: "123.45" }`
//! - `POST /withdrawals` and `POST /withdrawals/fiat` return `{ id, status }`
//! - `POST /auth/passcode/verify` returns `{ verified, token? }`
//!
//! Wallet hand-off goes to a separate bridge service (`POST /fund`) that opens
//! the wallet app on the user's device and reports the signature back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::domain::result::{Error, HandOffErrorKind, Result};
use crate::domain::{
    ActivityEntry, CryptoWithdrawalPayload, FiatWithdrawalPayload, HandoffReceipt,
    PasscodeVerification, WithdrawalReceipt,
};
use crate::ports::{
    AuthStore, LedgerQuery, PasscodeVerifier, WalletFundingParams, WalletHandoff,
    WithdrawalMutations,
};

/// Default production API URL
pub const DEFAULT_API_URL: &str = "https://api.fundgate.app/v1";

/// Header carrying the step-up authorization token on mutations
pub const SESSION_HEADER: &str = "x-authorization-session";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositsResponse {
    deposits: Vec<DepositDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositDto {
    id: String,
    amount_usd: Decimal,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    created_at_epoch_ms: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    balance_usd: Decimal,
}

#[derive(Debug, Serialize)]
struct PasscodeRequest<'a> {
    passcode: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    signature: Option<String>,
}

/// JSON client for the remote services
pub struct ApiClient {
    client: Client,
    base_url: Url,
    bridge_url: Option<Url>,
    auth_store: Option<Arc<dyn AuthStore>>,
}

fn parse_base(raw: &str) -> Result<Url> {
    // A trailing slash makes Url::join append instead of replacing the last segment
    let normalized = format!("{}/", raw.trim().trim_end_matches('/'));
    let url = Url::parse(&normalized)
        .map_err(|e| Error::Config(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::Config(format!("Unsupported URL scheme '{}'", other))),
    }
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_base(base_url)?,
            bridge_url: None,
            auth_store: None,
        })
    }

    /// Enable wallet hand-off through the bridge service at `url`
    pub fn with_wallet_bridge(mut self, url: &str) -> Result<Self> {
        self.bridge_url = Some(parse_base(url)?);
        Ok(self)
    }

    /// Attach the stored step-up token to withdrawal mutations
    pub fn with_auth_store(mut self, store: Arc<dyn AuthStore>) -> Self {
        self.auth_store = Some(store);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", path, e)))
    }

    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .auth_store
            .as_ref()
            .and_then(|store| store.session().ok().flatten())
            .map(|session| session.token);
        match token {
            Some(token) => request.header(SESSION_HEADER, token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(map_request_error)?;
        check_status(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Network(format!("Unexpected response body: {}", e)))
    }
}

fn map_request_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Network(format!(
            "Request timed out after {} seconds",
            REQUEST_TIMEOUT.as_secs()
        ))
    } else if error.is_connect() {
        Error::Network("Unable to reach the server".to_string())
    } else {
        Error::Network(format!("Request failed: {}", error))
    }
}

async fn read_error_body(response: Response) -> (StatusCode, ErrorBody) {
    let status = response.status();
    let body = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<ErrorBody>(&text).ok())
        .unwrap_or_default();
    (status, body)
}

/// Turn a non-2xx response into [`Error::Remote`], keeping the server's message
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, body) = read_error_body(response).await;
    let message = body
        .error
        .or(body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    Err(Error::remote(status.as_u16(), message))
}

#[async_trait]
impl LedgerQuery for ApiClient {
    async fn recent_deposits(&self, page: u32, page_size: u32) -> Result<Vec<ActivityEntry>> {
        let mut url = self.endpoint("ledger/deposits")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("pageSize", &page_size.to_string());

        let response = self.send(self.client.get(url)).await?;
        let body: DepositsResponse = Self::read_json(response).await?;
        Ok(body
            .deposits
            .into_iter()
            .map(|d| ActivityEntry {
                id: d.id,
                amount_usd: d.amount_usd,
                reference: d.signature,
                created_at_epoch_ms: d.created_at_epoch_ms,
            })
            .collect())
    }

    async fn station_balance(&self) -> Result<Decimal> {
        let response = self
            .send(self.client.get(self.endpoint("station/balance")?))
            .await?;
        let body: BalanceResponse = Self::read_json(response).await?;
        Ok(body.balance_usd)
    }
}

#[async_trait]
impl WithdrawalMutations for ApiClient {
    async fn initiate_withdrawal(&self, payload: &CryptoWithdrawalPayload) -> Result<WithdrawalReceipt> {
        let request = self.client.post(self.endpoint("withdrawals")?).json(payload);
        let response = self.send(self.with_session(request)).await?;
        Self::read_json(response).await
    }

    async fn initiate_fiat_withdrawal(&self, payload: &FiatWithdrawalPayload) -> Result<WithdrawalReceipt> {
        let request = self
            .client
            .post(self.endpoint("withdrawals/fiat")?)
            .json(payload);
        let response = self.send(self.with_session(request)).await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl PasscodeVerifier for ApiClient {
    async fn verify_passcode(&self, passcode: &str) -> Result<PasscodeVerification> {
        let request = self
            .client
            .post(self.endpoint("auth/passcode/verify")?)
            .json(&PasscodeRequest { passcode });
        let response = request.send().await.map_err(map_request_error)?;
        // A wrong passcode may come back as 401/403 instead of `verified: false`
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(PasscodeVerification::default());
        }
        let response = check_status(response).await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl WalletHandoff for ApiClient {
    async fn start_mobile_wallet_funding(&self, params: &WalletFundingParams) -> Result<HandoffReceipt> {
        let Some(bridge) = &self.bridge_url else {
            return Err(Error::hand_off(
                HandOffErrorKind::WalletNotInstalled,
                format!("No wallet bridge configured for {}", params.wallet),
            ));
        };
        let url = bridge
            .join("fund")
            .map_err(|e| Error::Config(format!("Invalid wallet bridge URL: {}", e)))?;

        debug!(wallet = %params.wallet, "requesting wallet hand-off");
        let response = self
            .client
            .post(url)
            .json(params)
            .send()
            .await
            .map_err(|e| Error::hand_off(HandOffErrorKind::Failed, map_request_error(e).to_string()))?;

        if response.status().is_success() {
            let body: BridgeResponse = Self::read_json(response).await?;
            return Ok(HandoffReceipt {
                signature: body.signature.filter(|s| !s.is_empty()),
            });
        }

        let (status, body) = read_error_body(response).await;
        let kind = match body.code.as_deref() {
            Some("wallet_not_installed") => HandOffErrorKind::WalletNotInstalled,
            Some("user_cancelled") => HandOffErrorKind::UserCancelled,
            _ => HandOffErrorKind::Failed,
        };
        let message = body
            .error
            .or(body.message)
            .unwrap_or_else(|| format!("Wallet bridge returned HTTP {}", status.as_u16()));
        Err(Error::hand_off(kind, message))
    }
}
