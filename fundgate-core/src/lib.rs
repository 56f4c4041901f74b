//! Fundgate Core - funding confirmation and withdrawal authorization
//!
//! This crate implements the money-movement core following hexagonal architecture:
//!
//! - **domain**: Requests, sessions, outcomes and the error type
//! - **ports**: Trait definitions for the wallet, ledger, withdrawal and auth services
//! - **services**: Poller, dispatcher, authorization gate and the transfer facade
//! - **adapters**: Concrete implementations (HTTP client, demo backend, auth stores)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use adapters::demo::{DemoBackend, DemoTiming, DEMO_PASSCODE};
use adapters::file_store::FileAuthStore;
use adapters::http::{ApiClient, DEFAULT_API_URL};
use adapters::memory::{NoopInvalidator, SystemClock};
use config::Config;
use ports::{
    AuthStore, BiometricAuthorizer, CacheInvalidator, Clock, LedgerQuery, PasscodeVerifier,
    WalletHandoff, WithdrawalMutations,
};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    Destination, FundingSession, FundingStatus, SubmissionOutcome, TransferFlow, TransferMethod,
    WithdrawalRequest,
};

/// Account the demo backend pretends the user is signed in as
pub const DEMO_ACCOUNT_ID: &str = "demo-account";

/// Station balance a demo starts with, in cents
const DEMO_STARTING_BALANCE_CENTS: i64 = 100_000;

/// Everything the services need from the outside world
pub struct Ports {
    pub wallet: Arc<dyn WalletHandoff>,
    pub ledger: Arc<dyn LedgerQuery>,
    pub mutations: Arc<dyn WithdrawalMutations>,
    pub passcode: Arc<dyn PasscodeVerifier>,
    pub biometric: Option<Arc<dyn BiometricAuthorizer>>,
    pub auth_store: Arc<dyn AuthStore>,
    pub cache: Arc<dyn CacheInvalidator>,
    pub clock: Arc<dyn Clock>,
}

impl Ports {
    /// Every remote port served by one demo backend
    pub fn demo(
        backend: Arc<DemoBackend>,
        auth_store: Arc<dyn AuthStore>,
        cache: Arc<dyn CacheInvalidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let biometric: Arc<dyn BiometricAuthorizer> = backend.clone();
        Self {
            wallet: backend.clone(),
            ledger: backend.clone(),
            mutations: backend.clone(),
            passcode: backend,
            biometric: Some(biometric),
            auth_store,
            cache,
            clock,
        }
    }

    /// Every remote port served by the HTTP client; no biometrics outside a device
    pub fn api(
        client: Arc<ApiClient>,
        auth_store: Arc<dyn AuthStore>,
        cache: Arc<dyn CacheInvalidator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            wallet: client.clone(),
            ledger: client.clone(),
            mutations: client.clone(),
            passcode: client,
            biometric: None,
            auth_store,
            cache,
            clock,
        }
    }
}

/// Main context for Fundgate operations
///
/// Holds the configuration and the wired services. Front ends build one
/// per process.
pub struct FundgateContext {
    pub config: Config,
    pub auth_store: Arc<dyn AuthStore>,
    pub session_guard: SessionGuard,
    pub poller: Arc<FundingPoller>,
    pub transfers: TransferService,
    /// Set in demo mode so front ends can show the simulated ledger
    pub demo_backend: Option<Arc<DemoBackend>>,
}

impl FundgateContext {
    /// Create a context from the settings in `fundgate_dir`
    ///
    /// Demo mode wires the simulated backend, otherwise the HTTP client. The
    /// step-up session is kept in `session.json` so it outlives the process.
    pub fn new(fundgate_dir: &Path) -> Result<Self> {
        let config = Config::load(fundgate_dir)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache: Arc<dyn CacheInvalidator> = Arc::new(NoopInvalidator);

        let account_id = config
            .account_id
            .clone()
            .or_else(|| config.demo_mode.then(|| DEMO_ACCOUNT_ID.to_string()));
        let auth_store: Arc<dyn AuthStore> =
            Arc::new(FileAuthStore::new(fundgate_dir, account_id));

        if config.demo_mode {
            let backend = DemoBackend::simulated(
                rust_decimal::Decimal::new(DEMO_STARTING_BALANCE_CENTS, 2),
                DemoTiming::default(),
            );
            let backend = Arc::new(match &config.demo_passcode_hash {
                Some(hash) => backend.with_passcode_hash(hash.clone()),
                None => backend
                    .with_passcode(DEMO_PASSCODE)
                    .context("Failed to set up demo passcode")?,
            });
            let ports = Ports::demo(backend.clone(), auth_store, cache, clock);
            let mut context = Self::from_ports(config, ports);
            context.demo_backend = Some(backend);
            return Ok(context);
        }

        let base_url = config
            .api
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut client = ApiClient::new(&base_url)
            .context("Invalid API configuration")?
            .with_auth_store(auth_store.clone());
        if let Some(bridge) = &config.api.wallet_bridge_url {
            client = client
                .with_wallet_bridge(bridge)
                .context("Invalid wallet bridge URL")?;
        }
        let ports = Ports::api(Arc::new(client), auth_store, cache, clock);
        Ok(Self::from_ports(config, ports))
    }

    /// Wire the services on top of the given ports
    pub fn from_ports(config: Config, ports: Ports) -> Self {
        let poller = Arc::new(FundingPoller::new(
            ports.wallet,
            ports.ledger,
            ports.cache.clone(),
            ports.clock.clone(),
            config.funding.clone(),
            config.limits.clone(),
        ));
        let dispatcher = Arc::new(WithdrawalDispatcher::new(
            ports.mutations,
            poller.clone(),
            ports.cache,
            config.limits.clone(),
        ));
        let ttl_ms = config.authorization.session_ttl_ms;
        let gate = AuthorizationGate::new(
            SessionGuard::new(ports.auth_store.clone(), ports.clock.clone(), ttl_ms),
            ports.passcode,
            ports.biometric,
            config.authorization.prefer_biometric,
        );
        let transfers = TransferService::new(dispatcher, poller.clone(), gate);

        Self {
            session_guard: SessionGuard::new(ports.auth_store.clone(), ports.clock, ttl_ms),
            auth_store: ports.auth_store,
            poller,
            transfers,
            demo_backend: None,
            config,
        }
    }
}
