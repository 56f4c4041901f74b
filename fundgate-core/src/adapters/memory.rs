//! In-process adapters: clocks, auth store and cache invalidation recorder

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::AuthorizationSession;
use crate::ports::{AuthStore, CacheInvalidator, CacheScope, Clock};

/// Wall clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct AuthState {
    account_id: Option<String>,
    session: Option<AuthorizationSession>,
}

/// Auth store held in memory for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryAuthStore {
    state: Mutex<AuthState>,
}

impl MemoryAuthStore {
    pub fn new(account_id: Option<String>) -> Self {
        Self {
            state: Mutex::new(AuthState {
                account_id,
                session: None,
            }),
        }
    }

    /// Log in as another account (or log out with `None`)
    pub fn set_account(&self, account_id: Option<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.account_id = account_id;
        }
    }
}

impl AuthStore for MemoryAuthStore {
    fn session(&self) -> Result<Option<AuthorizationSession>> {
        let state = self
            .state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        Ok(state.session.clone())
    }

    fn store_session(&self, session: AuthorizationSession) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        state.session = Some(session);
        Ok(())
    }

    fn invalidate(&self) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        state.session = None;
        Ok(())
    }

    fn current_account_id(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.account_id.clone())
    }
}

/// Cache invalidator that remembers what it was asked to refresh
#[derive(Debug, Default)]
pub struct RecordingInvalidator {
    scopes: Mutex<Vec<CacheScope>>,
}

impl RecordingInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything invalidated so far, in order
    pub fn scopes(&self) -> Vec<CacheScope> {
        self.scopes.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.clear();
        }
    }
}

impl CacheInvalidator for RecordingInvalidator {
    fn invalidate(&self, scope: CacheScope) {
        if let Ok(mut scopes) = self.scopes.lock() {
            scopes.push(scope);
        }
    }
}

/// Cache invalidator for front ends without cached views (the CLI)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _scope: CacheScope) {}
}
