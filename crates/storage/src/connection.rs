//! Lifecycle of the shared store handle.
//!
//! [`ConnectionManager`] owns one handle (for Postgres, a [`sqlx::PgPool`])
//! and hands out clones of it. Opening and replacing the handle happens under
//! a mutex, so concurrent callers that all find the handle missing or closed
//! produce exactly one reconnect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::backoff::{BackoffPolicy, Sleeper, TokioSleeper};
use crate::error::{StoreError, StoreResult};

/// How to open, probe and close one kind of store handle.
#[async_trait]
pub trait Connector: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    /// Short label for logs (host:port/db, never credentials).
    fn describe(&self) -> String;

    async fn open(&self) -> StoreResult<Self::Handle>;

    /// Trivial round trip, e.g. `SELECT 1`.
    async fn probe(&self, handle: &Self::Handle) -> StoreResult<()>;

    fn is_closed(&self, handle: &Self::Handle) -> bool;

    async fn close(&self, handle: &Self::Handle);
}

pub struct ConnectionManager<C: Connector> {
    connector: C,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    handle: RwLock<Option<C::Handle>>,
    reconnect: Mutex<()>,
    ready: AtomicBool,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, policy: BackoffPolicy) -> Self {
        Self::with_sleeper(connector, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(connector: C, policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            connector,
            policy,
            sleeper,
            handle: RwLock::new(None),
            reconnect: Mutex::new(()),
            ready: AtomicBool::new(false),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Whether a readiness probe has succeeded on the current handle.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Establish the handle, retrying retryable failures with backoff. Returns
    /// the live handle if one is already open.
    pub async fn connect(&self) -> StoreResult<C::Handle> {
        let mut schedule = self.policy.schedule();
        loop {
            let err = match self.open_once().await {
                Ok(handle) => return Ok(handle),
                Err(e) => e,
            };
            if !err.is_retryable() {
                error!(target_store = %self.connector.describe(), "Cannot connect: {}", err);
                return Err(err);
            }
            match schedule.next_delay() {
                Some(delay) => {
                    warn!(
                        target_store = %self.connector.describe(),
                        attempt = schedule.attempts(),
                        max_attempts = schedule.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Failed to connect: {}; retrying",
                        err
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => {
                    error!(
                        target_store = %self.connector.describe(),
                        attempts = schedule.attempts(),
                        "Giving up connecting: {}",
                        err
                    );
                    return Err(exhausted(schedule.attempts(), err));
                }
            }
        }
    }

    /// The current handle, reconnecting (with backoff) if it is missing or
    /// has been closed.
    pub async fn handle(&self) -> StoreResult<C::Handle> {
        if let Some(handle) = self.live_handle().await {
            return Ok(handle);
        }
        self.connect().await
    }

    /// Block until a trivial query succeeds.
    ///
    /// Once ready, later calls return immediately unless the handle has since
    /// been observed closed, in which case readiness is probed again.
    pub async fn await_ready(&self) -> StoreResult<()> {
        if self.is_ready() && self.live_handle().await.is_some() {
            return Ok(());
        }
        self.ready.store(false, Ordering::Release);

        let mut schedule = self.policy.schedule();
        loop {
            let err = match self.probe_once().await {
                Ok(()) => {
                    self.ready.store(true, Ordering::Release);
                    info!(target_store = %self.connector.describe(), "Store is ready");
                    return Ok(());
                }
                Err(e) => e,
            };
            if !err.is_retryable() {
                error!(target_store = %self.connector.describe(), "Store unusable: {}", err);
                return Err(err);
            }
            match schedule.next_delay() {
                Some(delay) => {
                    warn!(
                        target_store = %self.connector.describe(),
                        attempt = schedule.attempts(),
                        max_attempts = schedule.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "Store not available yet: {}; retrying",
                        err
                    );
                    self.sleeper.sleep(delay).await;
                }
                None => {
                    error!(
                        target_store = %self.connector.describe(),
                        attempts = schedule.attempts(),
                        "Store still unavailable: {}",
                        err
                    );
                    return Err(exhausted(schedule.attempts(), err));
                }
            }
        }
    }

    /// Close and drop the handle. The next use reconnects.
    pub async fn close(&self) {
        let _guard = self.reconnect.lock().await;
        self.ready.store(false, Ordering::Release);
        if let Some(handle) = self.handle.write().await.take() {
            self.connector.close(&handle).await;
            info!(target_store = %self.connector.describe(), "Connection closed");
        }
    }

    async fn live_handle(&self) -> Option<C::Handle> {
        let guard = self.handle.read().await;
        match guard.as_ref() {
            Some(h) if !self.connector.is_closed(h) => Some(h.clone()),
            _ => None,
        }
    }

    /// One open attempt, serialized with every other reconnect.
    async fn open_once(&self) -> StoreResult<C::Handle> {
        let _guard = self.reconnect.lock().await;
        // Someone else may have reconnected while we waited for the lock.
        if let Some(handle) = self.live_handle().await {
            return Ok(handle);
        }
        self.ready.store(false, Ordering::Release);
        let handle = self.connector.open().await?;
        *self.handle.write().await = Some(handle.clone());
        info!(target_store = %self.connector.describe(), "Connected");
        Ok(handle)
    }

    async fn probe_once(&self) -> StoreResult<()> {
        let handle = self.open_once().await?;
        self.connector.probe(&handle).await
    }
}

fn exhausted(attempts: u32, last: StoreError) -> StoreError {
    match last {
        StoreError::Connectivity { message, .. } => StoreError::Connectivity { attempts, message },
        other => StoreError::Connectivity {
            attempts,
            message: other.to_string(),
        },
    }
}
