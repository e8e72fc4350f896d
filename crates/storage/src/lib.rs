//! Persistence and scheduling for the first-line support rota.
//!
//! [`Rota`] wires one [`RotaBackend`] into the entity stores, the count
//! reconciler and the assignment engine. Use [`Rota::from_config`] for
//! Postgres or [`Rota::with_backend`] for anything else (tests use
//! [`MemoryBackend`]).

pub mod assignment;
pub mod backend;
pub mod backoff;
pub mod bootstrap;
pub mod connection;
pub mod employees;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod reconcile;
pub mod rules;
pub mod schedules;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use rota_core::config::BootstrapConfig;
use rota_core::{Config, DutyDate};

pub use assignment::{pick_assignee, AssignmentEngine, AssignmentReport, FailedDate};
pub use backend::RotaBackend;
pub use backoff::{BackoffPolicy, Sleeper, TokioSleeper};
pub use bootstrap::BootstrapReport;
pub use connection::{ConnectionManager, Connector};
pub use employees::EmployeeStore;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use postgres::{PgBackend, PgConnector};
pub use reconcile::{CountDrift, CountReconciler};
pub use rules::RuleStore;
pub use schedules::ScheduleStore;

#[derive(Clone)]
pub struct Rota {
    backend: Arc<dyn RotaBackend>,
    employees: EmployeeStore,
    schedules: ScheduleStore,
    rules: RuleStore,
    reconciler: CountReconciler,
    assignment: AssignmentEngine,
}

impl Rota {
    /// Build on Postgres. No connection is made until first use.
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        let policy = BackoffPolicy::from(&config.retry);
        let backend = PgBackend::from_config(&config.postgres, policy)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    pub fn with_backend(backend: Arc<dyn RotaBackend>) -> Self {
        let employees = EmployeeStore::new(backend.clone());
        let schedules = ScheduleStore::new(backend.clone());
        Self {
            rules: RuleStore::new(backend.clone()),
            reconciler: CountReconciler::new(backend.clone()),
            assignment: AssignmentEngine::new(employees.clone(), schedules.clone()),
            employees,
            schedules,
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn RotaBackend> {
        &self.backend
    }

    pub fn employees(&self) -> &EmployeeStore {
        &self.employees
    }

    pub fn schedules(&self) -> &ScheduleStore {
        &self.schedules
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    pub fn reconciler(&self) -> &CountReconciler {
        &self.reconciler
    }

    pub fn assignment(&self) -> &AssignmentEngine {
        &self.assignment
    }

    /// Wait for the store, then create tables and the default rule.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.backend.initialize().await?;
        info!(backend = self.backend.name(), "Rota store initialized");
        Ok(())
    }

    pub async fn bootstrap(
        &self,
        config: &BootstrapConfig,
        today: DutyDate,
    ) -> StoreResult<BootstrapReport> {
        bootstrap::run(&self.employees, &self.assignment, config, today).await
    }

    /// Run initialization and the demo bootstrap in the background.
    /// `None` when bootstrapping is disabled.
    pub fn spawn_bootstrap(&self, config: BootstrapConfig) -> Option<JoinHandle<()>> {
        if !config.enabled {
            info!("Bootstrap disabled");
            return None;
        }
        let rota = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = rota.initialize().await {
                error!("Bootstrap could not initialize the store: {}", e);
                return;
            }
            let today = DutyDate::from(chrono::Local::now().date_naive());
            match rota.bootstrap(&config, today).await {
                Ok(report) => info!(
                    created = report.created.len(),
                    refreshed = report.refreshed.len(),
                    assigned = report.assignment.assigned.len(),
                    "Bootstrap finished"
                ),
                Err(e) => error!("Bootstrap failed: {}", e),
            }
        }))
    }

    pub async fn close(&self) {
        self.backend.close().await;
    }
}
