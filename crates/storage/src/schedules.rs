//! Daily first-line support assignments.
//!
//! Every mutation here is reconciled by the backend before it returns, so a
//! successful call means the duty counts already reflect it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rota_core::{DateRange, DutyDate, Schedule};

use crate::backend::RotaBackend;
use crate::error::StoreResult;

#[derive(Clone)]
pub struct ScheduleStore {
    backend: Arc<dyn RotaBackend>,
}

impl ScheduleStore {
    pub fn new(backend: Arc<dyn RotaBackend>) -> Self {
        Self { backend }
    }

    /// Assign `employee_number` to `date`, replacing any earlier assignment.
    /// Fails with `UnknownEmployee` if the employee does not exist.
    pub async fn create(&self, date: DutyDate, employee_number: &str) -> StoreResult<DutyDate> {
        let schedule = Schedule::new(date, employee_number);
        self.backend.upsert_schedule(&schedule).await?;
        info!(%date, employee_number, "Schedule saved");
        Ok(date)
    }

    pub async fn get(&self, date: &DutyDate) -> Option<Schedule> {
        match self.backend.fetch_schedule(date).await {
            Ok(found) => found,
            Err(e) => {
                warn!(%date, "Failed to read schedule: {}", e);
                None
            }
        }
    }

    /// Whether `date` already has an assignment. Unlike [`get`](Self::get),
    /// store failures propagate.
    pub async fn exists(&self, date: &DutyDate) -> StoreResult<bool> {
        Ok(self.backend.fetch_schedule(date).await?.is_some())
    }

    /// Schedules inside `range`, ascending by date.
    pub async fn list(&self, range: DateRange) -> StoreResult<Vec<Schedule>> {
        self.backend.await_ready().await?;
        self.backend.fetch_schedules(&range).await
    }

    /// Reassign an existing date. `false` if nothing is scheduled that day.
    pub async fn update(&self, date: DutyDate, employee_number: &str) -> StoreResult<bool> {
        let schedule = Schedule::new(date, employee_number);
        let updated = self.backend.reassign_schedule(&schedule).await?;
        if updated {
            info!(%date, employee_number, "Schedule reassigned");
        } else {
            debug!(%date, "Reassignment skipped, no schedule for date");
        }
        Ok(updated)
    }

    pub async fn delete(&self, date: &DutyDate) -> StoreResult<bool> {
        let deleted = self.backend.delete_schedule(date).await?;
        if deleted {
            info!(%date, "Schedule deleted");
        }
        Ok(deleted)
    }
}
