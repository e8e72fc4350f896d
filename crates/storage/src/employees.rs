//! Employee CRUD on top of a [`RotaBackend`].
//!
//! Creation is an upsert keyed by employee number that never touches the
//! derived duty count. Deletion cascades to the employee's schedules and
//! recomputes the counts of everyone else in the same unit of work.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rota_core::{Employee, EmployeeUpdate, NewEmployee};

use crate::backend::RotaBackend;
use crate::error::StoreResult;

#[derive(Clone)]
pub struct EmployeeStore {
    backend: Arc<dyn RotaBackend>,
}

impl EmployeeStore {
    pub fn new(backend: Arc<dyn RotaBackend>) -> Self {
        Self { backend }
    }

    /// Create or overwrite an employee. Returns the employee number.
    pub async fn create(&self, employee: NewEmployee) -> StoreResult<String> {
        employee.validate()?;
        self.backend.upsert_employee(&employee).await?;
        info!(employee_number = %employee.employee_number, "Employee saved");
        Ok(employee.employee_number)
    }

    /// Look up one employee. Store failures degrade to `None`.
    pub async fn get(&self, employee_number: &str) -> Option<Employee> {
        match self.backend.fetch_employee(employee_number).await {
            Ok(found) => found,
            Err(e) => {
                warn!(employee_number, "Failed to read employee: {}", e);
                None
            }
        }
    }

    /// Every employee. Waits for the store first and fails if it stays
    /// unreachable.
    pub async fn list(&self) -> StoreResult<Vec<Employee>> {
        self.backend.await_ready().await?;
        self.backend.fetch_employees().await
    }

    /// Merge `update` into the current record. `false` if the employee does
    /// not exist.
    pub async fn update(&self, employee_number: &str, update: EmployeeUpdate) -> StoreResult<bool> {
        update.validate()?;
        let Some(current) = self.backend.fetch_employee(employee_number).await? else {
            debug!(employee_number, "Update skipped, employee not found");
            return Ok(false);
        };
        if update.is_empty() {
            return Ok(true);
        }
        let merged = update.apply_to(&current);
        let updated = self.backend.rewrite_employee(&merged).await?;
        if updated {
            info!(employee_number, "Employee updated");
        }
        Ok(updated)
    }

    /// Remove the employee and every schedule naming it. `false` if the
    /// employee did not exist.
    pub async fn delete(&self, employee_number: &str) -> StoreResult<bool> {
        let deleted = self.backend.delete_employee(employee_number).await?;
        if deleted {
            info!(employee_number, "Employee deleted");
        } else {
            debug!(employee_number, "Delete skipped, employee not found");
        }
        Ok(deleted)
    }
}
