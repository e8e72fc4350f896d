use async_trait::async_trait;

use rota_core::{DateRange, DutyDate, Employee, NewEmployee, Rule, Schedule};

use crate::error::StoreResult;

/// Persistence seam shared by every store.
///
/// Implementations must keep the duty-count aggregate in step with the
/// schedule table: every method that adds, reassigns or removes schedule rows
/// (including the cascade in [`delete_employee`](Self::delete_employee))
/// recomputes all counts in the same transaction or critical section as the
/// write, and only reports success after both have happened.
#[async_trait]
pub trait RotaBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wait (with backoff) until the store answers a trivial query.
    async fn await_ready(&self) -> StoreResult<()>;

    /// Create the namespace, tables and singleton rule row if missing.
    async fn initialize(&self) -> StoreResult<()>;

    /// Insert, or overwrite name/absences/metadata of an existing row.
    /// Never touches the duty count.
    async fn upsert_employee(&self, employee: &NewEmployee) -> StoreResult<()>;

    async fn fetch_employee(&self, employee_number: &str) -> StoreResult<Option<Employee>>;

    async fn fetch_employees(&self) -> StoreResult<Vec<Employee>>;

    /// Write back name/absences/metadata of an existing employee.
    /// `false` if the row no longer exists.
    async fn rewrite_employee(&self, employee: &Employee) -> StoreResult<bool>;

    /// Remove the employee's schedules, then the employee. `false` if the
    /// employee did not exist (nothing is removed in that case).
    async fn delete_employee(&self, employee_number: &str) -> StoreResult<bool>;

    /// Last-write-wins upsert keyed by date. Fails with
    /// [`StoreError::UnknownEmployee`](crate::StoreError::UnknownEmployee) if
    /// the assignee does not exist.
    async fn upsert_schedule(&self, schedule: &Schedule) -> StoreResult<()>;

    async fn fetch_schedule(&self, date: &DutyDate) -> StoreResult<Option<Schedule>>;

    /// Schedules within `range`, ascending by date.
    async fn fetch_schedules(&self, range: &DateRange) -> StoreResult<Vec<Schedule>>;

    /// Reassign an existing date. `false` if the date has no schedule.
    async fn reassign_schedule(&self, schedule: &Schedule) -> StoreResult<bool>;

    /// `false` if the date has no schedule.
    async fn delete_schedule(&self, date: &DutyDate) -> StoreResult<bool>;

    /// Recompute every duty count from the schedule table. Returns the number
    /// of employees holding at least one assignment.
    async fn recount_duties(&self) -> StoreResult<u64>;

    async fn fetch_rule(&self) -> StoreResult<Option<Rule>>;

    /// Insert `rule` only if no rule row exists. `true` if inserted.
    async fn seed_rule(&self, rule: &Rule) -> StoreResult<bool>;

    async fn upsert_rule(&self, rule: &Rule) -> StoreResult<()>;

    async fn close(&self);
}
