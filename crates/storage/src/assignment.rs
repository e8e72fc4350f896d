//! Round-robin fill of a date window.
//!
//! For the date at offset `i` in the window the engine picks
//! `eligible[i % eligible.len()]`, where `eligible` is every employee not
//! absent that day, ordered by employee number. If everyone is absent it
//! falls back to `all[i % all.len()]`. Existing assignments are never
//! overwritten. Rule values and current duty counts are not consulted.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use rota_core::{DutyDate, Employee, Schedule};

use crate::employees::EmployeeStore;
use crate::error::StoreResult;
use crate::schedules::ScheduleStore;

/// Choose the assignee for `date` at `offset` within a window.
///
/// `employees` must already be in a stable order. `None` only when the
/// slice is empty.
pub fn pick_assignee<'a>(
    employees: &'a [Employee],
    date: &DutyDate,
    offset: usize,
) -> Option<&'a Employee> {
    let eligible: Vec<&Employee> = employees.iter().filter(|e| !e.is_absent_on(date)).collect();
    if !eligible.is_empty() {
        return Some(eligible[offset % eligible.len()]);
    }
    if employees.is_empty() {
        return None;
    }
    Some(&employees[offset % employees.len()])
}

/// Outcome of one [`AssignmentEngine::fill_window`] run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentReport {
    pub assigned: Vec<Schedule>,
    /// Dates that already had an assignment.
    pub skipped: Vec<DutyDate>,
    pub failed: Vec<FailedDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDate {
    pub date: DutyDate,
    pub reason: String,
}

#[derive(Clone)]
pub struct AssignmentEngine {
    employees: EmployeeStore,
    schedules: ScheduleStore,
}

impl AssignmentEngine {
    pub fn new(employees: EmployeeStore, schedules: ScheduleStore) -> Self {
        Self {
            employees,
            schedules,
        }
    }

    /// Assign every unscheduled date in `[start, start + days)`.
    ///
    /// Listing employees must succeed; after that a failure on one date is
    /// logged, recorded in the report, and the loop moves on.
    pub async fn fill_window(&self, start: DutyDate, days: u32) -> StoreResult<AssignmentReport> {
        let mut employees = self.employees.list().await?;
        employees.sort_by(|a, b| a.employee_number.cmp(&b.employee_number));

        let mut report = AssignmentReport::default();
        if employees.is_empty() {
            warn!(%start, days, "No employees available, nothing assigned");
            return Ok(report);
        }

        for offset in 0..days {
            let Some(date) = start.plus_days(u64::from(offset)) else {
                break;
            };

            match self.schedules.exists(&date).await {
                Ok(true) => {
                    debug!(%date, "Already scheduled, skipping");
                    report.skipped.push(date);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(%date, "Failed to check existing schedule: {}", e);
                    report.failed.push(FailedDate {
                        date,
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            let Some(chosen) = pick_assignee(&employees, &date, offset as usize) else {
                break;
            };
            if chosen.is_absent_on(&date) {
                warn!(%date, employee_number = %chosen.employee_number, "Everyone is absent, assigning anyway");
            }

            match self.schedules.create(date, &chosen.employee_number).await {
                Ok(_) => report
                    .assigned
                    .push(Schedule::new(date, chosen.employee_number.clone())),
                Err(e) => {
                    error!(%date, employee_number = %chosen.employee_number, "Failed to assign: {}", e);
                    report.failed.push(FailedDate {
                        date,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            %start,
            days,
            assigned = report.assigned.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Assignment window filled"
        );
        Ok(report)
    }
}
