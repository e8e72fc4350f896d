//! Demo roster and startup front-fill.

use serde::Serialize;
use tracing::{info, warn};

use rota_core::config::BootstrapConfig;
use rota_core::{DutyDate, EmployeeUpdate, NewEmployee};

use crate::assignment::{AssignmentEngine, AssignmentReport};
use crate::employees::EmployeeStore;
use crate::error::StoreResult;

/// Absence patterns count whole days from this date.
pub const ABSENCE_REFERENCE: (i32, u32, u32) = (2024, 1, 1);

struct DemoEmployee {
    number: &'static str,
    name: &'static str,
    /// Absent on every n-th day after the reference date.
    absent_every: Option<i64>,
}

const DEMO_ROSTER: [DemoEmployee; 5] = [
    DemoEmployee {
        number: "EMP001",
        name: "Lars Larsson",
        absent_every: Some(3),
    },
    DemoEmployee {
        number: "EMP002",
        name: "Dagobert Dagobertsson",
        absent_every: Some(5),
    },
    DemoEmployee {
        number: "EMP003",
        name: "Karl-Gustav Karlgustavsson",
        absent_every: None,
    },
    DemoEmployee {
        number: "EMP004",
        name: "Kerstin Kerstinsdotter",
        absent_every: Some(7),
    },
    DemoEmployee {
        number: "EMP005",
        name: "Maj-Britt Majbrittdotter",
        absent_every: None,
    },
];

/// Dates in `[from, from + horizon_days)` that fall on the pattern.
pub fn pattern_absences(every: i64, from: DutyDate, horizon_days: u32) -> Vec<DutyDate> {
    let (y, m, d) = ABSENCE_REFERENCE;
    let Ok(reference) = DutyDate::from_ymd(y, m, d) else {
        return Vec::new();
    };
    if every <= 0 {
        return Vec::new();
    }
    (0..u64::from(horizon_days))
        .filter_map(|i| from.plus_days(i))
        .filter(|date| date.days_since(&reference).rem_euclid(every) == 0)
        .collect()
}

/// The five demo employees with absences generated from `today`.
pub fn demo_roster(today: DutyDate, horizon_days: u32) -> Vec<NewEmployee> {
    DEMO_ROSTER
        .iter()
        .map(|demo| {
            let absences = demo
                .absent_every
                .map(|every| pattern_absences(every, today, horizon_days))
                .unwrap_or_default();
            NewEmployee::new(demo.number, demo.name).with_absences(absences)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapReport {
    pub created: Vec<String>,
    pub refreshed: Vec<String>,
    pub assignment: AssignmentReport,
}

/// Seed or refresh the demo roster, then fill `config.days` days from
/// `today`. Per-employee and per-date failures are logged and skipped.
pub async fn run(
    employees: &EmployeeStore,
    engine: &AssignmentEngine,
    config: &BootstrapConfig,
    today: DutyDate,
) -> StoreResult<BootstrapReport> {
    let mut report = BootstrapReport::default();

    if config.seed_employees {
        let roster = demo_roster(today, config.absence_horizon_days);
        let existing = employees.list().await?;

        if existing.is_empty() {
            info!("Initializing default employees");
            for employee in roster {
                let name = employee.name.clone();
                match employees.create(employee).await {
                    Ok(number) => report.created.push(number),
                    Err(e) => warn!(%name, "Failed to create default employee: {}", e),
                }
            }
        } else {
            info!(existing = existing.len(), "Employees present, refreshing default absences");
            for employee in roster {
                if !existing
                    .iter()
                    .any(|e| e.employee_number == employee.employee_number)
                {
                    continue;
                }
                let update = EmployeeUpdate {
                    known_absences: Some(employee.known_absences),
                    ..Default::default()
                };
                match employees.update(&employee.employee_number, update).await {
                    Ok(true) => report.refreshed.push(employee.employee_number),
                    Ok(false) => {}
                    Err(e) => warn!(
                        employee_number = %employee.employee_number,
                        "Failed to refresh absences: {}", e
                    ),
                }
            }
        }
    }

    info!(days = config.days, %today, "Front-filling schedules");
    report.assignment = engine.fill_window(today, config.days).await?;
    Ok(report)
}
