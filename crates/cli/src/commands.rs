use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use rota_core::{Config, DateRange, DutyDate, EmployeeUpdate, NewEmployee, RuleUpdate};
use rota_storage::Rota;

use crate::cli::{Command, EmployeeCommand, RulesCommand, ScheduleCommand};

fn emit<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

pub async fn run(rota: &Rota, config: &Config, command: Command, pretty: bool) -> Result<()> {
    match command {
        Command::Init => {
            rota.initialize().await.context("failed to initialize the store")?;
            emit(&rota.rules().get().await, pretty)
        }
        Command::Bootstrap {
            days,
            start,
            no_seed,
            force,
        } => {
            if !config.bootstrap.enabled && !force {
                info!("Bootstrap disabled; pass --force to run it anyway");
                return emit(&serde_json::json!({ "skipped": "bootstrap disabled" }), pretty);
            }
            let mut bootstrap = config.bootstrap.clone();
            if let Some(days) = days {
                bootstrap.days = days;
            }
            if no_seed {
                bootstrap.seed_employees = false;
            }
            let start = start.unwrap_or_else(|| DutyDate::from(chrono::Local::now().date_naive()));
            rota.initialize().await.context("failed to initialize the store")?;
            let report = rota
                .bootstrap(&bootstrap, start)
                .await
                .context("bootstrap failed")?;
            emit(&report, pretty)
        }
        Command::Employee { command } => employee(rota, command, pretty).await,
        Command::Schedule { command } => schedule(rota, command, pretty).await,
        Command::Rules { command } => rules(rota, command, pretty).await,
        Command::Reconcile { check: true } => {
            let drift = rota.reconciler().verify().await.context("count check failed")?;
            emit(&drift, pretty)?;
            if !drift.is_empty() {
                bail!("{} employee(s) have drifted duty counts", drift.len());
            }
            Ok(())
        }
        Command::Reconcile { check: false } => {
            let assigned = rota.reconciler().reconcile().await.context("reconcile failed")?;
            info!(assigned, "Duty counts recomputed");
            emit(&serde_json::json!({ "assigned_employees": assigned }), pretty)
        }
    }
}

async fn employee(rota: &Rota, command: EmployeeCommand, pretty: bool) -> Result<()> {
    let store = rota.employees();
    match command {
        EmployeeCommand::Create {
            employee_number,
            name,
            absences,
            metadata,
        } => {
            let employee = NewEmployee::new(employee_number, name)
                .with_absences(absences)
                .with_metadata(metadata.unwrap_or_default());
            let number = store.create(employee).await.context("failed to create employee")?;
            emit(&serde_json::json!({ "employee_number": number }), pretty)
        }
        EmployeeCommand::Get { employee_number } => match store.get(&employee_number).await {
            Some(employee) => emit(&employee, pretty),
            None => bail!("employee {employee_number} not found"),
        },
        EmployeeCommand::List => {
            let mut employees = store.list().await.context("failed to list employees")?;
            employees.sort_by(|a, b| a.employee_number.cmp(&b.employee_number));
            emit(&employees, pretty)
        }
        EmployeeCommand::Update {
            employee_number,
            name,
            absences,
            clear_absences,
            metadata,
        } => {
            let known_absences = if clear_absences {
                Some(Vec::new())
            } else if absences.is_empty() {
                None
            } else {
                Some(absences)
            };
            let update = EmployeeUpdate {
                name,
                known_absences,
                metadata,
            };
            if !store
                .update(&employee_number, update)
                .await
                .context("failed to update employee")?
            {
                bail!("employee {employee_number} not found");
            }
            emit(&store.get(&employee_number).await, pretty)
        }
        EmployeeCommand::Delete { employee_number } => {
            if !store
                .delete(&employee_number)
                .await
                .context("failed to delete employee")?
            {
                bail!("employee {employee_number} not found");
            }
            emit(&serde_json::json!({ "deleted": employee_number }), pretty)
        }
    }
}

async fn schedule(rota: &Rota, command: ScheduleCommand, pretty: bool) -> Result<()> {
    let store = rota.schedules();
    match command {
        ScheduleCommand::Set {
            date,
            employee_number,
        } => {
            store
                .create(date, &employee_number)
                .await
                .with_context(|| format!("failed to schedule {date}"))?;
            emit(&store.get(&date).await, pretty)
        }
        ScheduleCommand::Get { date } => match store.get(&date).await {
            Some(schedule) => emit(&schedule, pretty),
            None => bail!("nothing scheduled on {date}"),
        },
        ScheduleCommand::List { from, to } => {
            let range = DateRange {
                start: from,
                end: to,
            };
            let schedules = store.list(range).await.context("failed to list schedules")?;
            emit(&schedules, pretty)
        }
        ScheduleCommand::Update {
            date,
            employee_number,
        } => {
            if !store
                .update(date, &employee_number)
                .await
                .with_context(|| format!("failed to reassign {date}"))?
            {
                bail!("nothing scheduled on {date}");
            }
            emit(&store.get(&date).await, pretty)
        }
        ScheduleCommand::Delete { date } => {
            if !store
                .delete(&date)
                .await
                .with_context(|| format!("failed to delete schedule for {date}"))?
            {
                bail!("nothing scheduled on {date}");
            }
            emit(&serde_json::json!({ "deleted": date }), pretty)
        }
    }
}

async fn rules(rota: &Rota, command: RulesCommand, pretty: bool) -> Result<()> {
    let store = rota.rules();
    match command {
        RulesCommand::Get => emit(&store.get().await, pretty),
        RulesCommand::Set {
            max_days_per_week,
            preferred_balance,
        } => {
            let update = RuleUpdate {
                max_days_per_week,
                preferred_balance,
            };
            store.update(update).await.context("failed to update rules")?;
            emit(&store.get().await, pretty)
        }
    }
}
