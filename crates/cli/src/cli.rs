use clap::{Parser, Subcommand};

use rota_core::{DutyDate, Metadata};

/// First-line support rota: employees, daily assignments and rules.
///
/// Connection settings come from the environment (`PG_HOST`, `PG_PORT`, ...)
/// or a `.env` file in the working directory.
#[derive(Parser, Debug)]
#[command(name = "rota-cli", version, about = "First-line support rota")]
pub struct CliArgs {
    /// Config profile; keys resolve as `{PROFILE}_{KEY}` first (overrides ROTA_PROFILE)
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Wait for the database, create tables and seed the default rule
    Init,

    /// Seed the demo roster and front-fill upcoming days
    Bootstrap {
        /// Days to fill (defaults to BOOTSTRAP_DAYS)
        #[arg(long)]
        days: Option<u32>,

        /// First day of the window (defaults to today)
        #[arg(long)]
        start: Option<DutyDate>,

        /// Only fill schedules, leave employees alone
        #[arg(long)]
        no_seed: bool,

        /// Run even when BOOTSTRAP_ENABLED is false
        #[arg(long)]
        force: bool,
    },

    /// Employee management
    Employee {
        #[command(subcommand)]
        command: EmployeeCommand,
    },

    /// Daily first-line support assignments
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },

    /// Scheduling rules (stored, not enforced by assignment)
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },

    /// Recompute every duty count from the schedule table
    Reconcile {
        /// Report drift without repairing it; exits non-zero on drift
        #[arg(long)]
        check: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum EmployeeCommand {
    /// Create an employee, or overwrite one with the same number
    Create {
        #[arg(value_name = "NUMBER")]
        employee_number: String,

        #[arg(value_name = "NAME")]
        name: String,

        /// Date the employee is unavailable (repeatable)
        #[arg(long = "absent", value_name = "YYYY-MM-DD")]
        absences: Vec<DutyDate>,

        /// JSON object stored alongside the employee
        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
    },

    Get {
        #[arg(value_name = "NUMBER")]
        employee_number: String,
    },

    List,

    /// Change name, absences or metadata; unspecified fields are kept
    Update {
        #[arg(value_name = "NUMBER")]
        employee_number: String,

        #[arg(long)]
        name: Option<String>,

        /// Replace the absence list (repeatable)
        #[arg(long = "absent", value_name = "YYYY-MM-DD")]
        absences: Vec<DutyDate>,

        /// Replace the absence list with an empty one
        #[arg(long, conflicts_with = "absences")]
        clear_absences: bool,

        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
    },

    /// Delete an employee together with their schedules
    Delete {
        #[arg(value_name = "NUMBER")]
        employee_number: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// Assign an employee to a date, replacing any earlier assignment
    Set {
        #[arg(value_name = "DATE")]
        date: DutyDate,

        #[arg(value_name = "NUMBER")]
        employee_number: String,
    },

    Get {
        #[arg(value_name = "DATE")]
        date: DutyDate,
    },

    /// List assignments, optionally within inclusive bounds
    List {
        #[arg(long)]
        from: Option<DutyDate>,

        #[arg(long)]
        to: Option<DutyDate>,
    },

    /// Reassign a date that already has an assignment
    Update {
        #[arg(value_name = "DATE")]
        date: DutyDate,

        #[arg(value_name = "NUMBER")]
        employee_number: String,
    },

    Delete {
        #[arg(value_name = "DATE")]
        date: DutyDate,
    },
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    Get,

    /// Update rule values; unspecified fields are kept
    Set {
        #[arg(long)]
        max_days_per_week: Option<i32>,

        #[arg(long)]
        preferred_balance: Option<f64>,
    },
}

fn parse_metadata(raw: &str) -> Result<Metadata, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}
