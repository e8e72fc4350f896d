//! PostgreSQL implementation of [`RotaBackend`].
//!
//! Every statement that touches schedule rows runs in a transaction that first
//! takes a transaction-scoped advisory lock, so two writers never interleave
//! their count recomputes. The lock is released by commit or rollback.

mod schema;

pub use schema::{SchemaInitializer, Tables};

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use rota_core::codec::{decode_absences, decode_metadata, encode_absences, encode_metadata};
use rota_core::config::PostgresConfig;
use rota_core::{
    DateRange, DutyDate, Employee, NewEmployee, RotaError, Rule, Schedule, RULE_ID,
};

use crate::backend::RotaBackend;
use crate::backoff::BackoffPolicy;
use crate::connection::{ConnectionManager, Connector};
use crate::error::{StoreError, StoreResult};

/// Advisory lock serializing duty-count recomputes.
const DUTY_LOCK_KEY: i64 = 0x726f_7461_0002;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

// ── Connector ─────────────────────────────────────────────────

/// Opens [`PgPool`]s from discrete connection settings.
pub struct PgConnector {
    options: PgConnectOptions,
    max_connections: u32,
    label: String,
}

impl PgConnector {
    pub fn from_config(config: &PostgresConfig) -> StoreResult<Self> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| RotaError::MissingConfig(vec!["PG_HOST".into()]))?;
        let ssl_mode: PgSslMode = config.ssl_mode.parse().map_err(|_| {
            RotaError::InvalidConfig(vec![format!(
                "PG_SSL_MODE '{}' is not a libpq sslmode",
                config.ssl_mode
            )])
        })?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(config.port)
            .database(&config.database)
            .username(&config.username)
            .ssl_mode(ssl_mode);
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Ok(Self {
            options,
            max_connections: config.max_connections.max(1),
            label: format!("{}:{}/{}", host, config.port, config.database),
        })
    }
}

fn unreachable(e: sqlx::Error) -> StoreError {
    StoreError::Connectivity {
        attempts: 1,
        message: e.to_string(),
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Handle = PgPool;

    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn open(&self) -> StoreResult<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(self.options.clone())
            .await
            .map_err(unreachable)
    }

    async fn probe(&self, pool: &PgPool) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(unreachable)?;
        Ok(())
    }

    fn is_closed(&self, pool: &PgPool) -> bool {
        pool.is_closed()
    }

    async fn close(&self, pool: &PgPool) {
        pool.close().await;
    }
}

// ── Rows ──────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    employee_number: String,
    name: String,
    first_line_support_count: i32,
    known_absences: serde_json::Value,
    metadata: serde_json::Value,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = RotaError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            first_line_support_count: u32::try_from(row.first_line_support_count).map_err(
                |_| RotaError::Encoding {
                    column: "first_line_support_count".into(),
                    message: format!("negative count {}", row.first_line_support_count),
                },
            )?,
            known_absences: decode_absences(row.known_absences)?,
            metadata: decode_metadata(row.metadata)?,
            employee_number: row.employee_number,
            name: row.name,
        })
    }
}

fn schedule_from_row((date, first_line_support): (String, String)) -> StoreResult<Schedule> {
    let date = DutyDate::parse(&date).map_err(|e| RotaError::Encoding {
        column: "date".into(),
        message: e.to_string(),
    })?;
    Ok(Schedule::new(date, first_line_support))
}

// ── Backend ───────────────────────────────────────────────────

pub struct PgBackend {
    connections: ConnectionManager<PgConnector>,
    schema: SchemaInitializer,
}

impl PgBackend {
    pub fn from_config(config: &PostgresConfig, policy: BackoffPolicy) -> StoreResult<Self> {
        let connector = PgConnector::from_config(config)?;
        Self::with_manager(ConnectionManager::new(connector, policy), &config.schema)
    }

    pub fn with_manager(
        connections: ConnectionManager<PgConnector>,
        schema: &str,
    ) -> StoreResult<Self> {
        Ok(Self {
            connections,
            schema: SchemaInitializer::new(Tables::new(schema)?),
        })
    }

    pub fn connections(&self) -> &ConnectionManager<PgConnector> {
        &self.connections
    }

    fn tables(&self) -> &Tables {
        self.schema.tables()
    }

    /// A live pool with the schema in place.
    async fn pool(&self) -> StoreResult<PgPool> {
        let pool = self.connections.handle().await?;
        self.schema.ensure(&pool).await?;
        Ok(pool)
    }

    async fn lock_duties(conn: &mut PgConnection) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(DUTY_LOCK_KEY)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Reset every count, then set each assignee's count to its row total.
    async fn recount(&self, conn: &mut PgConnection) -> StoreResult<u64> {
        let t = self.tables();
        sqlx::query(&format!(
            "UPDATE {} SET first_line_support_count = 0
             WHERE first_line_support_count <> 0",
            t.employees
        ))
        .execute(&mut *conn)
        .await?;

        let assigned = sqlx::query(&format!(
            "UPDATE {} AS e SET first_line_support_count = c.n
             FROM (
                 SELECT first_line_support, COUNT(*)::INT AS n
                 FROM {} GROUP BY first_line_support
             ) AS c
             WHERE e.employee_number = c.first_line_support",
            t.employees, t.schedules
        ))
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(assigned)
    }

    /// Share-lock the employee row so it cannot be deleted before commit.
    async fn require_employee(
        &self,
        conn: &mut PgConnection,
        employee_number: &str,
    ) -> StoreResult<()> {
        let found: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT 1 FROM {} WHERE employee_number = $1 FOR SHARE",
            self.tables().employees
        ))
        .bind(employee_number)
        .fetch_optional(&mut *conn)
        .await?;
        match found {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownEmployee(employee_number.to_string())),
        }
    }
}

#[async_trait]
impl RotaBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn await_ready(&self) -> StoreResult<()> {
        self.connections.await_ready().await
    }

    async fn initialize(&self) -> StoreResult<()> {
        self.connections.await_ready().await?;
        self.pool().await?;
        Ok(())
    }

    async fn upsert_employee(&self, employee: &NewEmployee) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query(&format!(
            "INSERT INTO {} (employee_number, name, known_absences, metadata)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (employee_number) DO UPDATE SET
                 name = EXCLUDED.name,
                 known_absences = EXCLUDED.known_absences,
                 metadata = EXCLUDED.metadata",
            self.tables().employees
        ))
        .bind(&employee.employee_number)
        .bind(&employee.name)
        .bind(encode_absences(&employee.known_absences))
        .bind(encode_metadata(&employee.metadata))
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn fetch_employee(&self, employee_number: &str) -> StoreResult<Option<Employee>> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT employee_number, name, first_line_support_count, known_absences, metadata
             FROM {} WHERE employee_number = $1",
            self.tables().employees
        ))
        .bind(employee_number)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(Employee::try_from).transpose()?)
    }

    async fn fetch_employees(&self) -> StoreResult<Vec<Employee>> {
        let pool = self.pool().await?;
        let rows = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT employee_number, name, first_line_support_count, known_absences, metadata
             FROM {} ORDER BY employee_number",
            self.tables().employees
        ))
        .fetch_all(&pool)
        .await?;
        let employees = rows
            .into_iter()
            .map(Employee::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(employees)
    }

    async fn rewrite_employee(&self, employee: &Employee) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let updated = sqlx::query(&format!(
            "UPDATE {} SET name = $2, known_absences = $3, metadata = $4
             WHERE employee_number = $1",
            self.tables().employees
        ))
        .bind(&employee.employee_number)
        .bind(&employee.name)
        .bind(encode_absences(&employee.known_absences))
        .bind(encode_metadata(&employee.metadata))
        .execute(&pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn delete_employee(&self, employee_number: &str) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let t = self.tables();
        let mut tx = pool.begin().await?;
        Self::lock_duties(&mut tx).await?;

        let released = sqlx::query(&format!(
            "DELETE FROM {} WHERE first_line_support = $1",
            t.schedules
        ))
        .bind(employee_number)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let removed = sqlx::query(&format!(
            "DELETE FROM {} WHERE employee_number = $1",
            t.employees
        ))
        .bind(employee_number)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if removed == 0 {
            return Ok(false);
        }

        self.recount(&mut tx).await?;
        tx.commit().await?;
        debug!(employee_number, released, "Employee deleted with its schedules");
        Ok(true)
    }

    async fn upsert_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        Self::lock_duties(&mut tx).await?;
        self.require_employee(&mut tx, &schedule.first_line_support)
            .await?;

        sqlx::query(&format!(
            "INSERT INTO {} (date, first_line_support) VALUES ($1, $2)
             ON CONFLICT (date) DO UPDATE SET first_line_support = EXCLUDED.first_line_support",
            self.tables().schedules
        ))
        .bind(schedule.date.to_string())
        .bind(&schedule.first_line_support)
        .execute(&mut *tx)
        .await?;

        self.recount(&mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_schedule(&self, date: &DutyDate) -> StoreResult<Option<Schedule>> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, (String, String)>(&format!(
            "SELECT date, first_line_support FROM {} WHERE date = $1",
            self.tables().schedules
        ))
        .bind(date.to_string())
        .fetch_optional(&pool)
        .await?;
        row.map(schedule_from_row).transpose()
    }

    async fn fetch_schedules(&self, range: &DateRange) -> StoreResult<Vec<Schedule>> {
        let pool = self.pool().await?;
        // Canonical YYYY-MM-DD text orders the same way as the dates.
        let rows = sqlx::query_as::<_, (String, String)>(&format!(
            "SELECT date, first_line_support FROM {}
             WHERE ($1::TEXT IS NULL OR date >= $1)
               AND ($2::TEXT IS NULL OR date <= $2)
             ORDER BY date ASC",
            self.tables().schedules
        ))
        .bind(range.start.map(|d| d.to_string()))
        .bind(range.end.map(|d| d.to_string()))
        .fetch_all(&pool)
        .await?;
        rows.into_iter().map(schedule_from_row).collect()
    }

    async fn reassign_schedule(&self, schedule: &Schedule) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        Self::lock_duties(&mut tx).await?;

        // A missing date is "not found" even when the assignee is unknown.
        let scheduled: Option<i32> = sqlx::query_scalar(&format!(
            "SELECT 1 FROM {} WHERE date = $1 FOR UPDATE",
            self.tables().schedules
        ))
        .bind(schedule.date.to_string())
        .fetch_optional(&mut *tx)
        .await?;
        if scheduled.is_none() {
            return Ok(false);
        }
        self.require_employee(&mut tx, &schedule.first_line_support)
            .await?;

        sqlx::query(&format!(
            "UPDATE {} SET first_line_support = $2 WHERE date = $1",
            self.tables().schedules
        ))
        .bind(schedule.date.to_string())
        .bind(&schedule.first_line_support)
        .execute(&mut *tx)
        .await?;

        self.recount(&mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_schedule(&self, date: &DutyDate) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        Self::lock_duties(&mut tx).await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE date = $1",
            self.tables().schedules
        ))
        .bind(date.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if deleted == 0 {
            return Ok(false);
        }

        self.recount(&mut tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn recount_duties(&self) -> StoreResult<u64> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        Self::lock_duties(&mut tx).await?;
        let assigned = self.recount(&mut tx).await?;
        tx.commit().await?;
        Ok(assigned)
    }

    async fn fetch_rule(&self) -> StoreResult<Option<Rule>> {
        let pool = self.pool().await?;
        let row = sqlx::query_as::<_, (i32, f64)>(&format!(
            "SELECT max_days_per_week, preferred_balance FROM {} WHERE id = $1",
            self.tables().rules
        ))
        .bind(RULE_ID)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(|(max_days_per_week, preferred_balance)| Rule {
            max_days_per_week,
            preferred_balance,
        }))
    }

    async fn seed_rule(&self, rule: &Rule) -> StoreResult<bool> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await?;
        schema::seed_rule(&mut conn, self.tables(), rule).await
    }

    async fn upsert_rule(&self, rule: &Rule) -> StoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query(&format!(
            "INSERT INTO {} (id, max_days_per_week, preferred_balance)
             VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET
                 max_days_per_week = EXCLUDED.max_days_per_week,
                 preferred_balance = EXCLUDED.preferred_balance",
            self.tables().rules
        ))
        .bind(RULE_ID)
        .bind(rule.max_days_per_week)
        .bind(rule.preferred_balance)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn close(&self) {
        self.connections.close().await;
        info!("PostgreSQL backend closed");
    }
}
