//! Idempotent schema creation for the Postgres backend.

use sqlx::{PgConnection, PgPool};
use tokio::sync::OnceCell;
use tracing::info;

use rota_core::config::is_valid_identifier;
use rota_core::{RotaError, Rule, RULE_ID};

use crate::error::StoreResult;

/// Advisory lock serializing DDL across processes sharing one database.
const SCHEMA_LOCK_KEY: i64 = 0x726f_7461_0001;

/// Qualified table names inside the configured namespace.
#[derive(Debug, Clone)]
pub struct Tables {
    pub schema: String,
    pub employees: String,
    pub schedules: String,
    pub rules: String,
}

impl Tables {
    pub fn new(schema: &str) -> StoreResult<Self> {
        if !is_valid_identifier(schema) {
            return Err(RotaError::InvalidConfig(vec![format!(
                "schema '{schema}' must be a lowercase SQL identifier"
            )])
            .into());
        }
        Ok(Self {
            schema: schema.to_string(),
            employees: format!("{schema}.employees"),
            schedules: format!("{schema}.schedules"),
            rules: format!("{schema}.rules"),
        })
    }

    fn ddl(&self) -> Vec<String> {
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    employee_number VARCHAR(36) PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    first_line_support_count INT NOT NULL DEFAULT 0
                        CHECK (first_line_support_count >= 0),
                    known_absences JSONB NOT NULL DEFAULT '[]',
                    metadata JSONB NOT NULL DEFAULT '{{}}'
                )",
                self.employees
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    date VARCHAR(10) PRIMARY KEY
                        CHECK (date ~ '^[0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}}$'),
                    first_line_support VARCHAR(36) NOT NULL
                        REFERENCES {}(employee_number)
                )",
                self.schedules, self.employees
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS schedules_first_line_support_idx
                 ON {} (first_line_support)",
                self.schedules
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id VARCHAR(36) PRIMARY KEY,
                    max_days_per_week INT NOT NULL CHECK (max_days_per_week > 0),
                    preferred_balance DOUBLE PRECISION NOT NULL
                )",
                self.rules
            ),
        ]
    }
}

/// Insert the singleton rule row unless one exists. `true` if inserted.
pub(crate) async fn seed_rule(
    conn: &mut PgConnection,
    tables: &Tables,
    rule: &Rule,
) -> StoreResult<bool> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO {} (id, max_days_per_week, preferred_balance)
         VALUES ($1, $2, $3)
         ON CONFLICT (id) DO NOTHING",
        tables.rules
    ))
    .bind(RULE_ID)
    .bind(rule.max_days_per_week)
    .bind(rule.preferred_balance)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(inserted > 0)
}

/// Creates the namespace, tables and default rule once per process.
///
/// Concurrent callers in this process wait on the same initialization; other
/// processes are serialized by an advisory lock and find everything already
/// present. A failed attempt is not cached, so the next call tries again.
pub struct SchemaInitializer {
    tables: Tables,
    initialized: OnceCell<()>,
}

impl SchemaInitializer {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables,
            initialized: OnceCell::new(),
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    pub async fn ensure(&self, pool: &PgPool) -> StoreResult<()> {
        self.initialized
            .get_or_try_init(|| self.create(pool))
            .await?;
        Ok(())
    }

    async fn create(&self, pool: &PgPool) -> StoreResult<()> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;
        for statement in self.tables.ddl() {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
        let seeded = seed_rule(&mut tx, &self.tables, &Rule::default()).await?;
        tx.commit().await?;

        info!(schema = %self.tables.schema, "Database tables initialized");
        if seeded {
            info!("Initialized default scheduling rules");
        }
        Ok(())
    }
}
