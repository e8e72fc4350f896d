use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{RotaError, RotaResult};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

/// True for names that can be spliced into DDL unquoted.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub log_level: String,
    pub postgres: PostgresConfig,
    pub retry: RetryConfig,
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ROTA_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ROTA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            log_level: profiled_env_or(p, "LOG_LEVEL", "info"),
            postgres: PostgresConfig::from_env_profiled(p),
            retry: RetryConfig::from_env_profiled(p),
            bootstrap: BootstrapConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check everything needed before the first connection attempt.
    ///
    /// Missing required keys are reported together; they take precedence over
    /// other problems.
    pub fn validate(&self) -> RotaResult<()> {
        let mut missing = Vec::new();
        if self.postgres.host.is_none() {
            missing.push("PG_HOST".to_string());
        }
        if !missing.is_empty() {
            return Err(RotaError::MissingConfig(missing));
        }

        let mut problems = Vec::new();
        if self.postgres.port == 0 {
            problems.push("PG_PORT must be non-zero".to_string());
        }
        if self.postgres.database.is_empty() {
            problems.push("PG_DATABASE must not be empty".to_string());
        }
        if !is_valid_identifier(&self.postgres.schema) {
            problems.push(format!(
                "PG_SCHEMA '{}' must be a lowercase SQL identifier",
                self.postgres.schema
            ));
        }
        if self.postgres.max_connections == 0 {
            problems.push("PG_MAX_CONNECTIONS must be at least 1".to_string());
        }
        problems.extend(self.retry.problems());

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RotaError::InvalidConfig(problems))
        }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  postgres:    host={}, port={}, db={}, schema={}, user={}",
            self.postgres.host.as_deref().unwrap_or("(unset)"),
            self.postgres.port,
            self.postgres.database,
            self.postgres.schema,
            self.postgres.username,
        );
        tracing::info!(
            "  retry:       attempts={}, initial={}ms, cap={}ms, x{}",
            self.retry.max_retries,
            self.retry.initial_delay_ms,
            self.retry.max_delay_ms,
            self.retry.multiplier,
        );
        tracing::info!(
            "  bootstrap:   enabled={}, days={}",
            self.bootstrap.enabled,
            self.bootstrap.days
        );
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Namespace holding the three tables.
    pub schema: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_opt(p, "PG_HOST"),
            port: profiled_env_parse(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "postgres"),
            username: profiled_env_or(p, "PG_USERNAME", "postgres"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            schema: profiled_env_or(p, "PG_SCHEMA", "scheduling"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 5),
        }
    }
}

// ── Retry / backoff ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Upper bound on the summed waits of one retry loop.
    pub deadline_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 30,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            multiplier: 1.5,
            deadline_secs: None,
        }
    }
}

impl RetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_retries: profiled_env_parse(p, "DB_MAX_RETRIES", d.max_retries),
            initial_delay_ms: profiled_env_parse(p, "DB_INITIAL_DELAY_MS", d.initial_delay_ms),
            max_delay_ms: profiled_env_parse(p, "DB_MAX_DELAY_MS", d.max_delay_ms),
            multiplier: profiled_env_parse(p, "DB_BACKOFF_MULTIPLIER", d.multiplier),
            deadline_secs: profiled_env_opt(p, "DB_RETRY_DEADLINE_SECS").and_then(|v| v.parse().ok()),
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.max_retries == 0 {
            problems.push("DB_MAX_RETRIES must be at least 1".to_string());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            problems.push(format!(
                "DB_INITIAL_DELAY_MS ({}) exceeds DB_MAX_DELAY_MS ({})",
                self.initial_delay_ms, self.max_delay_ms
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            problems.push(format!(
                "DB_BACKOFF_MULTIPLIER must be >= 1.0, got {}",
                self.multiplier
            ));
        }
        problems
    }
}

// ── Bootstrap ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub enabled: bool,
    /// Days to front-fill, starting today.
    pub days: u32,
    /// Days of generated absences for the demo roster.
    pub absence_horizon_days: u32,
    pub seed_employees: bool,
}

impl BootstrapConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "BOOTSTRAP_ENABLED", true),
            days: profiled_env_parse(p, "BOOTSTRAP_DAYS", 7),
            absence_horizon_days: profiled_env_parse(p, "BOOTSTRAP_ABSENCE_HORIZON_DAYS", 30),
            seed_employees: profiled_env_bool(p, "BOOTSTRAP_SEED_EMPLOYEES", true),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            days: 7,
            absence_horizon_days: 30,
            seed_employees: true,
        }
    }
}
