//! Tests for Config: environment loading, profiles, and validation.

use std::env;
use std::sync::Mutex;

use rota_core::{Config, RotaError};

// Env-based tests must run serially to avoid interfering with each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_rota_env() {
    let keys = [
        "ROTA_PROFILE",
        "LOG_LEVEL",
        "PG_HOST",
        "PG_PORT",
        "PG_DATABASE",
        "PG_USERNAME",
        "PG_PASSWORD",
        "PG_SCHEMA",
        "PG_MAX_CONNECTIONS",
        "DB_MAX_RETRIES",
        "DB_INITIAL_DELAY_MS",
        "DB_MAX_DELAY_MS",
        "DB_BACKOFF_MULTIPLIER",
        "DB_RETRY_DEADLINE_SECS",
        "BOOTSTRAP_ENABLED",
        "BOOTSTRAP_DAYS",
        "STAGING_PG_HOST",
        "STAGING_PG_SCHEMA",
    ];
    for k in keys {
        env::remove_var(k);
    }
}

#[test]
fn test_defaults_without_host_fail_validation() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_rota_env();

    let cfg = Config::from_env();
    assert_eq!(cfg.profile_label(), "default");
    assert_eq!(cfg.postgres.port, 5432);
    assert_eq!(cfg.postgres.database, "postgres");
    assert_eq!(cfg.postgres.schema, "scheduling");
    assert_eq!(cfg.retry.max_retries, 30);
    assert_eq!(cfg.retry.initial_delay_ms, 1000);
    assert_eq!(cfg.retry.max_delay_ms, 10_000);
    assert!((cfg.retry.multiplier - 1.5).abs() < f64::EPSILON);
    assert_eq!(cfg.bootstrap.days, 7);
    assert!(cfg.bootstrap.enabled);

    assert_eq!(
        cfg.validate(),
        Err(RotaError::MissingConfig(vec!["PG_HOST".to_string()]))
    );
}

#[test]
fn test_config_from_env() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_rota_env();

    env::set_var("PG_HOST", "db.internal");
    env::set_var("PG_PORT", "6543");
    env::set_var("PG_DATABASE", "rota");
    env::set_var("PG_USERNAME", "scheduler");
    env::set_var("PG_PASSWORD", "hunter2");
    env::set_var("DB_MAX_RETRIES", "5");
    env::set_var("DB_RETRY_DEADLINE_SECS", "60");
    env::set_var("BOOTSTRAP_ENABLED", "false");
    env::set_var("LOG_LEVEL", "debug");

    let cfg = Config::from_env();
    assert_eq!(cfg.postgres.host.as_deref(), Some("db.internal"));
    assert_eq!(cfg.postgres.port, 6543);
    assert_eq!(cfg.postgres.database, "rota");
    assert_eq!(cfg.postgres.username, "scheduler");
    assert_eq!(cfg.postgres.password.as_deref(), Some("hunter2"));
    assert_eq!(cfg.retry.max_retries, 5);
    assert_eq!(cfg.retry.deadline_secs, Some(60));
    assert!(!cfg.bootstrap.enabled);
    assert_eq!(cfg.log_level, "debug");
    assert!(cfg.validate().is_ok());

    // The password never leaves the process through serialization.
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(!json.contains("hunter2"));

    clear_rota_env();
}

#[test]
fn test_config_profile() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_rota_env();

    env::set_var("PG_HOST", "base-host");
    env::set_var("ROTA_PROFILE", "staging");
    env::set_var("STAGING_PG_HOST", "staging-host");
    env::set_var("STAGING_PG_SCHEMA", "rota_staging");

    let cfg = Config::from_env();
    assert_eq!(cfg.profile, "STAGING");
    assert_eq!(cfg.postgres.host.as_deref(), Some("staging-host"));
    assert_eq!(cfg.postgres.schema, "rota_staging");
    // Unprefixed fallback still applies to keys the profile does not set.
    assert_eq!(cfg.postgres.port, 5432);

    clear_rota_env();
}

#[test]
fn test_validation_reports_every_problem() {
    let _lock = ENV_LOCK.lock().unwrap();
    clear_rota_env();

    env::set_var("PG_HOST", "localhost");
    env::set_var("PG_SCHEMA", "bad-schema");
    env::set_var("PG_MAX_CONNECTIONS", "0");
    env::set_var("DB_INITIAL_DELAY_MS", "50000");

    let cfg = Config::from_env();
    match cfg.validate() {
        Err(RotaError::InvalidConfig(problems)) => {
            assert_eq!(problems.len(), 3, "{problems:?}");
            assert!(problems.iter().any(|p| p.contains("PG_SCHEMA")));
            assert!(problems.iter().any(|p| p.contains("PG_MAX_CONNECTIONS")));
            assert!(problems.iter().any(|p| p.contains("DB_INITIAL_DELAY_MS")));
        }
        other => panic!("expected InvalidConfig, got {other:?}"),
    }

    clear_rota_env();
}
