//! Round trips against a live server. Run with
//! `cargo test -p rota-storage -- --ignored` and `PG_HOST` set.

use std::sync::Arc;

use rota_core::{Config, DateRange, NewEmployee};
use rota_storage::{PgBackend, Rota, StoreError};

use crate::helpers::{date, duty_count};

async fn live_rota(schema: &str) -> Rota {
    rota_core::config::load_dotenv();
    let mut config = Config::from_env();
    config.postgres.schema = schema.to_string();
    config.retry.max_retries = 3;
    config.validate().expect("PG_* variables must describe a reachable server");

    let backend = PgBackend::from_config(&config.postgres, (&config.retry).into()).unwrap();
    let rota = Rota::with_backend(Arc::new(backend));
    rota.initialize().await.unwrap();
    rota
}

async fn clear(rota: &Rota) {
    for e in rota.employees().list().await.unwrap() {
        rota.employees().delete(&e.employee_number).await.unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn postgres_schedule_lifecycle() {
    let rota = live_rota("rota_it_lifecycle").await;
    clear(&rota).await;

    rota.employees()
        .create(NewEmployee::new("EMP001", "Lars Larsson").with_absences(vec![date("2024-03-02")]))
        .await
        .unwrap();
    rota.employees()
        .create(NewEmployee::new("EMP002", "Dagobert Dagobertsson"))
        .await
        .unwrap();

    for d in ["2024-02-01", "2024-02-02", "2024-02-03"] {
        rota.schedules().create(date(d), "EMP001").await.unwrap();
    }
    rota.schedules().create(date("2024-02-04"), "EMP002").await.unwrap();
    assert_eq!(duty_count(&rota, "EMP001").await, 3);

    let listed = rota
        .schedules()
        .list(DateRange::between(date("2024-02-02"), date("2024-02-04")))
        .await
        .unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].date, date("2024-02-02"));

    let err = rota
        .schedules()
        .create(date("2024-02-05"), "EMP404")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownEmployee(_)));

    // Unscheduled date: not found, whoever the assignee is.
    assert!(!rota.schedules().update(date("2031-01-01"), "EMP404").await.unwrap());
    let err = rota
        .schedules()
        .update(date("2024-02-04"), "EMP404")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownEmployee(_)));

    assert!(rota.employees().delete("EMP001").await.unwrap());
    assert_eq!(rota.schedules().list(DateRange::all()).await.unwrap().len(), 1);
    assert_eq!(duty_count(&rota, "EMP002").await, 1);

    let lars_absences = vec![date("2024-03-02")];
    rota.employees()
        .create(NewEmployee::new("EMP001", "Lars Larsson").with_absences(lars_absences.clone()))
        .await
        .unwrap();
    let lars = rota.employees().get("EMP001").await.unwrap();
    assert_eq!(lars.known_absences, lars_absences);
    assert_eq!(lars.first_line_support_count, 0);

    clear(&rota).await;
    rota.close().await;
}

#[tokio::test]
#[ignore]
async fn postgres_rules_are_seeded_once() {
    let rota = live_rota("rota_it_rules").await;
    let concurrent: Vec<_> = (0..4)
        .map(|_| {
            let rota = rota.clone();
            tokio::spawn(async move { rota.initialize().await })
        })
        .collect();
    for task in concurrent {
        task.await.unwrap().unwrap();
    }
    let rule = rota.rules().get().await;
    assert!(rule.max_days_per_week >= 1);
    assert!(rota.reconciler().verify().await.unwrap().is_empty());
    rota.close().await;
}
