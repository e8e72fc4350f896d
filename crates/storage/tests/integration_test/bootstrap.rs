use rota_core::config::BootstrapConfig;
use rota_core::NewEmployee;

use crate::helpers::{date, hire, memory_rota};

fn config(days: u32) -> BootstrapConfig {
    BootstrapConfig {
        days,
        ..Default::default()
    }
}

#[tokio::test]
async fn empty_store_gets_demo_roster_and_a_week() {
    let (rota, _) = memory_rota();
    let today = date("2024-03-01");
    let report = rota.bootstrap(&config(7), today).await.unwrap();

    assert_eq!(
        report.created,
        vec!["EMP001", "EMP002", "EMP003", "EMP004", "EMP005"]
    );
    assert_eq!(report.assignment.assigned.len(), 7);

    // Day 60 after the reference: EMP001 and EMP002 are off.
    let first = rota.schedules().get(&today).await.unwrap();
    assert_eq!(first.first_line_support, "EMP003");

    for schedule in &report.assignment.assigned {
        let employee = rota
            .employees()
            .get(&schedule.first_line_support)
            .await
            .unwrap();
        assert!(!employee.is_absent_on(&schedule.date));
    }
    assert!(rota.reconciler().verify().await.unwrap().is_empty());
}

#[tokio::test]
async fn existing_roster_only_refreshes_absences() {
    let (rota, _) = memory_rota();
    rota.employees()
        .create(NewEmployee::new("EMP001", "Renamed Lars"))
        .await
        .unwrap();
    hire(&rota, &["EMP900"]).await;

    let report = rota
        .bootstrap(&config(0), date("2024-03-01"))
        .await
        .unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.refreshed, vec!["EMP001"]);

    let lars = rota.employees().get("EMP001").await.unwrap();
    assert_eq!(lars.name, "Renamed Lars");
    assert!(lars.is_absent_on(&date("2024-03-01")));
    assert_eq!(rota.employees().list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn second_run_keeps_existing_schedules() {
    let (rota, _) = memory_rota();
    let today = date("2024-03-01");
    rota.bootstrap(&config(3), today).await.unwrap();
    let report = rota.bootstrap(&config(5), today).await.unwrap();
    assert_eq!(report.assignment.skipped.len(), 3);
    assert_eq!(report.assignment.assigned.len(), 2);
}

#[tokio::test]
async fn seeding_can_be_switched_off() {
    let (rota, _) = memory_rota();
    let cfg = BootstrapConfig {
        seed_employees: false,
        ..config(7)
    };
    let report = rota.bootstrap(&cfg, date("2024-03-01")).await.unwrap();
    assert!(report.created.is_empty());
    assert!(report.assignment.assigned.is_empty());
}

#[tokio::test]
async fn spawned_bootstrap_runs_in_background() {
    let (rota, _) = memory_rota();
    let handle = rota.spawn_bootstrap(config(2)).unwrap();
    handle.await.unwrap();
    assert_eq!(rota.employees().list().await.unwrap().len(), 5);
    assert_eq!(rota.schedules().list(Default::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn disabled_bootstrap_spawns_nothing() {
    let (rota, _) = memory_rota();
    let cfg = BootstrapConfig {
        enabled: false,
        ..Default::default()
    };
    assert!(rota.spawn_bootstrap(cfg).is_none());
}
