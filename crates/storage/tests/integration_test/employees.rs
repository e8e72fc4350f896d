use serde_json::json;

use rota_core::{EmployeeUpdate, Metadata, NewEmployee};

use crate::helpers::{date, duty_count, hire, memory_rota};

#[tokio::test]
async fn create_twice_keeps_one_row_with_latest_name() {
    let (rota, _) = memory_rota();
    let store = rota.employees();
    store.create(NewEmployee::new("EMP001", "Lars")).await.unwrap();
    let number = store
        .create(NewEmployee::new("EMP001", "Lars Larsson"))
        .await
        .unwrap();
    assert_eq!(number, "EMP001");

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Lars Larsson");
}

#[tokio::test]
async fn upsert_never_resets_duty_count() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001"]).await;
    rota.schedules().create(date("2024-03-01"), "EMP001").await.unwrap();
    rota.schedules().create(date("2024-03-02"), "EMP001").await.unwrap();

    rota.employees()
        .create(NewEmployee::new("EMP001", "Renamed"))
        .await
        .unwrap();
    assert_eq!(duty_count(&rota, "EMP001").await, 2);
}

#[tokio::test]
async fn absences_and_metadata_round_trip() {
    let (rota, _) = memory_rota();
    let absences = vec![date("2024-03-05"), date("2024-03-01"), date("2024-03-03")];
    let metadata: Metadata = json!({"team": "ops", "skills": ["linux", "sql"], "level": 3})
        .as_object()
        .cloned()
        .unwrap();
    rota.employees()
        .create(
            NewEmployee::new("EMP001", "Lars Larsson")
                .with_absences(absences.clone())
                .with_metadata(metadata.clone()),
        )
        .await
        .unwrap();

    let employee = rota.employees().get("EMP001").await.unwrap();
    assert_eq!(employee.known_absences, absences);
    assert_eq!(employee.metadata, metadata);
}

#[tokio::test]
async fn get_missing_is_none() {
    let (rota, _) = memory_rota();
    assert!(rota.employees().get("EMP404").await.is_none());
}

#[tokio::test]
async fn update_merges_only_given_fields() {
    let (rota, _) = memory_rota();
    rota.employees()
        .create(NewEmployee::new("EMP001", "Lars Larsson").with_absences(vec![date("2024-03-01")]))
        .await
        .unwrap();

    let update = EmployeeUpdate {
        name: Some("Lars L.".into()),
        ..Default::default()
    };
    assert!(rota.employees().update("EMP001", update).await.unwrap());

    let employee = rota.employees().get("EMP001").await.unwrap();
    assert_eq!(employee.name, "Lars L.");
    assert_eq!(employee.known_absences, vec![date("2024-03-01")]);
}

#[tokio::test]
async fn update_missing_is_false() {
    let (rota, _) = memory_rota();
    let update = EmployeeUpdate {
        name: Some("Nobody".into()),
        ..Default::default()
    };
    assert!(!rota.employees().update("EMP404", update).await.unwrap());
}

#[tokio::test]
async fn delete_cascades_and_leaves_others_alone() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001", "EMP002"]).await;
    let schedules = rota.schedules();
    for d in ["2024-03-01", "2024-03-02", "2024-03-03"] {
        schedules.create(date(d), "EMP001").await.unwrap();
    }
    schedules.create(date("2024-03-04"), "EMP002").await.unwrap();
    schedules.create(date("2024-03-05"), "EMP002").await.unwrap();

    assert!(rota.employees().delete("EMP001").await.unwrap());

    assert!(rota.employees().get("EMP001").await.is_none());
    let remaining = schedules.list(Default::default()).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|s| s.first_line_support == "EMP002"));
    assert_eq!(duty_count(&rota, "EMP002").await, 2);
}

#[tokio::test]
async fn delete_missing_is_false() {
    let (rota, _) = memory_rota();
    assert!(!rota.employees().delete("EMP404").await.unwrap());
}

#[tokio::test]
async fn list_propagates_connectivity_failure() {
    let (rota, backend) = memory_rota();
    hire(&rota, &["EMP001"]).await;
    backend.set_reachable(false);
    assert!(rota.employees().list().await.is_err());
}

#[tokio::test]
async fn writes_propagate_connectivity_failure() {
    let (rota, backend) = memory_rota();
    backend.set_reachable(false);
    assert!(rota
        .employees()
        .create(NewEmployee::new("EMP001", "Lars"))
        .await
        .is_err());
    assert!(rota.employees().delete("EMP001").await.is_err());
}
