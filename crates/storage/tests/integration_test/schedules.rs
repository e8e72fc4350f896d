use rota_core::DateRange;
use rota_storage::StoreError;

use crate::helpers::{date, duty_count, hire, memory_rota};

#[tokio::test]
async fn range_query_is_inclusive_and_ascending() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001", "EMP002"]).await;
    // Written out of order, with neighbours outside the range.
    for (i, d) in [
        "2024-02-05", "2024-01-31", "2024-02-03", "2024-02-01", "2024-02-06", "2024-02-04",
        "2024-02-02",
    ]
    .iter()
    .enumerate()
    {
        let who = if i % 2 == 0 { "EMP001" } else { "EMP002" };
        rota.schedules().create(date(d), who).await.unwrap();
    }

    let listed = rota
        .schedules()
        .list(DateRange::between(date("2024-02-01"), date("2024-02-05")))
        .await
        .unwrap();
    let dates: Vec<String> = listed.iter().map(|s| s.date.to_string()).collect();
    assert_eq!(
        dates,
        vec!["2024-02-01", "2024-02-02", "2024-02-03", "2024-02-04", "2024-02-05"]
    );
}

#[tokio::test]
async fn omitted_bounds_are_open() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001"]).await;
    for d in ["2024-01-15", "2024-02-15", "2024-03-15"] {
        rota.schedules().create(date(d), "EMP001").await.unwrap();
    }

    let schedules = rota.schedules();
    assert_eq!(schedules.list(DateRange::all()).await.unwrap().len(), 3);

    let from_feb = DateRange {
        start: Some(date("2024-02-01")),
        end: None,
    };
    assert_eq!(schedules.list(from_feb).await.unwrap().len(), 2);

    let until_feb = DateRange {
        start: None,
        end: Some(date("2024-02-15")),
    };
    assert_eq!(schedules.list(until_feb).await.unwrap().len(), 2);
}

#[tokio::test]
async fn counts_follow_every_mutation() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001", "EMP002"]).await;
    let schedules = rota.schedules();

    schedules.create(date("2024-03-01"), "EMP001").await.unwrap();
    schedules.create(date("2024-03-02"), "EMP001").await.unwrap();
    assert_eq!(duty_count(&rota, "EMP001").await, 2);

    // Upsert over an existing date moves the duty.
    schedules.create(date("2024-03-02"), "EMP002").await.unwrap();
    assert_eq!(duty_count(&rota, "EMP001").await, 1);
    assert_eq!(duty_count(&rota, "EMP002").await, 1);

    assert!(schedules.update(date("2024-03-01"), "EMP002").await.unwrap());
    assert_eq!(duty_count(&rota, "EMP001").await, 0);
    assert_eq!(duty_count(&rota, "EMP002").await, 2);

    assert!(schedules.delete(&date("2024-03-01")).await.unwrap());
    assert_eq!(duty_count(&rota, "EMP002").await, 1);
}

#[tokio::test]
async fn reassign_to_unknown_employee_fails_and_keeps_row() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001"]).await;
    rota.schedules().create(date("2024-03-01"), "EMP001").await.unwrap();

    let err = rota
        .schedules()
        .update(date("2024-03-01"), "EMP999")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownEmployee(_)));
    let kept = rota.schedules().get(&date("2024-03-01")).await.unwrap();
    assert_eq!(kept.first_line_support, "EMP001");
    assert_eq!(duty_count(&rota, "EMP001").await, 1);
}

#[tokio::test]
async fn reassign_of_unscheduled_date_is_not_found_even_for_unknown_employee() {
    let (rota, _) = memory_rota();
    hire(&rota, &["EMP001"]).await;

    let updated = rota
        .schedules()
        .update(date("2031-01-01"), "EMP999")
        .await
        .unwrap();
    assert!(!updated);
    assert!(!rota.schedules().update(date("2031-01-01"), "EMP001").await.unwrap());
    assert!(rota.schedules().get(&date("2031-01-01")).await.is_none());
}

#[tokio::test]
async fn get_degrades_when_unreachable() {
    let (rota, backend) = memory_rota();
    hire(&rota, &["EMP001"]).await;
    rota.schedules().create(date("2024-03-01"), "EMP001").await.unwrap();
    backend.set_reachable(false);
    assert!(rota.schedules().get(&date("2024-03-01")).await.is_none());
    assert!(rota.schedules().exists(&date("2024-03-01")).await.is_err());
}
