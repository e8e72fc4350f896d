use std::sync::Arc;

use rota_core::{DutyDate, NewEmployee};
use rota_storage::{MemoryBackend, Rota};

pub fn date(s: &str) -> DutyDate {
    DutyDate::parse(s).unwrap()
}

/// A facade over a fresh in-memory backend, plus the backend for fault
/// injection.
pub fn memory_rota() -> (Rota, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    (Rota::with_backend(backend.clone()), backend)
}

/// Create employees named after their numbers.
pub async fn hire(rota: &Rota, numbers: &[&str]) {
    for n in numbers {
        rota.employees()
            .create(NewEmployee::new(*n, format!("Employee {n}")))
            .await
            .unwrap();
    }
}

pub async fn duty_count(rota: &Rota, number: &str) -> u32 {
    rota.employees()
        .get(number)
        .await
        .unwrap_or_else(|| panic!("{number} should exist"))
        .first_line_support_count
}
