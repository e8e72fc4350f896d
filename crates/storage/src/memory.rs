//! In-process backend with the same semantics as Postgres.
//!
//! All state sits behind one async mutex, so each operation (write plus
//! recount) is a single critical section. Reachability can be switched off to
//! exercise the connectivity paths of the stores.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use rota_core::{DateRange, DutyDate, Employee, NewEmployee, Rule, Schedule};

use crate::backend::RotaBackend;
use crate::error::{StoreError, StoreResult};
use crate::reconcile::tally_duties;

#[derive(Default)]
struct MemoryState {
    employees: BTreeMap<String, Employee>,
    schedules: BTreeMap<DutyDate, String>,
    rule: Option<Rule>,
}

impl MemoryState {
    fn recount(&mut self) -> u64 {
        let schedules: Vec<Schedule> = self
            .schedules
            .iter()
            .map(|(date, who)| Schedule::new(*date, who.clone()))
            .collect();
        let counts = tally_duties(&schedules);
        for employee in self.employees.values_mut() {
            employee.first_line_support_count = 0;
        }
        let mut assigned = 0;
        for (number, count) in counts {
            if let Some(employee) = self.employees.get_mut(&number) {
                employee.first_line_support_count = count;
                assigned += 1;
            }
        }
        assigned
    }
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    reachable: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Overwrite a stored count, bypassing reconciliation. Test hook for
    /// out-of-band edits.
    pub async fn corrupt_count(&self, employee_number: &str, count: u32) {
        if let Some(e) = self.state.lock().await.employees.get_mut(employee_number) {
            e.first_line_support_count = count;
        }
    }

    fn check_reachable(&self) -> StoreResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connectivity {
                attempts: 1,
                message: "memory backend marked unreachable".into(),
            })
        }
    }
}

#[async_trait]
impl RotaBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn await_ready(&self) -> StoreResult<()> {
        self.check_reachable()
    }

    async fn initialize(&self) -> StoreResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if state.rule.is_none() {
            state.rule = Some(Rule::default());
        }
        Ok(())
    }

    async fn upsert_employee(&self, employee: &NewEmployee) -> StoreResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        let entry = state
            .employees
            .entry(employee.employee_number.clone())
            .or_insert_with(|| Employee {
                employee_number: employee.employee_number.clone(),
                name: String::new(),
                first_line_support_count: 0,
                known_absences: Vec::new(),
                metadata: Default::default(),
            });
        entry.name = employee.name.clone();
        entry.known_absences = employee.known_absences.clone();
        entry.metadata = employee.metadata.clone();
        Ok(())
    }

    async fn fetch_employee(&self, employee_number: &str) -> StoreResult<Option<Employee>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.employees.get(employee_number).cloned())
    }

    async fn fetch_employees(&self) -> StoreResult<Vec<Employee>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.employees.values().cloned().collect())
    }

    async fn rewrite_employee(&self, employee: &Employee) -> StoreResult<bool> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        match state.employees.get_mut(&employee.employee_number) {
            Some(current) => {
                current.name = employee.name.clone();
                current.known_absences = employee.known_absences.clone();
                current.metadata = employee.metadata.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_employee(&self, employee_number: &str) -> StoreResult<bool> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if !state.employees.contains_key(employee_number) {
            return Ok(false);
        }
        state.schedules.retain(|_, who| who != employee_number);
        state.employees.remove(employee_number);
        state.recount();
        Ok(true)
    }

    async fn upsert_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if !state.employees.contains_key(&schedule.first_line_support) {
            return Err(StoreError::UnknownEmployee(schedule.first_line_support.clone()));
        }
        state
            .schedules
            .insert(schedule.date, schedule.first_line_support.clone());
        state.recount();
        Ok(())
    }

    async fn fetch_schedule(&self, date: &DutyDate) -> StoreResult<Option<Schedule>> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .await
            .schedules
            .get(date)
            .map(|who| Schedule::new(*date, who.clone())))
    }

    async fn fetch_schedules(&self, range: &DateRange) -> StoreResult<Vec<Schedule>> {
        self.check_reachable()?;
        Ok(self
            .state
            .lock()
            .await
            .schedules
            .iter()
            .filter(|(date, _)| range.contains(date))
            .map(|(date, who)| Schedule::new(*date, who.clone()))
            .collect())
    }

    async fn reassign_schedule(&self, schedule: &Schedule) -> StoreResult<bool> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if !state.schedules.contains_key(&schedule.date) {
            return Ok(false);
        }
        if !state.employees.contains_key(&schedule.first_line_support) {
            return Err(StoreError::UnknownEmployee(schedule.first_line_support.clone()));
        }
        state
            .schedules
            .insert(schedule.date, schedule.first_line_support.clone());
        state.recount();
        Ok(true)
    }

    async fn delete_schedule(&self, date: &DutyDate) -> StoreResult<bool> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if state.schedules.remove(date).is_none() {
            return Ok(false);
        }
        state.recount();
        Ok(true)
    }

    async fn recount_duties(&self) -> StoreResult<u64> {
        self.check_reachable()?;
        Ok(self.state.lock().await.recount())
    }

    async fn fetch_rule(&self) -> StoreResult<Option<Rule>> {
        self.check_reachable()?;
        Ok(self.state.lock().await.rule)
    }

    async fn seed_rule(&self, rule: &Rule) -> StoreResult<bool> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if state.rule.is_some() {
            return Ok(false);
        }
        state.rule = Some(*rule);
        Ok(true)
    }

    async fn upsert_rule(&self, rule: &Rule) -> StoreResult<()> {
        self.check_reachable()?;
        self.state.lock().await.rule = Some(*rule);
        Ok(())
    }

    async fn close(&self) {}
}
