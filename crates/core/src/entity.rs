use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{RotaError, RotaResult};

/// Open key/value map attached to an employee. Opaque to the scheduler.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Identity of the singleton rule row.
pub const RULE_ID: &str = "system_rules";

/// Column widths of the persisted layout.
pub const MAX_EMPLOYEE_NUMBER_LEN: usize = 36;
pub const MAX_NAME_LEN: usize = 255;

// ── DutyDate ──────────────────────────────────────────────────

/// A calendar date in canonical `YYYY-MM-DD` form.
///
/// Parsing rejects anything that does not re-format to the exact input, so
/// `2024-2-1` and `2024-02-01T00:00` are both refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DutyDate(NaiveDate);

impl DutyDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn parse(s: &str) -> RotaResult<Self> {
        let date = NaiveDate::parse_from_str(s, Self::FORMAT)
            .map_err(|_| RotaError::InvalidDate(s.to_string()))?;
        if date.format(Self::FORMAT).to_string() != s {
            return Err(RotaError::InvalidDate(s.to_string()));
        }
        Ok(Self(date))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> RotaResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| RotaError::InvalidDate(format!("{year:04}-{month:02}-{day:02}")))
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    /// The date `days` later, or `None` past the end of the calendar.
    pub fn plus_days(&self, days: u64) -> Option<Self> {
        self.0.checked_add_days(Days::new(days)).map(Self)
    }

    /// Signed number of days from `earlier` to `self`.
    pub fn days_since(&self, earlier: &DutyDate) -> i64 {
        (self.0 - earlier.0).num_days()
    }
}

impl From<NaiveDate> for DutyDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for DutyDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl FromStr for DutyDate {
    type Err = RotaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DutyDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DutyDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ── Employee ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_number: String,
    pub name: String,
    /// Number of schedule rows naming this employee. Derived; only the
    /// reconciler writes it.
    pub first_line_support_count: u32,
    /// Dates on which the employee must not be assigned. Order is preserved.
    pub known_absences: Vec<DutyDate>,
    pub metadata: Metadata,
}

impl Employee {
    pub fn is_absent_on(&self, date: &DutyDate) -> bool {
        self.known_absences.contains(date)
    }
}

/// Input for creating (or overwriting) an employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmployee {
    pub employee_number: String,
    pub name: String,
    #[serde(default)]
    pub known_absences: Vec<DutyDate>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl NewEmployee {
    pub fn new(employee_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            employee_number: employee_number.into(),
            name: name.into(),
            known_absences: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_absences(mut self, absences: Vec<DutyDate>) -> Self {
        self.known_absences = absences;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn validate(&self) -> RotaResult<()> {
        validate_employee_number(&self.employee_number)?;
        validate_name(&self.name)
    }
}

/// Partial update for an employee. `None` leaves the field untouched.
///
/// The duty count is deliberately absent: it is derived from schedules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub known_absences: Option<Vec<DutyDate>>,
    pub metadata: Option<Metadata>,
}

impl EmployeeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.known_absences.is_none() && self.metadata.is_none()
    }

    pub fn validate(&self) -> RotaResult<()> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }

    /// Merge the provided fields over `current`.
    pub fn apply_to(&self, current: &Employee) -> Employee {
        let mut merged = current.clone();
        if let Some(name) = &self.name {
            merged.name = name.clone();
        }
        if let Some(absences) = &self.known_absences {
            merged.known_absences = absences.clone();
        }
        if let Some(metadata) = &self.metadata {
            merged.metadata = metadata.clone();
        }
        merged
    }
}

fn validate_employee_number(number: &str) -> RotaResult<()> {
    if number.trim().is_empty() {
        return Err(RotaError::InvalidEmployee {
            field: "employee_number".into(),
            message: "must not be empty".into(),
        });
    }
    if number.chars().count() > MAX_EMPLOYEE_NUMBER_LEN {
        return Err(RotaError::InvalidEmployee {
            field: "employee_number".into(),
            message: format!("longer than {MAX_EMPLOYEE_NUMBER_LEN} characters"),
        });
    }
    Ok(())
}

fn validate_name(name: &str) -> RotaResult<()> {
    if name.trim().is_empty() {
        return Err(RotaError::InvalidEmployee {
            field: "name".into(),
            message: "must not be empty".into(),
        });
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RotaError::InvalidEmployee {
            field: "name".into(),
            message: format!("longer than {MAX_NAME_LEN} characters"),
        });
    }
    Ok(())
}

// ── Schedule ──────────────────────────────────────────────────

/// The first-line support assignment for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub date: DutyDate,
    pub first_line_support: String,
}

impl Schedule {
    pub fn new(date: DutyDate, employee_number: impl Into<String>) -> Self {
        Self {
            date,
            first_line_support: employee_number.into(),
        }
    }
}

/// Inclusive date bounds for schedule listing. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DutyDate>,
    pub end: Option<DutyDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: DutyDate, end: DutyDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: &DutyDate) -> bool {
        self.start.map_or(true, |s| *date >= s) && self.end.map_or(true, |e| *date <= e)
    }
}

// ── Rule ──────────────────────────────────────────────────────

/// Process-wide scheduling rules. Stored and reported, not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub max_days_per_week: i32,
    pub preferred_balance: f64,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            max_days_per_week: 3,
            preferred_balance: 0.2,
        }
    }
}

impl Rule {
    pub fn validate(&self) -> RotaResult<()> {
        if self.max_days_per_week < 1 {
            return Err(RotaError::InvalidRule {
                field: "max_days_per_week".into(),
                message: format!("must be positive, got {}", self.max_days_per_week),
            });
        }
        if !self.preferred_balance.is_finite() || self.preferred_balance < 0.0 {
            return Err(RotaError::InvalidRule {
                field: "preferred_balance".into(),
                message: format!("must be a non-negative number, got {}", self.preferred_balance),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub max_days_per_week: Option<i32>,
    pub preferred_balance: Option<f64>,
}

impl RuleUpdate {
    pub fn apply_to(&self, current: &Rule) -> Rule {
        Rule {
            max_days_per_week: self.max_days_per_week.unwrap_or(current.max_days_per_week),
            preferred_balance: self.preferred_balance.unwrap_or(current.preferred_balance),
        }
    }
}
