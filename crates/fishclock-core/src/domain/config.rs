//! The Fish Clock settings record.
//!
//! [`Config`] is serialised with camelCase field names because the same JSON
//! shape is consumed by the web views and carried inside change
//! notifications:
//!
//! ```json
//! {
//!   "workStartHour": 9,
//!   "workEndHour": 18,
//!   "monthlySalary": 15000,
//!   "payday": 25,
//!   "opacity": 0.9
//! }
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a record written by an
//! older build (missing newer fields) still loads, and the missing fields take
//! their default values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigValidationError {
    #[error("{field} must be an hour between 0 and 23, got {value}")]
    HourOutOfRange { field: &'static str, value: i32 },

    #[error("work start hour {start} must be before work end hour {end}")]
    EmptyWorkday { start: i32, end: i32 },

    #[error("payday must be a day of the month between 1 and 31, got {0}")]
    PaydayOutOfRange(i32),

    #[error("monthly salary must not be negative, got {0}")]
    NegativeSalary(i32),

    #[error("opacity must be between 0.0 and 1.0, got {0}")]
    OpacityOutOfRange(f64),
}

/// Application settings shared by every window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Hour of the day the workday starts (0-23).
    #[serde(default = "default_work_start_hour")]
    pub work_start_hour: i32,
    /// Hour of the day the workday ends (0-23).
    #[serde(default = "default_work_end_hour")]
    pub work_end_hour: i32,
    /// Monthly salary used by the main display's earnings counter.
    #[serde(default = "default_monthly_salary")]
    pub monthly_salary: i32,
    /// Day of the month the salary is paid.
    #[serde(default = "default_payday")]
    pub payday: i32,
    /// Main window opacity, 0.0 (transparent) to 1.0 (opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_work_start_hour() -> i32 {
    9
}
fn default_work_end_hour() -> i32 {
    18
}
fn default_monthly_salary() -> i32 {
    15000
}
fn default_payday() -> i32 {
    25
}
fn default_opacity() -> f64 {
    0.9
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_start_hour: default_work_start_hour(),
            work_end_hour: default_work_end_hour(),
            monthly_salary: default_monthly_salary(),
            payday: default_payday(),
            opacity: default_opacity(),
        }
    }
}

impl Config {
    /// Checks that every field holds a value the views can render.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigValidationError`] found, checking fields in
    /// declaration order.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check_hour("workStartHour", self.work_start_hour)?;
        check_hour("workEndHour", self.work_end_hour)?;
        if self.work_start_hour >= self.work_end_hour {
            return Err(ConfigValidationError::EmptyWorkday {
                start: self.work_start_hour,
                end: self.work_end_hour,
            });
        }
        if self.monthly_salary < 0 {
            return Err(ConfigValidationError::NegativeSalary(self.monthly_salary));
        }
        if !(1..=31).contains(&self.payday) {
            return Err(ConfigValidationError::PaydayOutOfRange(self.payday));
        }
        // `contains` is false for NaN, so NaN is rejected here too.
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(ConfigValidationError::OpacityOutOfRange(self.opacity));
        }
        Ok(())
    }
}

fn check_hour(field: &'static str, value: i32) -> Result<(), ConfigValidationError> {
    if (0..=23).contains(&value) {
        Ok(())
    } else {
        Err(ConfigValidationError::HourOutOfRange { field, value })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
