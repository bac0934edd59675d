//! Completion estimate for a form record.
//!
//! The percentage only counts populated fields against a fixed expectation.
//! It says nothing about whether the form is valid or whether the fields that
//! matter for this subject are filled.

use crate::form::FormRecord;
use serde::{Deserialize, Serialize};

/// Number of fields a "complete" form is expected to hold
pub const TOTAL_EXPECTED_FIELDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub percent_complete: u8,
    pub status: ProgressStatus,
}

impl ProgressSnapshot {
    /// Dashboard line describing the snapshot
    pub fn describe(&self) -> String {
        match self.status {
            ProgressStatus::NotStarted => "Aún no has comenzado".to_string(),
            ProgressStatus::Completed => "Formulario completado".to_string(),
            ProgressStatus::InProgress => {
                format!("Progreso: {}% completado", self.percent_complete)
            }
        }
    }
}

/// `min(100, round(100 * set / TOTAL_EXPECTED_FIELDS))`, rounding halves up
pub fn percent_complete(fields_set: usize) -> u8 {
    rounded_percent(fields_set, TOTAL_EXPECTED_FIELDS)
}

fn rounded_percent(part: usize, total: usize) -> u8 {
    let rounded = (200 * part + total) / (2 * total);
    rounded.min(100) as u8
}

pub fn snapshot(record: &FormRecord) -> ProgressSnapshot {
    let percent_complete = percent_complete(record.len());
    let status = match percent_complete {
        0 => ProgressStatus::NotStarted,
        100 => ProgressStatus::Completed,
        _ => ProgressStatus::InProgress,
    };
    ProgressSnapshot {
        percent_complete,
        status,
    }
}
