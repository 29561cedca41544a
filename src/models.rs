use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ValidationError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Present,
    Absent,
    Leave,
    Holiday,
}

impl Status {
    pub fn code(self) -> char {
        match self {
            Status::Present => 'P',
            Status::Absent => 'A',
            Status::Leave => 'L',
            Status::Holiday => 'H',
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Accepts the single-letter code or the full word, in any case.
impl FromStr for Status {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P" | "PRESENT" => Ok(Status::Present),
            "A" | "ABSENT" => Ok(Status::Absent),
            "L" | "LEAVE" => Ok(Status::Leave),
            "H" | "HOLIDAY" => Ok(Status::Holiday),
            _ => Err(ValidationError::InvalidStatus(value.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub student_name: String,
    pub date: NaiveDate,
    pub status: Status,
}

impl AttendanceRecord {
    /// Validates raw text fields into a typed record.
    pub fn parse(
        student_id: &str,
        student_name: &str,
        date: &str,
        status: &str,
    ) -> Result<Self, ValidationError> {
        let student_id = required("student_id", student_id)?;
        let student_name = required("student_name", student_name)?;
        let date = date.trim();
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|_| ValidationError::InvalidDate(date.to_string()))?;
        let status = status.parse()?;

        Ok(Self {
            student_id,
            student_name,
            date,
            status,
        })
    }

    pub fn key(&self) -> (&str, NaiveDate) {
        (self.student_id.as_str(), self.date)
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub student_id: String,
    pub student_name: String,
    pub present_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub is_defaulter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRate {
    pub date: NaiveDate,
    pub present_count: usize,
    pub total_count: usize,
    pub rate: f64,
}
