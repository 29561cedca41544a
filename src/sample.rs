use chrono::{Duration, Local, NaiveDate};
use rand::Rng;

use crate::models::{AttendanceRecord, Status};

pub const STUDENTS: usize = 10;
pub const DAYS: i64 = 12;
const ABSENCE_RATE: f64 = 0.15;

/// Default first day of generated data.
pub fn default_start() -> NaiveDate {
    Local::now().date_naive() - Duration::days(15)
}

/// Demo data: ten students over twelve consecutive days with random absences.
pub fn generate<R: Rng>(start: NaiveDate, rng: &mut R) -> Vec<AttendanceRecord> {
    let students: Vec<(String, String)> = (1..=STUDENTS)
        .map(|i| ((100 + i).to_string(), format!("Student_{i}")))
        .collect();

    let mut records = Vec::with_capacity(STUDENTS * DAYS as usize);
    for offset in 0..DAYS {
        let date = start + Duration::days(offset);
        for (student_id, student_name) in &students {
            let status = if rng.gen::<f64>() > ABSENCE_RATE {
                Status::Present
            } else {
                Status::Absent
            };
            records.push(AttendanceRecord {
                student_id: student_id.clone(),
                student_name: student_name.clone(),
                date,
                status,
            });
        }
    }
    records
}
