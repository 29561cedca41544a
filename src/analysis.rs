use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{AttendanceRecord, DailyRate, Status, StudentSummary};

pub const DEFAULTER_THRESHOLD: f64 = 75.0;

/// Which records count toward a student's or a day's total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CountingPolicy {
    /// Every record is a counted day, Leave and Holiday included.
    #[default]
    AllDays,
    /// Only Present and Absent records are counted.
    AttendedDays,
}

impl CountingPolicy {
    pub fn counts(self, status: Status) -> bool {
        match self {
            CountingPolicy::AllDays => true,
            CountingPolicy::AttendedDays => matches!(status, Status::Present | Status::Absent),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisOptions {
    pub policy: CountingPolicy,
    pub threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            policy: CountingPolicy::AllDays,
            threshold: DEFAULTER_THRESHOLD,
        }
    }
}

#[derive(Default)]
struct Tally {
    present: usize,
    total: usize,
}

impl Tally {
    fn record(&mut self, status: Status) {
        self.total += 1;
        if status == Status::Present {
            self.present += 1;
        }
    }

    // groups only exist once a record was counted, so total > 0
    fn percentage(&self) -> f64 {
        self.present as f64 / self.total as f64 * 100.0
    }
}

/// Per-student totals, best attendance first (ties by student id).
pub fn summarize_students(
    records: &[AttendanceRecord],
    options: &AnalysisOptions,
) -> Vec<StudentSummary> {
    let mut students: HashMap<&str, (&str, Tally)> = HashMap::new();

    for record in records.iter().filter(|r| options.policy.counts(r.status)) {
        let entry = students
            .entry(record.student_id.as_str())
            .or_insert_with(|| (record.student_name.as_str(), Tally::default()));
        entry.1.record(record.status);
    }

    let mut summaries: Vec<StudentSummary> = students
        .into_iter()
        .map(|(student_id, (student_name, tally))| {
            let percentage = tally.percentage();
            StudentSummary {
                student_id: student_id.to_string(),
                student_name: student_name.to_string(),
                present_count: tally.present,
                total_count: tally.total,
                percentage,
                is_defaulter: percentage < options.threshold,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    summaries
}

/// Per-date attendance rate in ascending date order.
pub fn summarize_daily(records: &[AttendanceRecord], options: &AnalysisOptions) -> Vec<DailyRate> {
    let mut days: BTreeMap<NaiveDate, Tally> = BTreeMap::new();

    for record in records.iter().filter(|r| options.policy.counts(r.status)) {
        days.entry(record.date).or_default().record(record.status);
    }

    days.into_iter()
        .map(|(date, tally)| DailyRate {
            date,
            present_count: tally.present,
            total_count: tally.total,
            rate: tally.percentage(),
        })
        .collect()
}
