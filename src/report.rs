use std::fmt::Write;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::{DailyRate, StudentSummary};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub students: Vec<StudentSummary>,
    pub defaulters: Vec<StudentSummary>,
    pub daily: Vec<DailyRate>,
    pub charts: Vec<PathBuf>,
}

pub fn top_students(summaries: &[StudentSummary], n: usize) -> &[StudentSummary] {
    &summaries[..n.min(summaries.len())]
}

pub fn defaulters(summaries: &[StudentSummary]) -> Vec<StudentSummary> {
    summaries.iter().filter(|s| s.is_defaulter).cloned().collect()
}

pub fn format_summary(report: &AnalysisReport, top_n: usize, threshold: f64) -> String {
    let mut output = String::new();
    let top = top_students(&report.students, top_n);

    let _ = writeln!(output, "Attendance Summary (Top {}):", top_n);
    if top.is_empty() {
        let _ = writeln!(output, "No attendance records to analyze.");
    } else {
        for s in top {
            let _ = writeln!(
                output,
                "{} - {}: {:.2}% ({}/{})",
                s.student_id, s.student_name, s.percentage, s.present_count, s.total_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Defaulters (<{}%):", threshold);
    if report.defaulters.is_empty() {
        let _ = writeln!(output, "None.");
    } else {
        for s in &report.defaulters {
            let _ = writeln!(
                output,
                "{} - {}: {:.2}%",
                s.student_id, s.student_name, s.percentage
            );
        }
    }

    output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    TopStudents,
    DailyRate,
}

impl ChartKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ChartKind::TopStudents => "top_students.csv",
            ChartKind::DailyRate => "daily_rate.csv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Ordered `(label, value)` data handed to a [`ChartSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub title: String,
    pub value_label: &'static str,
    pub points: Vec<ChartPoint>,
}

pub fn render_top_chart(summaries: &[StudentSummary], n: usize) -> ChartSeries {
    let points: Vec<ChartPoint> = top_students(summaries, n)
        .iter()
        .map(|s| ChartPoint {
            label: format!("{} ({})", s.student_name, s.student_id),
            value: s.percentage,
        })
        .collect();

    ChartSeries {
        kind: ChartKind::TopStudents,
        title: format!("Top {} Students by Attendance", points.len()),
        value_label: "Attendance Percentage",
        points,
    }
}

pub fn render_daily_chart(daily: &[DailyRate]) -> ChartSeries {
    ChartSeries {
        kind: ChartKind::DailyRate,
        title: "Daily Attendance Rate".to_string(),
        value_label: "Attendance Rate (%)",
        points: daily
            .iter()
            .map(|d| ChartPoint {
                label: d.date.to_string(),
                value: d.rate,
            })
            .collect(),
    }
}

/// Consumer of chart series, e.g. a plotting backend.
///
/// Returns the artifact path when something was written.
pub trait ChartSink {
    fn draw(&mut self, series: &ChartSeries) -> Result<Option<PathBuf>, StorageError>;
}

/// Writes each series as a two-column `label,<value label>` CSV next to the
/// attendance file, replacing the previous run. An empty series removes it.
#[derive(Debug, Clone)]
pub struct CsvChartSink {
    dir: PathBuf,
}

impl CsvChartSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: ChartKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

impl ChartSink for CsvChartSink {
    fn draw(&mut self, series: &ChartSeries) -> Result<Option<PathBuf>, StorageError> {
        let path = self.path_for(series.kind);
        if series.points.is_empty() {
            debug!(chart = %series.title, "no data to plot");
            remove_stale(&path)?;
            return Ok(None);
        }

        write_series(&self.dir, &path, series)?;
        info!(chart = %series.title, path = %path.display(), points = series.points.len(), "chart data written");
        Ok(Some(path))
    }
}

// an empty series must not leave the previous run's data behind
fn remove_stale(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StorageError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_series(dir: &Path, path: &Path, series: &ChartSeries) -> Result<(), StorageError> {
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;
    writer
        .write_record(["label", series.value_label])
        .map_err(csv_err)?;
    for point in &series.points {
        writer.serialize(point).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn summary(id: &str, present: usize, total: usize) -> StudentSummary {
        let percentage = present as f64 / total as f64 * 100.0;
        StudentSummary {
            student_id: id.to_string(),
            student_name: format!("Student_{id}"),
            present_count: present,
            total_count: total,
            percentage,
            is_defaulter: percentage < 75.0,
        }
    }

    fn sample_summaries() -> Vec<StudentSummary> {
        vec![
            summary("101", 12, 12),
            summary("102", 10, 12),
            summary("103", 6, 12),
            summary("104", 3, 12),
        ]
    }

    #[test]
    fn top_students_caps_at_available() {
        let summaries = sample_summaries();
        assert_eq!(top_students(&summaries, 2).len(), 2);
        assert_eq!(top_students(&summaries, 2)[1].student_id, "102");
        assert_eq!(top_students(&summaries, 10).len(), 4);
        assert!(top_students(&[], 10).is_empty());
    }

    #[test]
    fn defaulters_keep_analyzer_order() {
        let ids: Vec<String> = defaulters(&sample_summaries())
            .into_iter()
            .map(|s| s.student_id)
            .collect();
        assert_eq!(ids, vec!["103", "104"]);
    }

    #[test]
    fn summary_text_lists_top_and_defaulters() {
        let students = sample_summaries();
        let report = AnalysisReport {
            defaulters: defaulters(&students),
            students,
            daily: Vec::new(),
            charts: Vec::new(),
        };
        let text = format_summary(&report, 2, 75.0);

        assert!(text.starts_with("Attendance Summary (Top 2):\n"));
        assert!(text.contains("101 - Student_101: 100.00% (12/12)"));
        assert!(text.contains("102 - Student_102: 83.33% (10/12)"));
        assert!(!text.contains("(6/12)"));
        assert!(text.contains("Defaulters (<75%):\n103 - Student_103: 50.00%\n104 - Student_104: 25.00%"));
    }

    #[test]
    fn summary_text_for_empty_report() {
        let report = AnalysisReport {
            students: Vec::new(),
            defaulters: Vec::new(),
            daily: Vec::new(),
            charts: Vec::new(),
        };
        let text = format_summary(&report, 10, 75.0);
        assert!(text.contains("No attendance records to analyze."));
        assert!(text.contains("None."));
    }

    #[test]
    fn chart_series_follow_input_order() {
        let top = render_top_chart(&sample_summaries(), 3);
        assert_eq!(top.kind, ChartKind::TopStudents);
        assert_eq!(top.title, "Top 3 Students by Attendance");
        assert_eq!(top.points[0].label, "Student_101 (101)");
        assert_eq!(top.points.len(), 3);

        let daily = render_daily_chart(&[DailyRate {
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            present_count: 1,
            total_count: 2,
            rate: 50.0,
        }]);
        assert_eq!(daily.points, vec![ChartPoint { label: "2025-01-01".to_string(), value: 50.0 }]);
    }

    #[test]
    fn csv_sink_writes_and_skips_empty_series() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvChartSink::new(dir.path().join("data"));

        let written = sink.draw(&render_top_chart(&sample_summaries(), 2)).unwrap();
        let path = written.unwrap();
        assert_eq!(path, sink.path_for(ChartKind::TopStudents));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next(), Some("label,Attendance Percentage"));
        assert_eq!(contents.lines().count(), 3);

        let skipped = sink.draw(&render_daily_chart(&[])).unwrap();
        assert!(skipped.is_none());
        assert!(!sink.path_for(ChartKind::DailyRate).exists());
    }

    #[test]
    fn csv_sink_clears_previous_run_when_series_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut sink = CsvChartSink::new(dir.path());

        sink.draw(&render_top_chart(&sample_summaries(), 3)).unwrap();
        assert!(sink.path_for(ChartKind::TopStudents).exists());

        let cleared = sink.draw(&render_top_chart(&sample_summaries(), 0)).unwrap();
        assert!(cleared.is_none());
        assert!(!sink.path_for(ChartKind::TopStudents).exists());
    }
}
