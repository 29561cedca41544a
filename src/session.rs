use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::analysis::{summarize_daily, summarize_students};
use crate::config::Settings;
use crate::error::AppError;
use crate::models::AttendanceRecord;
use crate::report::{self, AnalysisReport, ChartSink};
use crate::sample;
use crate::store::{deduplicate, LoadReport, RecordStore, SaveReport};

/// Raw, unvalidated input for a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub student_id: String,
    pub student_name: String,
    pub date: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(NewRecord),
    Analyze,
    SaveCleaned,
    GenerateSample { start: NaiveDate },
    Exit,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Added(AttendanceRecord),
    Analyzed(AnalysisReport),
    Saved(SaveReport),
    Generated(usize),
    Exit { unsaved: bool },
}

/// The numbered menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    AddRecord,
    Analyze,
    SaveCleaned,
    GenerateSample,
    Exit,
}

impl MenuChoice {
    pub const ALL: [MenuChoice; 5] = [
        MenuChoice::AddRecord,
        MenuChoice::Analyze,
        MenuChoice::SaveCleaned,
        MenuChoice::GenerateSample,
        MenuChoice::Exit,
    ];

    pub fn key(self) -> char {
        match self {
            MenuChoice::AddRecord => '1',
            MenuChoice::Analyze => '2',
            MenuChoice::SaveCleaned => '3',
            MenuChoice::GenerateSample => '4',
            MenuChoice::Exit => '5',
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MenuChoice::AddRecord => "Add record",
            MenuChoice::Analyze => "Analyze & show summary",
            MenuChoice::SaveCleaned => "Save cleaned data (deduplicate)",
            MenuChoice::GenerateSample => "Generate sample data (demo)",
            MenuChoice::Exit => "Exit",
        }
    }

    pub fn from_key(input: &str) -> Option<Self> {
        let input = input.trim();
        Self::ALL
            .into_iter()
            .find(|choice| input.len() == 1 && input.starts_with(choice.key()))
    }
}

/// Owns the record store and runs commands against it.
pub struct Session<S: ChartSink> {
    store: RecordStore,
    settings: Settings,
    sink: S,
    rng: StdRng,
}

impl<S: ChartSink> Session<S> {
    pub fn new(store: RecordStore, settings: Settings, sink: S) -> Self {
        Self {
            store,
            settings,
            sink,
            rng: StdRng::from_entropy(),
        }
    }

    /// Opens the configured data file and starts a session on it.
    pub fn open(settings: Settings, sink: S) -> Result<(Self, LoadReport), AppError> {
        let (store, report) = RecordStore::open(settings.data_file())?;
        Ok((Self::new(store, settings, sink), report))
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Outcome, AppError> {
        match command {
            Command::Add(input) => {
                let record = self.store.add_record(
                    &input.student_id,
                    &input.student_name,
                    &input.date,
                    &input.status,
                )?;
                Ok(Outcome::Added(record.clone()))
            }
            Command::Analyze => self.analyze().map(Outcome::Analyzed),
            Command::SaveCleaned => Ok(Outcome::Saved(self.store.save()?)),
            Command::GenerateSample { start } => {
                let records = sample::generate(start, &mut self.rng);
                let added = self.store.extend(records);
                info!(added, %start, "sample data generated");
                Ok(Outcome::Generated(added))
            }
            Command::Exit => Ok(Outcome::Exit {
                unsaved: self.store.is_dirty(),
            }),
        }
    }

    fn analyze(&mut self) -> Result<AnalysisReport, AppError> {
        let records = deduplicate(self.store.records());
        let options = &self.settings.options;
        let students = summarize_students(&records, options);
        let daily = summarize_daily(&records, options);
        info!(
            records = records.len(),
            students = students.len(),
            days = daily.len(),
            "attendance analyzed"
        );

        let mut charts = Vec::new();
        let series = [
            report::render_top_chart(&students, self.settings.top_n),
            report::render_daily_chart(&daily),
        ];
        for chart in &series {
            if let Some(path) = self.sink.draw(chart)? {
                charts.push(path);
            }
        }

        Ok(AnalysisReport {
            defaulters: report::defaulters(&students),
            students,
            daily,
            charts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StorageError, ValidationError};
    use crate::report::{ChartKind, ChartSeries, CsvChartSink};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSink {
        drawn: Vec<ChartSeries>,
    }

    impl ChartSink for &mut RecordingSink {
        fn draw(&mut self, series: &ChartSeries) -> Result<Option<PathBuf>, StorageError> {
            self.drawn.push(series.clone());
            Ok(Some(PathBuf::from(series.kind.file_name())))
        }
    }

    fn settings_in(dir: &TempDir) -> Settings {
        Settings {
            data_dir: dir.path().join("data"),
            ..Settings::default()
        }
    }

    fn add(id: &str, date: &str, status: &str) -> Command {
        Command::Add(NewRecord {
            student_id: id.to_string(),
            student_name: "A".to_string(),
            date: date.to_string(),
            status: status.to_string(),
        })
    }

    #[test]
    fn menu_keys_map_to_choices() {
        assert_eq!(MenuChoice::from_key("1"), Some(MenuChoice::AddRecord));
        assert_eq!(MenuChoice::from_key(" 3 "), Some(MenuChoice::SaveCleaned));
        assert_eq!(MenuChoice::from_key("5"), Some(MenuChoice::Exit));
        assert_eq!(MenuChoice::from_key("6"), None);
        assert_eq!(MenuChoice::from_key("12"), None);
        assert_eq!(MenuChoice::from_key(""), None);
    }

    #[test]
    fn analyze_deduplicates_snapshot_and_draws_both_charts() {
        let dir = TempDir::new().unwrap();
        let mut sink = RecordingSink::default();
        let store = RecordStore::new(settings_in(&dir).data_file());
        let mut session = Session::new(store, settings_in(&dir), &mut sink);

        session.dispatch(add("S1", "2025-01-01", "P")).unwrap();
        session.dispatch(add("S1", "2025-01-01", "P")).unwrap();
        session.dispatch(add("S1", "2025-01-02", "A")).unwrap();

        let Outcome::Analyzed(report) = session.dispatch(Command::Analyze).unwrap() else {
            panic!("expected analysis");
        };
        assert_eq!(report.students.len(), 1);
        assert_eq!(report.students[0].present_count, 1);
        assert_eq!(report.students[0].total_count, 2);
        assert_eq!(report.defaulters.len(), 1);
        assert_eq!(report.daily.len(), 2);
        assert_eq!(report.charts.len(), 2);
        // analysis never mutates the store
        assert_eq!(session.store().len(), 3);
        drop(session);

        let kinds: Vec<ChartKind> = sink.drawn.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ChartKind::TopStudents, ChartKind::DailyRate]);
    }

    #[test]
    fn invalid_add_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let (mut session, _) =
            Session::open(settings_in(&dir), CsvChartSink::new(dir.path())).unwrap();

        let err = session.dispatch(add("S1", "2025-01-01", "X")).unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation(ValidationError::InvalidStatus(_))
        ));
        assert!(session.store().is_empty());

        let Outcome::Exit { unsaved } = session.dispatch(Command::Exit).unwrap() else {
            panic!("expected exit");
        };
        assert!(!unsaved);
    }

    #[test]
    fn sample_then_save_persists_clean_data() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);
        let (session, _) = Session::open(settings.clone(), CsvChartSink::new(&settings.data_dir)).unwrap();
        let mut session = session.with_seed(3);
        let start = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

        let Outcome::Generated(count) = session.dispatch(Command::GenerateSample { start }).unwrap()
        else {
            panic!("expected generated rows");
        };
        assert_eq!(count, 120);
        session.dispatch(Command::GenerateSample { start }).unwrap();

        let Outcome::Exit { unsaved } = session.dispatch(Command::Exit).unwrap() else {
            panic!("expected exit");
        };
        assert!(unsaved);

        let Outcome::Saved(saved) = session.dispatch(Command::SaveCleaned).unwrap() else {
            panic!("expected save");
        };
        assert_eq!(saved.written, 120);
        assert_eq!(saved.duplicates_removed, 120);

        let (reopened, load) = Session::open(settings.clone(), CsvChartSink::new(&settings.data_dir)).unwrap();
        assert_eq!(load.loaded, 120);
        assert_eq!(reopened.store().records(), session.store().records());
    }

    #[test]
    fn analyze_writes_chart_artifacts_to_data_dir() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);
        let (mut session, _) =
            Session::open(settings.clone(), CsvChartSink::new(&settings.data_dir)).unwrap();
        session.dispatch(add("101", "2025-01-01", "P")).unwrap();

        let Outcome::Analyzed(report) = session.dispatch(Command::Analyze).unwrap() else {
            panic!("expected analysis");
        };
        assert_eq!(
            report.charts,
            vec![
                settings.data_dir.join("top_students.csv"),
                settings.data_dir.join("daily_rate.csv"),
            ]
        );
        assert!(report.charts.iter().all(|p| p.exists()));
    }

    #[test]
    fn empty_store_analysis_is_empty() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir);
        let (mut session, _) =
            Session::open(settings.clone(), CsvChartSink::new(&settings.data_dir)).unwrap();

        let Outcome::Analyzed(report) = session.dispatch(Command::Analyze).unwrap() else {
            panic!("expected analysis");
        };
        assert!(report.students.is_empty());
        assert!(report.daily.is_empty());
        assert!(report.charts.is_empty());
    }
}
