use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StorageError, ValidationError};
use crate::models::AttendanceRecord;

pub const HEADER: [&str; 4] = ["student_id", "student_name", "date", "status"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub written: usize,
    pub duplicates_removed: usize,
}

/// In-memory attendance table backed by a single CSV file.
///
/// Nothing is written until [`RecordStore::save`] is called.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    records: Vec<AttendanceRecord>,
    dirty: bool,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
            dirty: false,
        }
    }

    /// Creates a store and loads whatever the file currently holds.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, LoadReport), StorageError> {
        let mut store = Self::new(path);
        let report = store.load()?;
        Ok((store, report))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add_record(
        &mut self,
        student_id: &str,
        student_name: &str,
        date: &str,
        status: &str,
    ) -> Result<&AttendanceRecord, ValidationError> {
        let record = AttendanceRecord::parse(student_id, student_name, date, status)?;
        debug!(student_id = %record.student_id, date = %record.date, "record added");
        self.records.push(record);
        self.dirty = true;
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = AttendanceRecord>) -> usize {
        let before = self.records.len();
        self.records.extend(records);
        let added = self.records.len() - before;
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// Replaces the in-memory table with the file contents.
    ///
    /// A missing or empty file yields an empty table. Rows that fail
    /// validation are skipped and counted rather than aborting the load.
    pub fn load(&mut self) -> Result<LoadReport, StorageError> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no attendance file yet, starting empty");
                self.records.clear();
                self.dirty = false;
                return Ok(LoadReport { loaded: 0, skipped: 0 });
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let (records, skipped) = parse_csv(&self.path, &contents)?;
        let report = LoadReport {
            loaded: records.len(),
            skipped,
        };
        info!(path = %self.path.display(), loaded = report.loaded, skipped, "attendance loaded");

        self.records = records;
        self.dirty = false;
        Ok(report)
    }

    /// Deduplicates and rewrites the whole file.
    ///
    /// The table is written to a temp file in the same directory and renamed
    /// into place; the temp file is removed if any step fails.
    /// On error the in-memory records are left untouched.
    pub fn save(&mut self) -> Result<SaveReport, StorageError> {
        let cleaned = deduplicate(&self.records);
        write_csv(&self.path, &cleaned)?;

        let report = SaveReport {
            path: self.path.clone(),
            written: cleaned.len(),
            duplicates_removed: self.records.len() - cleaned.len(),
        };
        info!(
            path = %report.path.display(),
            written = report.written,
            duplicates_removed = report.duplicates_removed,
            "cleaned attendance saved"
        );

        self.records = cleaned;
        self.dirty = false;
        Ok(report)
    }
}

/// One record per `(student_id, date)`; the first occurrence wins and
/// relative order is preserved.
pub fn deduplicate(records: &[AttendanceRecord]) -> Vec<AttendanceRecord> {
    let mut seen: HashSet<(&str, NaiveDate)> = HashSet::new();
    records
        .iter()
        .filter(|&record| seen.insert(record.key()))
        .cloned()
        .collect()
}

#[derive(Deserialize)]
struct CsvRow {
    student_id: String,
    student_name: String,
    date: String,
    status: String,
}

#[derive(Serialize)]
struct CsvRecord<'a> {
    student_id: &'a str,
    student_name: &'a str,
    date: NaiveDate,
    status: char,
}

fn parse_csv(path: &Path, contents: &[u8]) -> Result<(Vec<AttendanceRecord>, usize), StorageError> {
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok((Vec::new(), 0));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents);

    let headers = reader
        .headers()
        .map_err(|source| StorageError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    for column in HEADER {
        if !headers.iter().any(|header| header == column) {
            return Err(StorageError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }
    let width = headers.len();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, result) in reader.records().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = match result {
            Ok(row) if row.len() != width => {
                warn!(line, fields = row.len(), expected = width, "skipping row with wrong field count");
                skipped += 1;
                continue;
            }
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };

        let parsed = row
            .deserialize::<CsvRow>(Some(&headers))
            .map_err(|err| err.to_string())
            .and_then(|row| {
                AttendanceRecord::parse(&row.student_id, &row.student_name, &row.date, &row.status)
                    .map_err(|err| err.to_string())
            });

        match parsed {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(line, %error, "skipping invalid row");
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

fn write_csv(path: &Path, records: &[AttendanceRecord]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| StorageError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut tmp);

    writer.write_record(HEADER).map_err(csv_err)?;
    for record in records {
        writer
            .serialize(CsvRecord {
                student_id: &record.student_id,
                student_name: &record.student_name,
                date: record.date,
                status: record.status.code(),
            })
            .map_err(csv_err)?;
    }
    writer.flush().map_err(write_err)?;
    drop(writer);

    tmp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
