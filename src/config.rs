use std::path::PathBuf;

use crate::analysis::AnalysisOptions;

pub const DATA_DIR: &str = "data";
pub const DATA_FILE_NAME: &str = "attendance.csv";
pub const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub options: AnalysisOptions,
    pub top_n: usize,
}

impl Settings {
    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join(DATA_FILE_NAME)
    }
}

/// Clap parser for `--threshold`: a finite percentage in `0..=100`.
pub fn parse_threshold(value: &str) -> Result<f64, String> {
    let threshold: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(format!("{value} is not a percentage between 0 and 100"));
    }
    Ok(threshold)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            options: AnalysisOptions::default(),
            top_n: TOP_N,
        }
    }
}
