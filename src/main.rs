use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod analysis;
mod config;
mod error;
mod menu;
mod models;
mod report;
mod sample;
mod session;
mod store;

use analysis::{AnalysisOptions, CountingPolicy, DEFAULTER_THRESHOLD};
use config::Settings;
use report::CsvChartSink;
use session::{Command, NewRecord, Outcome, Session};

#[derive(Parser)]
#[command(name = "attendance-analyzer")]
#[command(about = "Record and summarize student attendance kept in a CSV file", long_about = None)]
struct Cli {
    /// Directory holding attendance.csv and the chart data
    #[arg(long, env = "ATTENDANCE_DATA_DIR", default_value = config::DATA_DIR, global = true)]
    data_dir: PathBuf,
    /// Students below this percentage are defaulters
    #[arg(long, default_value_t = DEFAULTER_THRESHOLD, value_parser = config::parse_threshold, global = true)]
    threshold: f64,
    /// How many students the summary and chart list
    #[arg(long, default_value_t = config::TOP_N, global = true)]
    top: usize,
    /// Which records count toward a student's total days
    #[arg(long, value_enum, default_value_t = CountingPolicy::AllDays, global = true)]
    policy: CountingPolicy,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (the default)
    Menu,
    /// Validate and store one record, then save cleaned data
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date: String,
        /// P, A, L or H
        #[arg(long)]
        status: String,
    },
    /// Print the attendance summary and write chart data
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Deduplicate and rewrite the data file
    Clean,
    /// Append demo data for ten students and save it
    Sample {
        /// Seed for reproducible absences
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings {
        data_dir: cli.data_dir,
        options: AnalysisOptions {
            policy: cli.policy,
            threshold: cli.threshold,
        },
        top_n: cli.top,
    };
    let sink = CsvChartSink::new(&settings.data_dir);
    let data_file = settings.data_file();

    let (mut session, loaded) = Session::open(settings, sink)
        .with_context(|| format!("failed to load {}", data_file.display()))?;
    info!(
        records = session.store().len(),
        path = %session.store().path().display(),
        "session ready"
    );
    if loaded.skipped > 0 {
        println!(
            "Skipped {} invalid rows in {}.",
            loaded.skipped,
            data_file.display()
        );
    }

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => menu::run(&mut session)?,
        Commands::Add {
            id,
            name,
            date,
            status,
        } => {
            let input = NewRecord {
                student_id: id,
                student_name: name,
                date,
                status,
            };
            session
                .dispatch(Command::Add(input))
                .context("record rejected")?;
            save(&mut session)?;
        }
        Commands::Analyze { json } => {
            let Outcome::Analyzed(analysis) = session.dispatch(Command::Analyze)? else {
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                let settings = session.settings();
                print!(
                    "{}",
                    report::format_summary(&analysis, settings.top_n, settings.options.threshold)
                );
                for path in &analysis.charts {
                    println!("Saved {}", path.display());
                }
            }
        }
        Commands::Clean => save(&mut session)?,
        Commands::Sample { seed } => {
            if let Some(seed) = seed {
                session = session.with_seed(seed);
            }
            let start = sample::default_start();
            if let Outcome::Generated(count) =
                session.dispatch(Command::GenerateSample { start })?
            {
                println!("Generated {count} sample rows starting {start}.");
            }
            save(&mut session)?;
        }
    }

    Ok(())
}

fn save(session: &mut Session<CsvChartSink>) -> anyhow::Result<()> {
    if let Outcome::Saved(saved) = session
        .dispatch(Command::SaveCleaned)
        .context("failed to save cleaned data")?
    {
        println!(
            "Cleaned data saved to {} ({} records, {} duplicates removed).",
            saved.path.display(),
            saved.written,
            saved.duplicates_removed
        );
    }
    Ok(())
}
