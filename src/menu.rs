use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::models::DATE_FORMAT;
use crate::report::{self, ChartSink};
use crate::sample;
use crate::session::{Command, MenuChoice, NewRecord, Outcome, Session};

/// Interactive loop; returns once the user picks Exit.
pub fn run<S: ChartSink>(session: &mut Session<S>) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();
    if session.store().is_empty() {
        println!("No attendance records yet. Add a record or generate sample data.");
    }

    loop {
        println!();
        println!("Smart Attendance Analyzer");
        for choice in MenuChoice::ALL {
            println!("{}. {}", choice.key(), choice.label());
        }

        let input = Input::<String>::with_theme(&theme)
            .with_prompt("Choose")
            .allow_empty(true)
            .interact_text()?;
        let Some(choice) = MenuChoice::from_key(&input) else {
            println!("Invalid choice");
            continue;
        };

        let command = match choice {
            MenuChoice::AddRecord => Command::Add(prompt_record(&theme)?),
            MenuChoice::Analyze => Command::Analyze,
            MenuChoice::SaveCleaned => Command::SaveCleaned,
            MenuChoice::GenerateSample => {
                let confirmed = Confirm::with_theme(&theme)
                    .with_prompt("This will add sample rows to the loaded data. Continue?")
                    .default(false)
                    .interact()?;
                if !confirmed {
                    continue;
                }
                Command::GenerateSample {
                    start: sample::default_start(),
                }
            }
            MenuChoice::Exit => Command::Exit,
        };

        match session.dispatch(command) {
            Ok(Outcome::Exit { unsaved }) => {
                if unsaved && !save_before_exit(session, &theme)? {
                    continue;
                }
                println!("Bye");
                return Ok(());
            }
            Ok(outcome) => print_outcome(session, &outcome),
            Err(err) => println!("Error: {err}"),
        }
    }
}

fn prompt_record(theme: &ColorfulTheme) -> anyhow::Result<NewRecord> {
    let student_id = Input::<String>::with_theme(theme)
        .with_prompt("Student ID")
        .interact_text()?;
    let student_name = Input::<String>::with_theme(theme)
        .with_prompt("Student Name")
        .interact_text()?;
    let date = Input::<String>::with_theme(theme)
        .with_prompt(format!("Date ({DATE_FORMAT})"))
        .interact_text()?;
    let status = Input::<String>::with_theme(theme)
        .with_prompt("Status (P/A/L/H)")
        .interact_text()?;

    Ok(NewRecord {
        student_id,
        student_name,
        date,
        status,
    })
}

/// Returns `false` when the loop should continue instead of exiting.
fn save_before_exit<S: ChartSink>(
    session: &mut Session<S>,
    theme: &ColorfulTheme,
) -> anyhow::Result<bool> {
    let save = Confirm::with_theme(theme)
        .with_prompt("You have unsaved records. Save cleaned data before exiting?")
        .default(true)
        .interact()?;
    if !save {
        return Ok(true);
    }

    match session.dispatch(Command::SaveCleaned) {
        Ok(outcome) => {
            print_outcome(session, &outcome);
            Ok(true)
        }
        Err(err) => {
            println!("Error: {err}");
            Ok(false)
        }
    }
}

fn print_outcome<S: ChartSink>(session: &Session<S>, outcome: &Outcome) {
    match outcome {
        Outcome::Added(record) => println!(
            "Record added: {} {} on {} ({}).",
            record.student_id, record.student_name, record.date, record.status
        ),
        Outcome::Analyzed(analysis) => {
            let settings = session.settings();
            println!();
            print!(
                "{}",
                report::format_summary(analysis, settings.top_n, settings.options.threshold)
            );
            if analysis.charts.is_empty() {
                println!("No data to plot.");
            }
            for path in &analysis.charts {
                println!("Saved {}", path.display());
            }
        }
        Outcome::Saved(saved) => println!(
            "Cleaned data saved to {} ({} records, {} duplicates removed)",
            saved.path.display(),
            saved.written,
            saved.duplicates_removed
        ),
        Outcome::Generated(count) => {
            println!("Generated {count} sample rows. Choose 3 to save them.")
        }
        Outcome::Exit { .. } => {}
    }
}
