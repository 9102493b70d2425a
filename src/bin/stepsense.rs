//! Stepsense CLI - Command-line interface for Stepsense
//!
//! Commands:
//! - annotate: Annotate a telemetry capture with step classifications (batch mode)
//! - run: Annotate streaming telemetry from stdin (streaming mode)
//! - validate: Check that a capture decodes cleanly

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use stepsense::detector::DetectorConfig;
use stepsense::pipeline::TelemetryAnnotator;
use stepsense::telemetry::RecordFormat;
use stepsense::{ClassifyError, STEPSENSE_VERSION};

/// Stepsense - On-device step classification engine for 6-axis inertial telemetry
#[derive(Parser)]
#[command(name = "stepsense")]
#[command(author = "Synheart AI Inc")]
#[command(version = STEPSENSE_VERSION)]
#[command(about = "Classify steps in inertial telemetry captures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate a telemetry capture with step classifications (batch mode)
    Annotate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Header rows before the first record
        #[arg(long, default_value = "2")]
        header_rows: usize,

        /// Metadata fields ahead of the six sensor fields
        #[arg(long, default_value = "4")]
        leading_fields: usize,

        /// Records of history retained per channel
        #[arg(long, default_value = "300")]
        history_len: usize,

        /// Vertical-accel jump that opens a peak window (m/s^2)
        #[arg(long, default_value = "3.0")]
        onset_delta: f64,

        /// Records a peak window may accumulate before force-closing
        #[arg(long, default_value = "30")]
        max_peak_records: usize,

        /// Vertical-accel amplitude below which a window is not a step
        #[arg(long, default_value = "5.0")]
        walk_floor: f64,

        /// Vertical-accel amplitude at which run/hop territory starts
        #[arg(long, default_value = "14.0")]
        run_floor: f64,

        /// Yaw-rate amplitude above which a run becomes a hop
        /// (defaults to the built-in floor)
        #[arg(long)]
        hop_gz_floor: Option<f64>,

        /// Abort on the first record that fails to decode
        #[arg(long)]
        strict: bool,

        /// Classify a peak window still open at end of input
        #[arg(long)]
        finalize: bool,

        /// Print a run summary as JSON to stderr
        #[arg(long)]
        summary: bool,
    },

    /// Annotate streaming telemetry from stdin (streaming mode)
    Run {
        /// Header rows before the first record
        #[arg(long, default_value = "2")]
        header_rows: usize,

        /// Metadata fields ahead of the six sensor fields
        #[arg(long, default_value = "4")]
        leading_fields: usize,

        /// Records of history retained per channel
        #[arg(long, default_value = "300")]
        history_len: usize,

        /// Vertical-accel jump that opens a peak window (m/s^2)
        #[arg(long, default_value = "3.0")]
        onset_delta: f64,

        /// Records a peak window may accumulate before force-closing
        #[arg(long, default_value = "30")]
        max_peak_records: usize,

        /// Vertical-accel amplitude below which a window is not a step
        #[arg(long, default_value = "5.0")]
        walk_floor: f64,

        /// Vertical-accel amplitude at which run/hop territory starts
        #[arg(long, default_value = "14.0")]
        run_floor: f64,

        /// Yaw-rate amplitude above which a run becomes a hop
        /// (defaults to the built-in floor)
        #[arg(long)]
        hop_gz_floor: Option<f64>,

        /// Abort on the first record that fails to decode
        #[arg(long)]
        strict: bool,

        /// Classify a peak window still open at end of input
        #[arg(long)]
        finalize: bool,

        /// Print a run summary as JSON to stderr on exit
        #[arg(long)]
        summary: bool,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Check that a capture decodes cleanly
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Header rows before the first record
        #[arg(long, default_value = "2")]
        header_rows: usize,

        /// Metadata fields ahead of the six sensor fields
        #[arg(long, default_value = "4")]
        leading_fields: usize,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StepCliError> {
    match cli.command {
        Commands::Annotate {
            input,
            output,
            header_rows,
            leading_fields,
            history_len,
            onset_delta,
            max_peak_records,
            walk_floor,
            run_floor,
            hop_gz_floor,
            strict,
            finalize,
            summary,
        } => {
            let format = RecordFormat {
                header_rows,
                leading_fields,
            };
            let config = build_config(
                history_len,
                onset_delta,
                max_peak_records,
                walk_floor,
                run_floor,
                hop_gz_floor,
            );
            cmd_annotate(&input, &output, format, config, strict, finalize, summary)
        }

        Commands::Run {
            header_rows,
            leading_fields,
            history_len,
            onset_delta,
            max_peak_records,
            walk_floor,
            run_floor,
            hop_gz_floor,
            strict,
            finalize,
            summary,
            flush,
        } => {
            let format = RecordFormat {
                header_rows,
                leading_fields,
            };
            let config = build_config(
                history_len,
                onset_delta,
                max_peak_records,
                walk_floor,
                run_floor,
                hop_gz_floor,
            );
            cmd_run(format, config, strict, finalize, summary, flush)
        }

        Commands::Validate {
            input,
            header_rows,
            leading_fields,
            json,
        } => {
            let format = RecordFormat {
                header_rows,
                leading_fields,
            };
            cmd_validate(&input, format, json)
        }
    }
}

fn build_config(
    history_len: usize,
    onset_delta: f64,
    max_peak_records: usize,
    walk_floor: f64,
    run_floor: f64,
    hop_gz_floor: Option<f64>,
) -> DetectorConfig {
    let mut config = DetectorConfig {
        history_len,
        onset_delta,
        max_peak_records,
        walk_ay_floor: walk_floor,
        run_ay_floor: run_floor,
        ..DetectorConfig::default()
    };
    if let Some(floor) = hop_gz_floor {
        config.hop_gz_floor = floor;
    }
    config
}

fn cmd_annotate(
    input: &PathBuf,
    output: &PathBuf,
    format: RecordFormat,
    config: DetectorConfig,
    strict: bool,
    finalize: bool,
    summary: bool,
) -> Result<(), StepCliError> {
    let input_data = read_input(input)?;
    let mut annotator = TelemetryAnnotator::with_options(format, config)?;

    let mut lines_out: Vec<String> = Vec::new();
    for (line_no, line) in input_data.lines().enumerate() {
        match annotator.process_line(line) {
            Ok(Some(outcome)) => lines_out.push(outcome.text().to_string()),
            Ok(None) => {}
            Err(e) if strict => {
                return Err(StepCliError::InvalidRecord {
                    line: line_no + 1,
                    message: e.to_string(),
                })
            }
            Err(_) => lines_out.push(annotator.mark_invalid(line)),
        }
    }

    if finalize {
        annotator.finalize()?;
    }

    let mut output_data = lines_out.join("\n");
    if !output_data.is_empty() {
        output_data.push('\n');
    }

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&annotator.summary())?);
    }

    Ok(())
}

fn cmd_run(
    format: RecordFormat,
    config: DetectorConfig,
    strict: bool,
    finalize: bool,
    summary: bool,
    flush: bool,
) -> Result<(), StepCliError> {
    if atty::is(atty::Stream::Stdin) {
        eprintln!("stepsense: reading telemetry from a terminal; pipe a capture or press Ctrl-D to finish");
    }

    let mut annotator = TelemetryAnnotator::with_options(format, config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_no, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let out = match annotator.process_line(&line) {
            Ok(Some(outcome)) => outcome.text().to_string(),
            Ok(None) => continue,
            Err(e) if strict => {
                return Err(StepCliError::InvalidRecord {
                    line: line_no + 1,
                    message: e.to_string(),
                })
            }
            Err(_) => annotator.mark_invalid(&line),
        };
        writeln!(stdout, "{}", out)?;
        if flush {
            stdout.flush()?;
        }
    }

    if finalize {
        annotator.finalize()?;
    }
    stdout.flush()?;

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&annotator.summary())?);
    }

    Ok(())
}

fn cmd_validate(input: &PathBuf, format: RecordFormat, json: bool) -> Result<(), StepCliError> {
    let input_data = read_input(input)?;

    let mut total_records = 0usize;
    let mut errors: Vec<ValidationErrorDetail> = Vec::new();

    for (line_no, line) in input_data.lines().enumerate() {
        if line_no < format.header_rows {
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        total_records += 1;
        if let Err(e) = format.parse_record(line) {
            errors.push(ValidationErrorDetail {
                line: line_no + 1,
                error: e.to_string(),
            });
        }
    }

    let report = ValidationReport {
        total_records,
        valid_records: total_records - errors.len(),
        invalid_records: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(StepCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &PathBuf) -> Result<String, StepCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

// Error types

#[derive(Debug)]
enum StepCliError {
    Io(io::Error),
    Classify(ClassifyError),
    Json(serde_json::Error),
    InvalidRecord { line: usize, message: String },
    ValidationFailed(usize),
}

impl From<io::Error> for StepCliError {
    fn from(e: io::Error) -> Self {
        StepCliError::Io(e)
    }
}

impl From<ClassifyError> for StepCliError {
    fn from(e: ClassifyError) -> Self {
        StepCliError::Classify(e)
    }
}

impl From<serde_json::Error> for StepCliError {
    fn from(e: serde_json::Error) -> Self {
        StepCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StepCliError> for CliError {
    fn from(e: StepCliError) -> Self {
        match e {
            StepCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StepCliError::Classify(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the detector tuning flags".to_string()),
            },
            StepCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StepCliError::InvalidRecord { line, message } => CliError {
                code: "INVALID_RECORD".to_string(),
                message: format!("Line {}: {}", line, message),
                hint: Some("Re-run without --strict to mark bad records instead".to_string()),
            },
            StepCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}
