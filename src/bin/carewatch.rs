//! Carewatch CLI - Command-line interface for the Carewatch engine
//!
//! Commands:
//! - alerts: Generate prioritized alerts from monitoring records
//! - stats: Print the dashboard statistics tiles
//! - train: Train the three risk models and report accuracy
//! - predict: Train, then score every record
//! - validate: Report every malformed record without aborting
//! - doctor: Diagnose configuration and environment

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use carewatch::filter::{DashboardFilter, DeviceSelection};
use carewatch::insights::{high_risk, level_counts, mean_score, mean_score_by, LevelCounts};
use carewatch::normalizer::RowIssue;
use carewatch::types::RiskPrediction;
use carewatch::{
    CareConfig, CareError, LogNotifier, MemoryAlertStore, MonitoringSession, Normalizer,
    RawBatches, RecordParser, CAREWATCH_VERSION,
};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "CAREWATCH_LOG";

/// Carewatch - alerts and risk scores for elderly-care monitoring data
#[derive(Parser)]
#[command(name = "carewatch")]
#[command(version = CAREWATCH_VERSION)]
#[command(about = "Turn health, safety and reminder records into alerts and risk scores", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate prioritized alerts
    Alerts {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Send caregiver notifications for alerts that warrant one
        #[arg(long)]
        notify: bool,
    },

    /// Print dashboard statistics
    Stats {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Train the risk models and report their accuracy
    Train {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        forest: ForestArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Train the risk models, then score every record
    Predict {
        #[command(flatten)]
        inputs: InputArgs,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        forest: ForestArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Print level counts and mean scores instead of the scored rows
        #[arg(long)]
        insights: bool,
    },

    /// Validate records without aborting on the first bad row
    Validate {
        #[command(flatten)]
        inputs: InputArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Health monitoring records (use - for stdin)
    #[arg(long)]
    health: Option<PathBuf>,

    /// Safety monitoring records (use - for stdin)
    #[arg(long)]
    safety: Option<PathBuf>,

    /// Daily reminder records (use - for stdin)
    #[arg(long)]
    reminders: Option<PathBuf>,

    /// Input format
    #[arg(long, default_value = "json")]
    input_format: InputFormat,
}

#[derive(Args)]
struct FilterArgs {
    /// Device id, or "all"
    #[arg(long, default_value = "all")]
    device: String,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Args)]
struct ForestArgs {
    /// Trees per forest (overrides config)
    #[arg(long)]
    trees: Option<usize>,

    /// Random seed (overrides config)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Output format
    #[arg(long, default_value = "json-pretty")]
    output_format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let cli_error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&cli_error).unwrap_or_else(|_| cli_error.message.clone())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CarewatchCliError> {
    // doctor reports a bad config instead of failing on it
    let config = match (&cli.command, &cli.config) {
        (Commands::Doctor { .. }, _) | (_, None) => CareConfig::default(),
        (_, Some(path)) => CareConfig::load(path)?,
    };
    init_logging(&config);

    match cli.command {
        Commands::Alerts {
            inputs,
            filter,
            output,
            notify,
        } => cmd_alerts(&inputs, &filter, &output, notify, &config),

        Commands::Stats {
            inputs,
            filter,
            output,
        } => cmd_stats(&inputs, &filter, &output, &config),

        Commands::Train {
            inputs,
            forest,
            output,
        } => cmd_train(&inputs, &output, &forest.apply(config)),

        Commands::Predict {
            inputs,
            filter,
            forest,
            output,
            insights,
        } => cmd_predict(&inputs, &filter, &output, insights, &forest.apply(config)),

        Commands::Validate { inputs, json } => cmd_validate(&inputs, json),

        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), json),
    }
}

fn init_logging(config: &CareConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    // a second init (tests, embedding) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

impl ForestArgs {
    fn apply(&self, mut config: CareConfig) -> CareConfig {
        if let Some(trees) = self.trees {
            config.forest.n_trees = trees;
        }
        if let Some(seed) = self.seed {
            config.forest.seed = seed;
        }
        config
    }
}

impl FilterArgs {
    fn to_filter(&self) -> DashboardFilter {
        DashboardFilter {
            device: DeviceSelection::parse(&self.device),
            from: self.from,
            to: self.to,
        }
    }
}

fn cmd_alerts(
    inputs: &InputArgs,
    filter: &FilterArgs,
    output: &OutputArgs,
    notify: bool,
    config: &CareConfig,
) -> Result<(), CarewatchCliError> {
    let mut session = load_session(inputs, config)?;
    let mut store = MemoryAlertStore::new();
    let report = session.refresh(&mut store, Utc::now().naive_utc());

    if report.persistence_failures > 0 {
        tracing::warn!(failures = report.persistence_failures, "some alerts were not stored");
    }

    if notify {
        let mut notifier = LogNotifier::new();
        let sent = session.notify_pending(&mut notifier);
        tracing::info!(
            attempted = sent.attempted,
            delivered = sent.delivered,
            "caregiver notifications sent"
        );
    }

    let alerts = filter.to_filter().apply(session.alerts());
    write_output(&output.output, &format_rows(&alerts, output.output_format)?)
}

fn cmd_stats(
    inputs: &InputArgs,
    filter: &FilterArgs,
    output: &OutputArgs,
    config: &CareConfig,
) -> Result<(), CarewatchCliError> {
    let mut session = load_session(inputs, config)?;
    let mut store = MemoryAlertStore::new();
    session.refresh(&mut store, Utc::now().naive_utc());

    let summary = session.summary(&filter.to_filter());
    write_output(&output.output, &format_value(&summary, output.output_format)?)
}

fn cmd_train(
    inputs: &InputArgs,
    output: &OutputArgs,
    config: &CareConfig,
) -> Result<(), CarewatchCliError> {
    config.forest.validate()?;
    let mut session = load_session(inputs, config)?;
    let summary = session.train_models();
    write_output(&output.output, &format_value(&summary, output.output_format)?)
}

fn cmd_predict(
    inputs: &InputArgs,
    filter: &FilterArgs,
    output: &OutputArgs,
    insights: bool,
    config: &CareConfig,
) -> Result<(), CarewatchCliError> {
    config.forest.validate()?;
    let mut session = load_session(inputs, config)?;
    session.train_models();
    let tables = session.predict_all(&filter.to_filter());

    let rendered = if insights {
        let report = InsightsReport {
            health: TableInsights::new(&tables.health.rows, |row| {
                row.safety.as_ref().and_then(|s| s.movement_activity.clone())
            }),
            fall: TableInsights::new(&tables.fall.rows, |e| e.location.clone()),
            reminder: TableInsights::new(&tables.reminder.rows, |e| {
                Some(e.reminder_type.as_str().to_string())
            }),
        };
        format_value(&report, output.output_format)?
    } else {
        format_value(&tables, output.output_format)?
    };
    write_output(&output.output, &rendered)
}

fn cmd_validate(inputs: &InputArgs, json: bool) -> Result<(), CarewatchCliError> {
    let raw = read_batches(inputs)?;

    let mut total_records = 0;
    let mut issues: Vec<RowIssue> = Vec::new();
    if let Some(records) = &raw.health {
        total_records += records.len();
        issues.extend(Normalizer::validate_health(records));
    }
    if let Some(records) = &raw.safety {
        total_records += records.len();
        issues.extend(Normalizer::validate_safety(records));
    }
    if let Some(records) = &raw.reminders {
        total_records += records.len();
        issues.extend(Normalizer::validate_reminders(records));
    }

    let report = ValidationReport {
        total_records,
        valid_records: total_records - issues.len(),
        invalid_records: issues.len(),
        errors: issues,
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
            for issue in &report.errors {
                println!(
                    "  - {} record {} (device {}): {}",
                    issue.domain.as_str(),
                    issue.index,
                    issue.device_id.as_deref().unwrap_or("unknown"),
                    issue.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(CarewatchCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), CarewatchCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck {
        name: "carewatch_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Carewatch version {}", CAREWATCH_VERSION),
    }];

    let config = match config_path {
        Some(path) if !path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Config file {} does not exist", path.display()),
            });
            None
        }
        Some(path) => match CareConfig::load(path) {
            Ok(config) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid ({} trees, seed {}, test fraction {})",
                        config.forest.n_trees, config.forest.seed, config.forest.test_fraction
                    ),
                });
                Some(config)
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                });
                None
            }
        },
        None => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: "No config file given, using defaults".to_string(),
            });
            Some(CareConfig::default())
        }
    };

    if let Some(config) = config {
        let directive = std::env::var(LOG_ENV).unwrap_or(config.log_filter);
        let status = match EnvFilter::try_new(&directive) {
            Ok(_) => CheckStatus::Ok,
            Err(_) => CheckStatus::Warning,
        };
        checks.push(DoctorCheck {
            name: "log_filter".to_string(),
            status,
            message: format!("Log filter \"{}\"", directive),
        });
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass record files with --health/--safety/--reminders)"
                .to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (one input may be read from -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: CAREWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Carewatch Doctor Report");
        println!("=======================");
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(CarewatchCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn load_session(
    inputs: &InputArgs,
    config: &CareConfig,
) -> Result<MonitoringSession, CarewatchCliError> {
    let raw = read_batches(inputs)?;
    Ok(MonitoringSession::load(&raw, config)?)
}

fn read_batches(inputs: &InputArgs) -> Result<RawBatches, CarewatchCliError> {
    let stdin_inputs = [&inputs.health, &inputs.safety, &inputs.reminders]
        .into_iter()
        .flatten()
        .filter(|p| is_stdio(p))
        .count();
    if stdin_inputs > 1 {
        return Err(CarewatchCliError::Usage(
            "only one input can be read from stdin".to_string(),
        ));
    }

    let raw = RawBatches {
        health: read_records(inputs.health.as_deref(), inputs.input_format)?,
        safety: read_records(inputs.safety.as_deref(), inputs.input_format)?,
        reminders: read_records(inputs.reminders.as_deref(), inputs.input_format)?,
    };

    if raw.health.is_none() && raw.safety.is_none() && raw.reminders.is_none() {
        return Err(CarewatchCliError::NoInput);
    }
    Ok(raw)
}

fn read_records<T: serde::de::DeserializeOwned>(
    path: Option<&Path>,
    format: InputFormat,
) -> Result<Option<Vec<T>>, CarewatchCliError> {
    let Some(path) = path else {
        return Ok(None);
    };

    let data = if is_stdio(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path)?
    };

    let records = match format {
        InputFormat::Ndjson => RecordParser::parse_ndjson(&data)?,
        InputFormat::Json => RecordParser::parse_array(&data)?,
    };
    Ok(Some(records))
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn write_output(path: &Path, data: &str) -> Result<(), CarewatchCliError> {
    if is_stdio(path) {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn format_rows<T: Serialize>(rows: &[T], format: OutputFormat) -> Result<String, CarewatchCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(rows.len());
            for row in rows {
                lines.push(serde_json::to_string(row)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(rows)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(rows)? + "\n"),
    }
}

/// Single documents render on one line for ndjson
fn format_value<T: Serialize>(value: &T, format: OutputFormat) -> Result<String, CarewatchCliError> {
    match format {
        OutputFormat::Ndjson | OutputFormat::Json => Ok(serde_json::to_string(value)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(value)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum CarewatchCliError {
    Io(io::Error),
    Care(CareError),
    Json(serde_json::Error),
    Usage(String),
    NoInput,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for CarewatchCliError {
    fn from(e: io::Error) -> Self {
        CarewatchCliError::Io(e)
    }
}

impl From<CareError> for CarewatchCliError {
    fn from(e: CareError) -> Self {
        CarewatchCliError::Care(e)
    }
}

impl From<serde_json::Error> for CarewatchCliError {
    fn from(e: serde_json::Error) -> Self {
        CarewatchCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CarewatchCliError> for CliError {
    fn from(e: CarewatchCliError) -> Self {
        match e {
            CarewatchCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CarewatchCliError::Care(e) => {
                let (code, hint) = match &e {
                    CareError::MalformedField { .. } | CareError::MissingField(_) => (
                        "MALFORMED_RECORD",
                        "Run 'carewatch validate' to list every bad record",
                    ),
                    CareError::JsonError(_) | CareError::ParseError(_) => {
                        ("PARSE_ERROR", "Check --input-format and JSON syntax")
                    }
                    CareError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
                    CareError::ConfigError(_) => {
                        ("CONFIG_ERROR", "Run 'carewatch doctor --config <file>'")
                    }
                    CareError::NotFound(_) => ("NOT_FOUND", "Refresh alerts and retry"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            CarewatchCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            CarewatchCliError::Usage(msg) => CliError {
                code: "USAGE_ERROR".to_string(),
                message: msg,
                hint: Some("Pass the other inputs as file paths".to_string()),
            },
            CarewatchCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "No input records given".to_string(),
                hint: Some("Pass at least one of --health, --safety, --reminders".to_string()),
            },
            CarewatchCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            CarewatchCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<RowIssue>,
}

#[derive(Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(Serialize)]
struct InsightsReport {
    health: TableInsights,
    fall: TableInsights,
    reminder: TableInsights,
}

#[derive(Serialize)]
struct TableInsights {
    levels: LevelCounts,
    mean_score: Option<f64>,
    high_risk: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    mean_score_by: BTreeMap<String, f64>,
}

impl TableInsights {
    fn new<T>(rows: &[RiskPrediction<T>], key: impl Fn(&T) -> Option<String>) -> Self {
        Self {
            levels: level_counts(rows),
            mean_score: mean_score(rows),
            high_risk: high_risk(rows).len(),
            mean_score_by: mean_score_by(rows, key),
        }
    }
}
