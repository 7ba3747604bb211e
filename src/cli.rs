//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{Level, info};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_config_store::MemoryConfigStore;
use crate::domain::algorithm::{Algorithm, BreadthAlgorithm};
use crate::domain::config_manager::{self, ConfigManager};
use crate::domain::configuration::{AlgorithmKind, Configuration, default_configurations};
use crate::domain::engine::{BreadthEngine, SeriesOutcome};
use crate::domain::error::BreadthError;
use crate::domain::formula_eval::validate_with_dummy_context;
use crate::domain::result::BreadthResult;
use crate::domain::settings::{EngineSettings, StoreBackend};
use crate::ports::config_port::ConfigPort;
use crate::ports::config_store_port::ConfigStorePort;
use crate::ports::data_port::BreadthDataPort;

#[derive(Parser, Debug)]
#[command(name = "breadthscore", about = "Market breadth scoring engine")]
pub struct Cli {
    /// Engine settings file (INI)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Log at debug level regardless of settings
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score breadth records from a CSV file, one JSON result per line
    Score {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        algorithm: Option<AlgorithmKind>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Scoring configuration (JSON) used instead of the stored default
        #[arg(long)]
        scoring_config: Option<PathBuf>,
        /// History records per calculation
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check breadth records against an algorithm's field requirements
    Validate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        algorithm: Option<AlgorithmKind>,
    },
    /// Manage scoring configurations
    Configs {
        #[command(subcommand)]
        action: ConfigsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigsCommand {
    /// Seed a default configuration for every algorithm lacking one
    Init,
    /// List stored configurations
    List {
        #[arg(short, long)]
        algorithm: Option<AlgorithmKind>,
    },
    /// Print one configuration as JSON
    Show { version: String },
    /// Export configurations as a JSON array (all when no version is given)
    Export {
        versions: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import configurations from a JSON file
    Import { file: PathBuf },
    /// Copy a configuration under a new name
    Clone { version: String, name: String },
    /// Make a configuration the default for its algorithm
    SetDefault { version: String },
    /// Delete a non-default configuration
    Delete { version: String },
}

pub fn run(cli: Cli) -> ExitCode {
    let (port, settings) = match load_settings(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        settings.log_level
    };
    init_logging(level, settings.log_ansi);

    let outcome = match cli.command {
        Command::Validate { input, algorithm } => {
            run_validate(&input, algorithm.unwrap_or(settings.default_algorithm))
        }
        Command::Score {
            input,
            algorithm,
            start,
            end,
            scoring_config,
            lookback,
            output,
        } => {
            let request = ScoreRequest {
                input,
                kind: algorithm.unwrap_or(settings.default_algorithm),
                start,
                end,
                scoring_config,
                lookback: lookback.unwrap_or(settings.lookback_days),
                output,
            };
            build_engine(&port, &settings).and_then(|engine| run_score(&engine, &request))
        }
        Command::Configs { action } => build_engine(&port, &settings)
            .and_then(|engine| run_configs(engine.configs(), action)),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_logging(level: Level, ansi: bool) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(ansi)
        .with_writer(io::stderr)
        .try_init();
}

/// Read the settings file, or use defaults when none is given.
pub fn load_settings(
    path: Option<&Path>,
) -> Result<(FileConfigAdapter, EngineSettings), BreadthError> {
    let port = match path {
        Some(path) => FileConfigAdapter::from_file(path)?,
        None => FileConfigAdapter::empty(),
    };
    let settings = EngineSettings::from_config(&port)?;
    Ok((port, settings))
}

/// Engine over the configured store, seeded with the default configurations.
pub fn build_engine(
    port: &dyn ConfigPort,
    settings: &EngineSettings,
) -> Result<BreadthEngine, BreadthError> {
    let store: Box<dyn ConfigStorePort + Send + Sync> = match settings.store_backend {
        StoreBackend::Memory => Box::new(MemoryConfigStore::new()),
        StoreBackend::Sqlite => open_sqlite_store(port)?,
    };
    let manager = ConfigManager::new(store);
    let seeded = manager.initialize(default_configurations())?;
    info!(seeded, backend = ?settings.store_backend, "configuration store ready");
    Ok(BreadthEngine::new(manager))
}

#[cfg(feature = "sqlite")]
fn open_sqlite_store(
    port: &dyn ConfigPort,
) -> Result<Box<dyn ConfigStorePort + Send + Sync>, BreadthError> {
    let store = crate::adapters::sqlite_config_store::SqliteConfigStore::from_config(port)?;
    store.initialize_schema()?;
    Ok(Box::new(store))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite_store(
    _port: &dyn ConfigPort,
) -> Result<Box<dyn ConfigStorePort + Send + Sync>, BreadthError> {
    Err(BreadthError::SettingsInvalid {
        section: "store".into(),
        key: "backend".into(),
        reason: "built without sqlite support".into(),
    })
}

pub struct ScoreRequest {
    pub input: PathBuf,
    pub kind: AlgorithmKind,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub scoring_config: Option<PathBuf>,
    pub lookback: usize,
    pub output: Option<PathBuf>,
}

pub fn run_score(engine: &BreadthEngine, request: &ScoreRequest) -> Result<(), BreadthError> {
    let override_config = match &request.scoring_config {
        Some(path) => {
            let config = Configuration::from_json(&fs::read_to_string(path)?)?;
            report_formula_errors(std::slice::from_ref(&config));
            Some(config)
        }
        None => None,
    };

    let source = CsvAdapter::new(request.input.clone());
    let outcome = score_source(engine, &source, request, override_config.as_ref())?;

    for skipped in &outcome.skipped {
        let date = skipped
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "undated".to_string());
        eprintln!("warning: skipped {}: {}", date, skipped.reason);
    }

    if outcome.results.is_empty() && !outcome.skipped.is_empty() {
        return Err(BreadthError::Validation {
            errors: outcome.skipped.into_iter().map(|s| s.reason).collect(),
        });
    }

    match &request.output {
        Some(path) => {
            let mut file = fs::File::create(path)?;
            write_json_lines(&mut file, &outcome.results)?;
            eprintln!(
                "{} results written to {}",
                outcome.results.len(),
                path.display()
            );
        }
        None => write_json_lines(&mut io::stdout().lock(), &outcome.results)?,
    }
    Ok(())
}

fn score_source(
    engine: &BreadthEngine,
    source: &CsvAdapter,
    request: &ScoreRequest,
    override_config: Option<&Configuration>,
) -> Result<SeriesOutcome, BreadthError> {
    if request.start.is_none() && request.end.is_none() {
        let records = source.load_all()?;
        return engine.calculate_series(&records, request.kind, override_config, request.lookback);
    }

    let Some((first, last, _)) = source.get_data_range()? else {
        return Ok(SeriesOutcome::default());
    };
    engine.calculate_range(
        source,
        request.start.unwrap_or(first),
        request.end.unwrap_or(last),
        request.kind,
        override_config,
        request.lookback,
    )
}

/// The custom formula's dry-run error with a caret under the failing
/// position, or `None` when the formula is absent or valid.
pub fn formula_diagnostic(config: &Configuration) -> Option<String> {
    let formula = config.custom_formula.as_deref()?;
    let params = config.custom_parameters.keys().map(String::as_str);
    let err = validate_with_dummy_context(formula, params).err()?;
    Some(format!(
        "invalid custom formula in {}:\n{}",
        config.version,
        err.display_with_context(formula)
    ))
}

fn report_formula_errors(configs: &[Configuration]) {
    for diagnostic in configs.iter().filter_map(formula_diagnostic) {
        eprintln!("error: {diagnostic}");
    }
}

pub fn write_json_lines<W: Write>(out: &mut W, results: &[BreadthResult]) -> Result<(), BreadthError> {
    for result in results {
        serde_json::to_writer(&mut *out, result)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

pub fn run_validate(input: &Path, kind: AlgorithmKind) -> Result<(), BreadthError> {
    let records = CsvAdapter::new(input.to_path_buf()).load_all()?;
    let algorithm = Algorithm::for_kind(kind);
    eprintln!(
        "Validating {} records for {}",
        records.len(),
        algorithm.name()
    );

    let mut invalid = Vec::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for raw in &records {
        let validation = algorithm.validate(raw);
        if !validation.is_valid {
            let date = raw
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "undated".to_string());
            invalid.push(format!("{}: {}", date, validation.errors.join("; ")));
        }
        serde_json::to_writer(&mut out, &json!({ "date": raw.date, "validation": validation }))?;
        writeln!(out)?;
    }
    out.flush()?;

    if invalid.is_empty() {
        eprintln!("All records are valid.");
        Ok(())
    } else {
        Err(BreadthError::Validation { errors: invalid })
    }
}

pub fn run_configs(manager: &ConfigManager, action: ConfigsCommand) -> Result<(), BreadthError> {
    match action {
        ConfigsCommand::Init => {
            for kind in AlgorithmKind::ALL {
                let config = manager.get_default(kind)?;
                println!("{}\t{}", kind, config.version);
            }
        }
        ConfigsCommand::List { algorithm } => {
            for config in manager.list(algorithm)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    config.version,
                    config.algorithm,
                    if config.is_default { "default" } else { "-" },
                    config.name
                );
            }
        }
        ConfigsCommand::Show { version } => {
            println!("{}", manager.get(&version)?.to_json()?);
        }
        ConfigsCommand::Export { versions, output } => {
            let selected = if versions.is_empty() {
                None
            } else {
                Some(versions.as_slice())
            };
            let json = manager.export_json(selected)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        ConfigsCommand::Import { file } => {
            let json = fs::read_to_string(&file)?;
            let imported = manager.import_json(&json).inspect_err(|_| {
                if let Ok(configs) = config_manager::parse_import(&json) {
                    report_formula_errors(&configs);
                }
            })?;
            for config in imported {
                println!("{}\t{}\t{}", config.version, config.algorithm, config.name);
            }
        }
        ConfigsCommand::Clone { version, name } => {
            println!("{}", manager.clone_configuration(&version, &name)?.version);
        }
        ConfigsCommand::SetDefault { version } => {
            let config = manager.set_default(&version)?;
            eprintln!("{} is now the default for {}", config.version, config.algorithm);
        }
        ConfigsCommand::Delete { version } => {
            manager.delete(&version)?;
            eprintln!("Deleted {version}");
        }
    }
    Ok(())
}
