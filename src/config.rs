//! Configuration types for practice-migrate
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Destination URL parsing (Postgres vs the SQLite rehearsal backend)

use crate::error::ConfigError;
use crate::tables::Table;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Batch size limits. A batch binds one parameter per cell, so the upper
/// bound times the widest table (appointments, 14 columns) must stay under
/// the stricter backend limit: SQLite allows 32,766 bound parameters per
/// statement, Postgres 65,535.
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 2_000;

/// One-shot migration of a practice-management dataset
#[derive(Parser, Debug, Clone)]
#[command(
    name = "practice-migrate",
    version,
    about = "Migrate the legacy practice-management export to Postgres",
    long_about = "Moves appointment types, employees, payroll periods, clients, rates and \
                  appointments from a legacy SQLite export into a Postgres destination, via \
                  JSONL artifacts, with batch loading and post-load verification.",
    after_help = "EXAMPLES:\n    \
        practice-migrate extract --source legacy.db\n    \
        practice-migrate load --database-url postgresql://user@host/practice\n    \
        practice-migrate verify\n    \
        practice-migrate run --source legacy.db --expect Employee=42\n\n\
        The destination URL may also come from DATABASE_URL (a .env file is read)."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for the JSONL artifacts
    #[arg(long, global = true, default_value = "export", value_name = "DIR")]
    pub export_dir: PathBuf,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// Pipeline stages
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Extract the legacy export into JSONL artifacts
    Extract {
        #[command(flatten)]
        extract: ExtractOpts,
    },

    /// Clear the destination and load the artifacts in dependency order
    Load {
        #[command(flatten)]
        load: LoadOpts,
    },

    /// Check destination row counts and sweep for leftover sentinel dates
    Verify {
        #[command(flatten)]
        load: LoadOpts,
    },

    /// Run extract, load and verify in sequence
    Run {
        #[command(flatten)]
        extract: ExtractOpts,

        #[command(flatten)]
        load: LoadOpts,
    },
}

/// Options for the extraction stage
#[derive(Args, Debug, Clone)]
pub struct ExtractOpts {
    /// Legacy SQLite export file
    #[arg(long, default_value = "legacy.db", value_name = "FILE")]
    pub source: PathBuf,

    /// Expected row count for a legacy table (can be repeated)
    #[arg(long = "expect", value_name = "TABLE=COUNT", action = clap::ArgAction::Append)]
    pub expect: Vec<String>,

    /// What to do when an extracted count differs from --expect
    #[arg(long, value_enum, default_value_t = CountMismatchPolicy::Abort)]
    pub on_count_mismatch: CountMismatchPolicy,
}

/// Options for stages that touch the destination
#[derive(Args, Debug, Clone)]
pub struct LoadOpts {
    /// Destination connection string (falls back to DATABASE_URL)
    #[arg(long, value_name = "URL")]
    pub database_url: Option<String>,

    /// Rows per insert batch
    #[arg(short = 'b', long, default_value = "1000", value_name = "NUM")]
    pub batch_size: usize,
}

/// Behavior on an extraction row-count mismatch
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountMismatchPolicy {
    /// Abort the stage (default)
    Abort,
    /// Log a warning and continue (legacy behavior)
    Warn,
}

/// Which stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Load,
    Verify,
    Run,
}

/// Parsed destination URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestUrl {
    /// `postgresql://...` - the cloud destination
    Postgres(String),
    /// `sqlite://path` or a plain `.db` path - local rehearsal backend
    Sqlite(PathBuf),
}

impl DestUrl {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();

        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            return Ok(DestUrl::Postgres(url.to_string()));
        }

        if let Some(path) = url.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(ConfigError::InvalidDatabaseUrl {
                    url: url.to_string(),
                    reason: "empty path".into(),
                });
            }
            return Ok(DestUrl::Sqlite(PathBuf::from(path)));
        }

        if url.ends_with(".db") || url.ends_with(".sqlite") || url.ends_with(".sqlite3") {
            return Ok(DestUrl::Sqlite(PathBuf::from(url)));
        }

        Err(ConfigError::InvalidDatabaseUrl {
            url: url.to_string(),
            reason: "expected postgresql://..., sqlite://path, or a .db path".into(),
        })
    }

    /// Connection target for display (passwords are not echoed)
    pub fn display(&self) -> String {
        match self {
            DestUrl::Postgres(url) => match url.rsplit_once('@') {
                Some((_, tail)) => format!("postgresql://...@{tail}"),
                None => url.clone(),
            },
            DestUrl::Sqlite(path) => format!("sqlite://{}", path.display()),
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub stage: Stage,

    /// Legacy export path (extract and run stages)
    pub source: Option<PathBuf>,

    /// Artifact directory
    pub export_dir: PathBuf,

    /// Destination (load, verify and run stages)
    pub dest_url: Option<DestUrl>,

    /// Rows per insert batch
    pub batch_size: usize,

    /// Operator-supplied expected row counts per legacy table
    pub expected_counts: Vec<(Table, u64)>,

    pub on_count_mismatch: CountMismatchPolicy,

    /// Show progress bars and summaries
    pub show_progress: bool,

    pub verbose: bool,
}

impl MigrateConfig {
    /// Create and validate configuration from CLI arguments.
    ///
    /// The destination URL falls back to the DATABASE_URL environment
    /// variable (dotenv has already been applied by then).
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let stage = match &args.command {
            Command::Extract { .. } => Stage::Extract,
            Command::Load { .. } => Stage::Load,
            Command::Verify { .. } => Stage::Verify,
            Command::Run { .. } => Stage::Run,
        };

        let (extract, load) = match args.command {
            Command::Extract { extract } => (Some(extract), None),
            Command::Load { load } => (None, Some(load)),
            Command::Verify { load } => (None, Some(load)),
            Command::Run { extract, load } => (Some(extract), Some(load)),
        };

        let (source, expected_counts, on_count_mismatch) = match extract {
            Some(opts) => {
                if !opts.source.exists() {
                    return Err(ConfigError::SourceNotFound { path: opts.source });
                }
                let expected = opts
                    .expect
                    .iter()
                    .map(|raw| parse_expect(raw))
                    .collect::<Result<Vec<_>, _>>()?;
                (Some(opts.source), expected, opts.on_count_mismatch)
            }
            None => (None, Vec::new(), CountMismatchPolicy::Abort),
        };

        let (dest_url, batch_size) = match load {
            Some(opts) => {
                if opts.batch_size < MIN_BATCH_SIZE || opts.batch_size > MAX_BATCH_SIZE {
                    return Err(ConfigError::InvalidBatchSize {
                        size: opts.batch_size,
                        min: MIN_BATCH_SIZE,
                        max: MAX_BATCH_SIZE,
                    });
                }
                let raw = opts
                    .database_url
                    .or_else(|| std::env::var("DATABASE_URL").ok())
                    .ok_or(ConfigError::MissingDatabaseUrl)?;
                (Some(DestUrl::parse(&raw)?), opts.batch_size)
            }
            None => (None, 1000),
        };

        // The load stage reads artifacts; the directory must already exist
        if stage == Stage::Load && !args.export_dir.is_dir() {
            return Err(ConfigError::InvalidExportDir {
                path: args.export_dir,
                reason: "directory does not exist - run the extract stage first".into(),
            });
        }

        Ok(Self {
            stage,
            source,
            export_dir: args.export_dir,
            dest_url,
            batch_size,
            expected_counts,
            on_count_mismatch,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Parse one `--expect <legacy-table>=<count>` value
fn parse_expect(raw: &str) -> Result<(Table, u64), ConfigError> {
    let (name, count) = raw.split_once('=').ok_or_else(|| ConfigError::InvalidExpect {
        value: raw.to_string(),
    })?;

    let table = Table::from_legacy_name(name.trim()).ok_or_else(|| ConfigError::UnknownTable {
        table: name.trim().to_string(),
    })?;

    let count = count
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidExpect {
            value: raw.to_string(),
        })?;

    Ok((table, count))
}
