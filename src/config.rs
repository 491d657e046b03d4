//! Configuration types for pcap-parquet
//!
//! This module defines:
//! - The TOML configuration file (decoder, frame fields, field groups, filters)
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Capture file discovery

use crate::decoder::DecoderSettings;
use crate::error::{ConfigError, SchemaError};
use crate::schema::{FieldSpec, Schema};
use crate::table::{Codec, WriterOptions, DEFAULT_BATCH_SIZE};
use clap::{Parser, ValueEnum};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Batch size limits
const MIN_BATCH_SIZE: usize = 1;
const MAX_BATCH_SIZE: usize = 1_000_000;

/// Capture file names picked up from a directory by default
pub const DEFAULT_PATTERN: &str = r"(?i)\.pcapng?$";

/// Convert decoded capture files into Parquet tables
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pcap-parquet",
    version,
    about = "Convert decoded capture files into Parquet tables",
    long_about = "Runs the configured decoder (tshark) on each capture file, expands \
                  multi-occurrence fields into rows and writes one typed Parquet table \
                  per capture. Optionally exports each table as delimited text.",
    after_help = "EXAMPLES:\n    \
        pcap-parquet -f radar.pcap -g cat048\n    \
        pcap-parquet -d captures/ -g cat048 -j 8 --csv -o out/\n    \
        pcap-parquet -d captures/ -g cat062 --filter 'asterix.category==62' --compression zstd"
)]
pub struct CliArgs {
    /// Single capture file to convert
    #[arg(short = 'f', long = "file", value_name = "FILE", conflicts_with = "dir")]
    pub file: Option<PathBuf>,

    /// Directory of capture files to convert
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Field group from the configuration file
    #[arg(short = 'g', long = "group", value_name = "NAME")]
    pub group: String,

    /// Configuration file
    #[arg(long = "cfg", default_value = "config.toml", value_name = "FILE")]
    pub config: PathBuf,

    /// Number of parallel jobs
    #[arg(short = 'j', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Also write a delimited text export next to each table
    #[arg(long)]
    pub csv: bool,

    /// Output directory
    #[arg(short = 'o', long = "output-dir", default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Rows per Parquet row group
    #[arg(short = 'b', long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "NUM")]
    pub batch_size: usize,

    /// Field separator for the delimited export
    #[arg(long, default_value = ";", value_name = "CHAR")]
    pub delimiter: String,

    /// Display filter (overrides the group's configured filter)
    #[arg(long, value_name = "EXPR")]
    pub filter: Option<String>,

    /// File name pattern for directory input
    #[arg(long, default_value = DEFAULT_PATTERN, value_name = "REGEX")]
    pub pattern: String,

    /// Table compression codec
    #[arg(long, value_enum, default_value_t = Compression::Snappy)]
    pub compression: Compression,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// `--compression` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    #[value(name = "none")]
    Uncompressed,
}

impl From<Compression> for Codec {
    fn from(value: Compression) -> Self {
        match value {
            Compression::Snappy => Codec::Snappy,
            Compression::Zstd => Codec::Zstd,
            Compression::Uncompressed => Codec::Uncompressed,
        }
    }
}

fn default_workers() -> usize {
    // Each job is one decoder process plus one writer, CPU bound
    num_cpus::get()
}

/// Parsed configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Decoder executable and fixed parameters
    #[serde(alias = "tshark")]
    pub decoder: DecoderSettings,

    /// Fields prepended to every group
    #[serde(default)]
    pub frame: Vec<FieldSpec>,

    /// Named field groups
    #[serde(default)]
    pub datagroup: BTreeMap<String, Vec<FieldSpec>>,

    /// Per-group display filters
    #[serde(default)]
    pub filter: BTreeMap<String, String>,
}

impl AppConfig {
    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&text, path)
    }

    /// Parse configuration text; `path` is used in error messages
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        if config.decoder.path.trim().is_empty() {
            return Err(ConfigError::MissingDecoderPath);
        }
        Ok(config)
    }

    /// Build the run schema: frame fields followed by the group's fields
    pub fn resolve_schema(&self, group: &str) -> Result<Schema, SchemaError> {
        let fields = self.datagroup.get(group).ok_or_else(|| SchemaError::UnknownGroup {
            group: group.to_string(),
            available: self.group_names().join(", "),
        })?;

        if fields.is_empty() {
            return Err(SchemaError::EmptyGroup(group.to_string()));
        }

        Schema::new(self.frame.clone(), fields.clone())
    }

    /// Configured filter for a group, if any
    pub fn group_filter(&self, group: &str) -> Option<&str> {
        self.filter
            .get(group)
            .map(String::as_str)
            .filter(|f| !f.trim().is_empty())
    }

    /// Group names in sorted order
    pub fn group_names(&self) -> Vec<&str> {
        self.datagroup.keys().map(String::as_str).collect()
    }
}

/// Where capture files come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Dir(PathBuf),
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Capture file or directory
    pub input: InputSource,

    /// Selected field group
    pub group: String,

    /// Configuration file path
    pub config_path: PathBuf,

    /// Number of worker threads
    pub worker_count: usize,

    /// Rows per batch / row group
    pub batch_size: usize,

    /// Write a delimited export per table
    pub export_csv: bool,

    /// Field separator for the export
    pub delimiter: u8,

    /// Directory for tables and exports
    pub output_dir: PathBuf,

    /// Filter override from the command line
    pub filter: Option<String>,

    /// Compiled file name pattern for directory input
    pub pattern: Regex,

    /// Table compression codec
    pub codec: Codec,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let input = match (args.file, args.dir) {
            (Some(file), _) => InputSource::File(file),
            (None, Some(dir)) => InputSource::Dir(dir),
            (None, None) => return Err(ConfigError::NoInput),
        };

        // Validate worker count
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        // Validate batch size
        if args.batch_size < MIN_BATCH_SIZE || args.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize {
                size: args.batch_size,
                min: MIN_BATCH_SIZE,
                max: MAX_BATCH_SIZE,
            });
        }

        let delimiter = parse_delimiter(&args.delimiter)?;

        let pattern = Regex::new(&args.pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: args.pattern.clone(),
            reason: e.to_string(),
        })?;

        if !args.output_dir.is_dir() {
            return Err(ConfigError::InvalidOutputDir {
                path: args.output_dir.clone(),
                reason: "not an existing directory".to_string(),
            });
        }

        Ok(Self {
            input,
            group: args.group,
            config_path: args.config,
            worker_count: args.workers,
            batch_size: args.batch_size,
            export_csv: args.csv,
            delimiter,
            output_dir: args.output_dir,
            filter: args.filter.filter(|f| !f.trim().is_empty()),
            pattern,
            codec: args.compression.into(),
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Table writer settings for this run
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            codec: self.codec,
            max_row_group_size: WriterOptions::default().max_row_group_size.max(self.batch_size),
            ..Default::default()
        }
    }
}

/// `<dir>/<source stem>.<extension>`
pub fn output_path(dir: &Path, source: &Path, extension: &str) -> PathBuf {
    let mut name = source
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".");
    name.push(extension);
    dir.join(name)
}

fn parse_delimiter(text: &str) -> Result<u8, ConfigError> {
    match text {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }

    let bytes = text.as_bytes();
    if bytes.len() == 1 && bytes[0].is_ascii() && bytes[0] != b'\n' && bytes[0] != b'\r' {
        Ok(bytes[0])
    } else {
        Err(ConfigError::InvalidDelimiter(text.to_string()))
    }
}

/// List the capture files to convert.
///
/// A file input yields itself. A directory yields its regular files whose
/// name matches `pattern`, sorted by path; subdirectories are not entered.
pub fn discover_inputs(input: &InputSource, pattern: &Regex) -> Result<Vec<PathBuf>, ConfigError> {
    match input {
        InputSource::File(path) => {
            if path.is_file() {
                Ok(vec![path.clone()])
            } else {
                Err(ConfigError::InputNotFound(path.clone()))
            }
        }
        InputSource::Dir(dir) => {
            let entries = fs::read_dir(dir).map_err(|e| ConfigError::InputDir {
                path: dir.clone(),
                source: e,
            })?;

            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| ConfigError::InputDir {
                    path: dir.clone(),
                    source: e,
                })?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let name = entry.file_name();
                if pattern.is_match(&name.to_string_lossy()) {
                    files.push(path);
                }
            }

            if files.is_empty() {
                return Err(ConfigError::NoInputsFound {
                    dir: dir.clone(),
                    pattern: pattern.as_str().to_string(),
                });
            }

            files.sort();
            Ok(files)
        }
    }
}
