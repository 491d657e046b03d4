//! pcap-parquet - Decoded capture files to typed Parquet tables
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use pcap_parquet::config::{discover_inputs, AppConfig, CliArgs, RunConfig};
use pcap_parquet::decoder::TsharkDecoder;
use pcap_parquet::dispatch::{Dispatcher, JobSettings, Pipeline};
use pcap_parquet::export::ExportConfig;
use pcap_parquet::progress::{print_header, print_summary, ProgressReporter};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    let app = AppConfig::load(&config.config_path).context("Failed to load configuration file")?;
    let schema = app
        .resolve_schema(&config.group)
        .with_context(|| format!("Cannot build schema from '{}'", config.config_path.display()))?;

    let files = discover_inputs(&config.input, &config.pattern).context("No input")?;

    // Command-line filter wins over the group's configured one
    let filter = config
        .filter
        .clone()
        .or_else(|| app.group_filter(&config.group).map(str::to_string));

    info!(
        group = %config.group,
        columns = schema.len(),
        files = files.len(),
        filter = filter.as_deref().unwrap_or(""),
        "Schema resolved"
    );

    let export = config.export_csv.then(|| ExportConfig {
        delimiter: config.delimiter,
        frame_labels: schema.frame_labels(),
        ..Default::default()
    });

    let settings = JobSettings {
        output_dir: config.output_dir.clone(),
        batch_size: config.batch_size,
        writer_options: config.writer_options(),
        filter,
        export,
    };

    let decoder = TsharkDecoder::new(app.decoder.clone());
    let dispatcher = Dispatcher::new(Pipeline::new(decoder, schema, settings), config.worker_count);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = dispatcher.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing running jobs...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let output_dir = config.output_dir.display().to_string();

    // Print header
    if config.show_progress {
        print_header(&config.group, files.len(), config.worker_count, &output_dir);
    }

    // Run the conversion
    let summary = if config.show_progress {
        let progress = ProgressReporter::new();
        progress.set_status("Starting decoders...");
        let reporter = progress.clone();
        let summary = dispatcher
            .run_with_progress(files, move |p| reporter.update(&p))
            .context("Conversion failed")?;
        if summary.interrupted {
            progress.finish("Conversion interrupted");
        } else {
            progress.finish("Conversion completed");
        }
        summary
    } else {
        dispatcher.run(files).context("Conversion failed")?
    };

    // Print summary
    if config.show_progress {
        print_summary(&summary, &output_dir);
    }

    // Per-job failures are reported, not fatal
    if summary.failed() > 0 {
        warn!(failed = summary.failed(), "Some jobs failed");
    }
    if summary.interrupted {
        info!(skipped = summary.skipped(), "Conversion was interrupted before completion");
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose {
        "pcap_parquet=debug,warn"
    } else {
        "pcap_parquet=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
