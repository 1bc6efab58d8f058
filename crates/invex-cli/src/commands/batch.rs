//! Batch command - extract a folder of OCR text files into one export.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use invex_core::batch::{list_text_files, resolve_source_dir};
use invex_core::{BatchProcessor, CancelToken, EXPORT_HEADERS, InvoiceRecord, RecordAssembler};

use super::ConfigOverrides;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Folder with OCR text files, or the scan base folder holding scans/ocr_txt
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: wynik_<date>_<time> in the output directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for the default output file (default: the input folder)
    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,

    /// Export format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: ExportFormat,

    /// Number of parallel workers (0 = one per CPU)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Use the input folder as given, never descend into scans/ocr_txt
    #[arg(long)]
    no_resolve: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ExportFormat {
    /// Spreadsheet rows with the fixed bookkeeping columns
    Csv,
    /// Full records including provenance metadata
    Json,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

pub async fn run(args: BatchArgs, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = overrides.load()?;
    if let Some(jobs) = args.jobs {
        config.batch.jobs = jobs;
    }
    if args.no_resolve {
        config.batch.resolve_ocr_subdir = false;
    }

    let source_dir = resolve_source_dir(&args.input, config.batch.resolve_ocr_subdir)?;
    let total = list_text_files(&source_dir)?.len();
    println!(
        "{} Found {} text files in {}",
        style("ℹ").blue(),
        total,
        source_dir.display()
    );
    if config.escalation.enabled {
        info!("Escalation enabled ({})", config.escalation.model);
    }

    // Cancel between files on ctrl-c
    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{} Cancelling after the files in progress...", style("!").yellow());
                cancel.cancel();
            }
        })
    };

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let outcome = {
        let pb = pb.clone();
        let input = args.input.clone();
        // The escalation client blocks, so it is built and dropped off the runtime.
        tokio::task::spawn_blocking(move || {
            let assembler = RecordAssembler::from_config(&config)?;
            BatchProcessor::new(assembler, &config.batch).run_with_progress(&input, &cancel, |name| {
                pb.set_message(name.to_string());
                pb.inc(1);
            })
        })
        .await?
    };
    ctrl_c.abort();

    let outcome = match outcome {
        Ok(outcome) => {
            pb.finish_with_message("Complete");
            outcome
        }
        Err(e) => {
            pb.abandon();
            return Err(e.into());
        }
    };

    let output_path = match args.output {
        Some(path) => path,
        None => {
            let dir = args.output_dir.unwrap_or_else(|| args.input.clone());
            default_output_path(&dir, args.format)
        }
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match args.format {
        ExportFormat::Csv => write_csv(&output_path, &outcome.records)?,
        ExportFormat::Json => fs::write(&output_path, serde_json::to_string_pretty(&outcome.records)?)?,
    }
    debug!("Wrote export to {}", output_path.display());

    let incomplete: Vec<&InvoiceRecord> = outcome
        .records
        .iter()
        .filter(|r| !r.missing_fields().is_empty())
        .collect();

    println!();
    println!(
        "{} Wrote {} rows to {} in {:?}",
        style("✓").green(),
        outcome.records.len(),
        output_path.display(),
        start.elapsed()
    );
    println!(
        "   {} skipped, {} unreadable, {} escalated, {} incomplete",
        outcome.skipped,
        style(outcome.unreadable()).red(),
        outcome.escalated(),
        style(incomplete.len()).yellow()
    );

    for record in &incomplete {
        warn!(
            "{}: missing {}",
            record.source_filename,
            record.missing_fields().join(", ")
        );
    }

    Ok(())
}

fn default_output_path(dir: &Path, format: ExportFormat) -> PathBuf {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M");
    dir.join(format!("wynik_{}.{}", stamp, format.extension()))
}

fn write_csv(path: &Path, records: &[InvoiceRecord]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(EXPORT_HEADERS)?;
    for record in records {
        wtr.write_record(record.export_row())?;
    }

    wtr.flush()?;
    Ok(())
}
