//! Process command - extract a single OCR text file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use invex_core::batch::read_document;
use invex_core::invoice::decode_filename;
use invex_core::{CancelToken, EXPORT_HEADERS, InvoiceRecord, RecordAssembler, RecordStatus};

use super::ConfigOverrides;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// OCR text file named INVOICENUMBER_REGISTRATION.txt
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = overrides.load()?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let filename = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    if decode_filename(&filename).is_none() {
        anyhow::bail!(
            "{} does not encode an invoice; file names must look like INVOICENUMBER_REGISTRATION.txt",
            filename
        );
    }

    info!("Processing file: {}", args.input.display());

    let input = args.input.clone();
    let record = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<InvoiceRecord>> {
        let assembler = RecordAssembler::from_config(&config)?;
        match read_document(&input) {
            Ok(doc) => Ok(assembler.assemble(&doc, &CancelToken::new())?),
            Err(reason) => Ok(assembler.unreadable(&filename, &reason)),
        }
    })
    .await??
    .ok_or_else(|| anyhow::anyhow!("No record produced for {}", args.input.display()))?;

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            wtr.write_record(EXPORT_HEADERS)?;
            wtr.write_record(record.export_row())?;
            Ok(String::from_utf8(wtr.into_inner()?)?)
        }
        OutputFormat::Text => Ok(format_record_text(record)),
    }
}

fn format_record_text(record: &InvoiceRecord) -> String {
    let currency = record.currency.as_deref().unwrap_or("");
    let or_dash = |s: String| if s.is_empty() { "-".to_string() } else { s };

    let mut output = String::new();

    output.push_str(&format!("Invoice: {}\n", record.invoice_number));
    output.push_str(&format!("Registration: {}\n", record.registration_number));
    output.push_str(&format!(
        "Date: {}\n",
        record.issue_date.as_deref().unwrap_or("-")
    ));
    output.push_str(&format!(
        "Seller: {}\n",
        record.seller_name.as_deref().unwrap_or("-")
    ));
    output.push('\n');

    output.push_str("Summary:\n");
    output.push_str(&format!("  Net:   {} {}\n", or_dash(record.net.to_string()), currency));
    output.push_str(&format!("  VAT:   {} {}\n", or_dash(record.vat.to_string()), currency));
    output.push_str(&format!("  Gross: {} {}\n", or_dash(record.gross.to_string()), currency));

    match &record.status {
        RecordStatus::Extracted => {}
        RecordStatus::Confirmation => output.push_str("\nConfirmation document\n"),
        RecordStatus::Unreadable { reason } => {
            output.push_str(&format!("\nUnreadable: {}\n", reason));
        }
    }

    let meta = &record.metadata;
    if let Some(source) = &meta.amount_source {
        output.push_str(&format!("\nAmounts from: {}\n", source));
    }
    if let Some(rule) = &meta.rule {
        output.push_str(&format!("Supplier rule: {}\n", rule));
    }
    if meta.escalated {
        output.push_str("Escalated: yes\n");
    }
    for warning in &meta.warnings {
        output.push_str(&format!("Warning: {}\n", warning));
    }

    output
}
