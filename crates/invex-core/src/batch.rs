//! Directory batch processing.
//!
//! Every file is processed independently on a rayon pool; results come
//! back in file-name order so exports are reproducible.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{InvexError, Result};
use crate::invoice::RecordAssembler;
use crate::models::{BatchConfig, InvoiceRecord, RecordStatus, SourceDocument};

/// Shared flag for aborting a batch.
///
/// Checked before each file starts and before each escalation call. A
/// request already in flight is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pick the folder holding the OCR text files.
///
/// Accepts the folder itself, a scan base folder containing
/// `scans/ocr_txt`, or a `scans` folder containing `ocr_txt`.
pub fn resolve_source_dir(dir: &Path, descend: bool) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(InvexError::MissingSourceDirectory(dir.to_path_buf()));
    }

    if descend {
        let nested = dir.join("scans").join("ocr_txt");
        if nested.is_dir() {
            return Ok(nested);
        }

        let is_scans = dir.file_name().is_some_and(|name| name == "scans");
        let direct = dir.join("ocr_txt");
        if is_scans && direct.is_dir() {
            return Ok(direct);
        }
    }

    Ok(dir.to_path_buf())
}

/// `*.txt` files in `dir`, sorted by file name.
pub fn list_text_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        })
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Read one text file; the error string explains why it is unreadable.
pub fn read_document(path: &Path) -> std::result::Result<SourceDocument, String> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| "file name is not valid UTF-8".to_string())?;

    let bytes = fs::read(path).map_err(|e| e.to_string())?;
    let text = String::from_utf8(bytes).map_err(|e| format!("text is not valid UTF-8: {}", e))?;

    Ok(SourceDocument::new(filename, text))
}

/// Summary of a finished batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Folder the files were read from.
    pub source_dir: PathBuf,
    /// Text files found.
    pub scanned: usize,
    /// Files whose name does not encode an invoice.
    pub skipped: usize,
    /// Records in file-name order.
    pub records: Vec<InvoiceRecord>,
}

impl BatchOutcome {
    pub fn unreadable(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.status, RecordStatus::Unreadable { .. }))
            .count()
    }

    pub fn escalated(&self) -> usize {
        self.records.iter().filter(|r| r.metadata.escalated).count()
    }
}

/// Runs the assembler over every text file in a folder.
pub struct BatchProcessor {
    assembler: RecordAssembler,
    jobs: usize,
    resolve_ocr_subdir: bool,
}

impl BatchProcessor {
    pub fn new(assembler: RecordAssembler, config: &BatchConfig) -> Self {
        Self {
            assembler,
            jobs: config.jobs,
            resolve_ocr_subdir: config.resolve_ocr_subdir,
        }
    }

    /// Process the folder without progress reporting.
    pub fn run(&self, dir: &Path, cancel: &CancelToken) -> Result<BatchOutcome> {
        self.run_with_progress(dir, cancel, |_| {})
    }

    /// Process the folder, calling `on_file` with each finished file name.
    pub fn run_with_progress<F>(&self, dir: &Path, cancel: &CancelToken, on_file: F) -> Result<BatchOutcome>
    where
        F: Fn(&str) + Sync,
    {
        let source_dir = resolve_source_dir(dir, self.resolve_ocr_subdir)?;
        let files = list_text_files(&source_dir)?;
        info!("Found {} text files in {}", files.len(), source_dir.display());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| InvexError::Config(format!("failed to build worker pool: {}", e)))?;

        let results: Vec<Result<Option<InvoiceRecord>>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    if cancel.is_cancelled() {
                        return Err(InvexError::Cancelled);
                    }
                    let result = self.process_file(path, cancel);
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        on_file(name);
                    }
                    result
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(InvexError::Cancelled);
        }

        let mut records = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for result in results {
            match result? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }

        if records.is_empty() {
            return Err(InvexError::NoRecordsProduced {
                dir: source_dir,
                scanned: files.len(),
            });
        }

        let outcome = BatchOutcome {
            source_dir,
            scanned: files.len(),
            skipped,
            records,
        };
        info!(
            "Batch done: {} records, {} skipped, {} unreadable, {} escalated",
            outcome.records.len(),
            outcome.skipped,
            outcome.unreadable(),
            outcome.escalated()
        );

        Ok(outcome)
    }

    fn process_file(&self, path: &Path, cancel: &CancelToken) -> Result<Option<InvoiceRecord>> {
        match read_document(path) {
            Ok(doc) => self.assembler.assemble(&doc, cancel),
            Err(reason) => {
                let filename = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                warn!("Cannot read {}: {}", path.display(), reason);
                let record = self.assembler.unreadable(&filename, &reason);
                if record.is_none() {
                    debug!("Skipping unreadable {}: no underscore in file name", filename);
                }
                Ok(record)
            }
        }
    }
}
