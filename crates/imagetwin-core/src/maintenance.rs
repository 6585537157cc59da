//! Batch (re)indexing and index hygiene.
//!
//! Fingerprint computation is CPU-bound and stateless, so files fan out
//! across a bounded rayon pool while all index writes stay on the calling
//! thread, one transaction per chunk. A per-file failure is recorded in the
//! batch report and never aborts the run. Cancellation is cooperative:
//! the flag is checked between chunks, and records already upserted are
//! kept; partial progress is an expected state, not an error.
//!
//! Reindexing always recomputes fingerprints; stored size/mtime metadata is
//! advisory and is not used to skip unchanged files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use image::GenericImageView;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

use crate::config::Config;
use crate::discovery;
use crate::error::{Error, Result};
use crate::hashing::HashComputer;
use crate::index::{system_time_to_unix, HashIndex, NewRecord};
use crate::types::{BatchReport, ImageFile};

/// Files fingerprinted per write transaction
const WRITE_CHUNK: usize = 64;

/// Fingerprint every supported image under the given directories and upsert
/// the results. Returns a report with the indexed count and every per-item
/// failure; only storage-level errors abort the run.
pub fn index_directories(
    index: &mut HashIndex,
    hasher: &HashComputer,
    directories: &[PathBuf],
    config: &Config,
    cancel: &AtomicBool,
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads())
        .build()
        .map_err(|e| Error::Configuration(format!("failed to build worker pool: {}", e)))?;

    'directories: for directory in directories {
        if !directory.exists() {
            warn!("skipping missing directory {}", directory.display());
            report.record_failure(
                directory.clone(),
                &Error::FileNotFound(directory.clone()),
            );
            continue;
        }

        let files = match discovery::discover_images_in_directory(directory, config) {
            Ok(files) => files,
            Err(e) => {
                warn!("cannot enumerate {}: {}", directory.display(), e);
                report.record_failure(directory.clone(), &e);
                continue;
            }
        };

        info!(
            "indexing {} images under {}",
            files.len(),
            directory.display()
        );

        let progress_bar = ProgressBar::new(files.len() as u64);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("##-"),
        );
        progress_bar.set_message("Computing fingerprints...");

        for chunk in files.chunks(WRITE_CHUNK) {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                progress_bar.abandon_with_message("cancelled");
                break;
            }

            let outcomes: Vec<std::result::Result<NewRecord, (PathBuf, Error)>> = pool
                .install(|| chunk.par_iter().map(|file| process_file(hasher, file)).collect());

            let mut records = Vec::with_capacity(outcomes.len());
            for outcome in outcomes {
                match outcome {
                    Ok(record) => records.push(record),
                    Err((path, error)) => {
                        warn!("failed to index {}: {}", path.display(), error);
                        report.record_failure(path, &error);
                    }
                }
            }

            // Single writer: one transaction per chunk
            index.upsert_batch(&records)?;
            report.indexed += records.len();
            progress_bar.inc(chunk.len() as u64);
        }

        if !report.cancelled {
            progress_bar.finish_with_message("done");
        }

        index.set_last_directory(&directory.to_string_lossy())?;

        if report.cancelled {
            break 'directories;
        }
    }

    info!(
        "batch complete: {} indexed, {} failed{}",
        report.indexed,
        report.failures.len(),
        if report.cancelled { ", cancelled" } else { "" }
    );
    Ok(report)
}

/// Decode, measure, and fingerprint one file
fn process_file(
    hasher: &HashComputer,
    file: &ImageFile,
) -> std::result::Result<NewRecord, (PathBuf, Error)> {
    let img = image::open(&file.path).map_err(|e| (file.path.clone(), Error::from(e)))?;
    let (width, height) = img.dimensions();
    let fingerprint = hasher.fingerprint(&img, false, false);

    Ok(NewRecord {
        path: file.path.to_string_lossy().into_owned(),
        fingerprint: fingerprint.to_hex(),
        file_size: file.size,
        modified_time: system_time_to_unix(file.last_modified),
        width,
        height,
    })
}

/// Delete index entries whose files no longer exist. Returns removed count.
pub fn prune(index: &mut HashIndex) -> Result<usize> {
    let removed = index.remove_missing(|path| Path::new(path).exists())?;
    info!("pruned {} stale index entries", removed);
    Ok(removed)
}

/// Wipe the whole index
pub fn reset(index: &mut HashIndex) -> Result<()> {
    index.clear()?;
    info!("index cleared");
    Ok(())
}

// -- Tests --
