// src/runner.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::{
    acquire::{DataAcquisition, Provenance},
    config::{AppOptions, DatasetKind, consts::*},
    core::HttpTransport,
    csv::rows_to_string,
    error::{AcquireError, RunError},
    process::{self, Summary},
    progress::{NullProgress, Progress},
    store::ensure_directory,
    table::CanonicalDataset,
};

/// What a run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub acquired: Vec<(DatasetKind, Provenance)>,
    pub files_written: Vec<PathBuf>,
    pub summary: Option<Summary>,
}

/// Acquisition over the real network, configured from `opts`.
pub fn http_acquisition(opts: &AppOptions) -> Result<DataAcquisition, RunError> {
    let transport = HttpTransport::new(&opts.http)?;
    Ok(DataAcquisition::new(opts, Arc::new(transport)))
}

/// Acquire (all kinds, or just `only`), process, write outputs.
/// `progress` can be None (no UI updates) or Some(&mut impl Progress).
pub fn run(
    acq: &DataAcquisition,
    opts: &AppOptions,
    only: Option<DatasetKind>,
    progress: Option<&mut dyn Progress>,
) -> Result<RunSummary, RunError> {
    let mut null = NullProgress;
    let progress: &mut dyn Progress = match progress {
        Some(p) => p,
        None => &mut null,
    };

    let kinds: Vec<DatasetKind> = match only {
        Some(k) => vec![k],
        None => DatasetKind::ALL.to_vec(),
    };
    progress.begin(kinds.len());

    let acquired = match acquire_with_retries(acq, opts, &kinds, &mut *progress) {
        Ok(a) => a,
        Err(e) => {
            progress.finish();
            return Err(e.into());
        }
    };

    let mut provenance = Vec::with_capacity(acquired.len());
    let mut vax: Option<CanonicalDataset> = None;
    let mut daily: Option<CanonicalDataset> = None;
    let mut regional: Option<CanonicalDataset> = None;
    for (kind, ds, from) in acquired {
        provenance.push((kind, from));
        match kind {
            DatasetKind::Vaccination => vax = Some(ds),
            DatasetKind::DailyStats  => daily = Some(ds),
            DatasetKind::Regional    => regional = Some(ds),
        }
    }

    // ---------- PROCESS + WRITE ----------
    let out_dir = &opts.store.out_dir;
    ensure_directory(out_dir).map_err(|source| RunError::Output { path: out_dir.clone(), source })?;
    let mut written = Vec::new();

    let vax_p = vax.as_ref().map(process::process_vaccination);
    if let Some(v) = &vax_p {
        written.push(write_table(out_dir, PROCESSED_VACCINATION_FILE, v)?);
    }
    if let Some(d) = &daily {
        let empty = CanonicalDataset::new(DatasetKind::Vaccination);
        let d = process::process_daily_stats(d, vax.as_ref().unwrap_or(&empty));
        written.push(write_table(out_dir, PROCESSED_DAILY_FILE, &d)?);
    }
    let regional_p = regional.as_ref().map(process::process_regional);
    if let Some(r) = &regional_p {
        written.push(write_table(out_dir, PROCESSED_REGIONAL_FILE, r)?);
    }

    let summary = match (&vax_p, &regional_p) {
        (Some(v), Some(r)) => process::summarize(v, r).map(|mut s| {
            s.sources = provenance.iter().map(|(k, p)| (s!(k.name()), p.describe())).collect();
            s
        }),
        _ => None,
    };
    if let Some(s) = &summary {
        let path = out_dir.join(SUMMARY_FILE);
        let json = serde_json::to_string_pretty(s)?;
        fs::write(&path, json).map_err(|source| RunError::Output { path: path.clone(), source })?;
        written.push(path);
    }

    progress.finish();
    info!(files = written.len(), out = %out_dir.display(), "run complete");
    Ok(RunSummary { acquired: provenance, files_written: written, summary })
}

/// Whole-sequence retries: any terminal failure re-runs the sequence after a
/// fixed delay. Kinds acquired by an earlier attempt are kept as they are and
/// not fetched again, even when the cache is bypassed.
fn acquire_with_retries(
    acq: &DataAcquisition,
    opts: &AppOptions,
    kinds: &[DatasetKind],
    progress: &mut dyn Progress,
) -> Result<Vec<(DatasetKind, CanonicalDataset, Provenance)>, AcquireError> {
    let attempts = opts.fetch.retries.max(1);
    let mut acquired = Vec::with_capacity(kinds.len());
    let mut attempt = 1;
    loop {
        match acquire_remaining(acq, opts, kinds, &mut acquired, &mut *progress) {
            Ok(()) => return Ok(acquired),
            Err(e) if attempt < attempts => {
                warn!(attempt, of = attempts, kept = acquired.len(), "acquisition failed: {e}");
                progress.log(&format!("Attempt {attempt}/{attempts} failed; retrying in {}s", opts.fetch.retry_delay.as_secs()));
                thread::sleep(opts.fetch.retry_delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Acquire the kinds after those already in `acquired`, in order. Stops at
/// the first failure, so `acquired` always holds a prefix of `kinds`.
fn acquire_remaining(
    acq: &DataAcquisition,
    opts: &AppOptions,
    kinds: &[DatasetKind],
    acquired: &mut Vec<(DatasetKind, CanonicalDataset, Provenance)>,
    progress: &mut dyn Progress,
) -> Result<(), AcquireError> {
    for &kind in kinds.iter().skip(acquired.len()) {
        let a = acq.acquire_detailed(kind, opts.fetch.use_cache, opts.fetch.cache_days)?;
        progress.item_done(kind, &a.provenance);
        acquired.push((kind, a.dataset, a.provenance));
    }
    Ok(())
}

fn write_table(dir: &Path, file: &str, ds: &CanonicalDataset) -> Result<PathBuf, RunError> {
    let path = dir.join(file);
    let text = rows_to_string(&ds.headers(), &ds.to_rows(), STORE_SEP);
    fs::write(&path, text).map_err(|source| RunError::Output { path: path.clone(), source })?;
    Ok(path)
}
