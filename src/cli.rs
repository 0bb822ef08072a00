// src/cli.rs
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

use crate::acquire::Provenance;
use crate::config::consts::{DEFAULT_CACHE_DAYS, DEFAULT_RETRIES, RETRY_DELAY_SECS};
use crate::config::{AppOptions, DatasetKind};
use crate::log::{self, LogOptions};
use crate::progress::Progress;
use crate::runner;
use crate::sources::chain_ids;

/// Fetch, reconcile and summarize South Korea COVID-19 vaccination data.
#[derive(Debug, Parser)]
#[command(name = "kovax", version, about)]
pub struct Args {
    /// Ignore cached snapshots and go to the sources
    #[arg(long)]
    pub refresh: bool,

    /// A cache younger than this many days is used as-is
    #[arg(long, value_name = "DAYS", default_value_t = DEFAULT_CACHE_DAYS)]
    pub cache_days: u32,

    /// Whole-run attempts before giving up
    #[arg(long, value_name = "N", default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, value_name = "SECS", default_value_t = RETRY_DELAY_SECS)]
    pub retry_delay: u64,

    /// Cache directory (also holds debug.log)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Output directory for processed tables and summary.json
    #[arg(short, long, value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Only this dataset: vaccination, daily_stats or regional
    #[arg(long, value_name = "KIND")]
    pub only: Option<DatasetKind>,

    /// Print the source chain for each dataset and exit
    #[arg(long)]
    pub list_sources: bool,

    /// Debug output on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn to_options(&self) -> AppOptions {
        let mut opts = AppOptions::default();
        opts.fetch.use_cache = !self.refresh;
        opts.fetch.cache_days = self.cache_days;
        opts.fetch.retries = self.retries;
        opts.fetch.retry_delay = Duration::from_secs(self.retry_delay);
        if let Some(dir) = &self.store {
            opts.store.dir = dir.clone();
        }
        if let Some(out) = &self.out {
            opts.store.out_dir = out.clone();
        }
        opts
    }
}

/// Prints one line per acquired dataset.
struct CliProgress;

impl Progress for CliProgress {
    fn log(&mut self, msg: &str) {
        eprintln!("{msg}");
    }

    fn item_done(&mut self, kind: DatasetKind, provenance: &Provenance) {
        let mark = if matches!(provenance, Provenance::StaleCache { .. }) { "!" } else { "✓" };
        println!("{mark} {:<12} {}", kind.label(), provenance.describe());
    }
}

pub fn run(args: Args) -> Result<()> {
    if args.list_sources {
        for kind in DatasetKind::ALL {
            println!("{}: {}", kind.name(), chain_ids(kind).join(", "));
        }
        return Ok(());
    }

    let opts = args.to_options();
    log::init(&LogOptions {
        level: s!(if args.verbose { "debug" } else { "info" }),
        file: Some(opts.store.debug_log_path()),
    })
    .wrap_err("setting up logging")?;

    let acq = runner::http_acquisition(&opts)?;
    let mut progress = CliProgress;
    let summary = runner::run(&acq, &opts, args.only, Some(&mut progress))?;

    for path in &summary.files_written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}
