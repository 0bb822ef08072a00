// src/acquire.rs
//
// Cache + source chain + normalizer for one dataset kind at a time.
//
//   CheckCache ──fresh──────────────────────────────▶ Done(FreshCache)
//       │ stale / absent / bypassed
//       ▼
//   TrySources ──ok: normalize, persist─────────────▶ Done(Source)
//       │ all sources failed
//       ▼
//   UseStale ──any cache─────────────────────────────▶ Done(StaleCache)
//       │ none
//       ▼
//     Fail ──▶ AcquisitionFailed { kind, log }

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::chain::SourceChain;
use crate::config::{AppOptions, DatasetKind, FetchOptions};
use crate::core::Transport;
use crate::error::{AcquireError, AttemptLog, StoreError};
use crate::store::CacheStore;
use crate::table::CanonicalDataset;

/// Where a dataset came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provenance {
    FreshCache { age: Duration },
    Source { id: String },
    StaleCache { age: Duration },
}

impl Provenance {
    pub fn describe(&self) -> String {
        match self {
            Self::FreshCache { age } => format!("cache ({})", fmt_age(*age)),
            Self::Source { id } => format!("source {id}"),
            Self::StaleCache { age } => format!("STALE cache ({})", fmt_age(*age)),
        }
    }
}

fn fmt_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..=59 => format!("{secs}s old"),
        60..=3599 => format!("{}m old", secs / 60),
        3600..=86_399 => format!("{}h old", secs / 3600),
        _ => format!("{}d old", secs / 86_400),
    }
}

#[derive(Clone, Debug)]
pub struct Acquisition {
    pub dataset: CanonicalDataset,
    pub provenance: Provenance,
    /// Sources that failed on the way (empty for a fresh-cache hit).
    pub attempts: AttemptLog,
}

enum Step {
    CheckCache,
    TrySources,
    UseStale(AttemptLog),
    Done(Acquisition),
    Fail(AttemptLog),
}

pub struct DataAcquisition {
    store: CacheStore,
    chains: BTreeMap<DatasetKind, SourceChain>,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl DataAcquisition {
    /// Default chains for every kind over one shared transport.
    pub fn new(opts: &AppOptions, transport: Arc<dyn Transport>) -> Self {
        let chains = DatasetKind::ALL
            .into_iter()
            .map(|k| SourceChain::default_for(k, opts, Arc::clone(&transport)))
            .collect();
        Self::with_chains(CacheStore::new(&opts.store.dir), chains)
    }

    /// Explicit chains; a kind without one has nothing to try.
    pub fn with_chains(store: CacheStore, chains: Vec<SourceChain>) -> Self {
        let chains = chains.into_iter().map(|c| (c.kind(), c)).collect();
        Self { store, chains, today: local_today }
    }

    /// Override the processing date used for sentinel-dated rows.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn store(&self) -> &CacheStore { &self.store }

    pub fn chain(&self, kind: DatasetKind) -> Option<&SourceChain> {
        self.chains.get(&kind)
    }

    pub fn acquire(&self, kind: DatasetKind, use_cache: bool, cache_days: u32) -> Result<CanonicalDataset, AcquireError> {
        self.acquire_detailed(kind, use_cache, cache_days).map(|a| a.dataset)
    }

    pub fn acquire_detailed(&self, kind: DatasetKind, use_cache: bool, cache_days: u32) -> Result<Acquisition, AcquireError> {
        let max_age = FetchOptions { cache_days, ..FetchOptions::default() }.max_age();
        let mut step = Step::CheckCache;

        loop {
            step = match step {
                Step::CheckCache => self.check_cache(kind, use_cache, max_age),
                Step::TrySources => self.try_sources(kind),
                Step::UseStale(log) => self.use_stale(kind, log),
                Step::Done(acq) => {
                    info!(kind = kind.name(), rows = acq.dataset.len(), from = %acq.provenance.describe(), "acquired");
                    return Ok(acq);
                }
                Step::Fail(log) => return Err(AcquireError::AcquisitionFailed { kind, log }),
            };
        }
    }

    fn check_cache(&self, kind: DatasetKind, use_cache: bool, max_age: Duration) -> Step {
        if !use_cache {
            debug!(kind = kind.name(), "cache bypassed");
            return Step::TrySources;
        }
        let age = match self.store.age(kind) {
            Ok(age) => age,
            Err(StoreError::NotFound(_)) => return Step::TrySources,
            Err(e) => {
                warn!(kind = kind.name(), "cache unreadable: {e}");
                return Step::TrySources;
            }
        };
        if age >= max_age {
            debug!(kind = kind.name(), age_secs = age.as_secs(), "cache too old");
            return Step::TrySources;
        }
        match self.store.read(kind) {
            Ok(dataset) => Step::Done(Acquisition {
                dataset,
                provenance: Provenance::FreshCache { age },
                attempts: AttemptLog::new(),
            }),
            Err(e) => {
                warn!(kind = kind.name(), "ignoring cache: {e}");
                Step::TrySources
            }
        }
    }

    fn try_sources(&self, kind: DatasetKind) -> Step {
        let Some(chain) = self.chains.get(&kind) else {
            warn!(kind = kind.name(), "no sources configured");
            return Step::UseStale(AttemptLog::new());
        };
        debug!(kind = kind.name(), sources = chain.len(), "trying sources");
        match chain.resolve((self.today)()) {
            Ok(resolved) => {
                let id = s!(resolved.source_id());
                let dataset = resolved.dataset;
                if let Err(e) = self.store.write(kind, &dataset) {
                    warn!(kind = kind.name(), "could not update cache: {e}");
                }
                Step::Done(Acquisition {
                    dataset,
                    provenance: Provenance::Source { id },
                    attempts: resolved.log,
                })
            }
            Err(failed) => {
                warn!(kind = kind.name(), "{failed}");
                Step::UseStale(failed.log)
            }
        }
    }

    fn use_stale(&self, kind: DatasetKind, log: AttemptLog) -> Step {
        let age = self.store.age(kind).unwrap_or_default();
        match self.store.read(kind) {
            Ok(dataset) => {
                warn!(
                    kind = kind.name(),
                    age_secs = age.as_secs(),
                    "all sources failed; using stale cache ({})",
                    fmt_age(age)
                );
                Step::Done(Acquisition { dataset, provenance: Provenance::StaleCache { age }, attempts: log })
            }
            Err(StoreError::NotFound(_)) => Step::Fail(log),
            Err(e) => {
                warn!(kind = kind.name(), "stale cache unusable: {e}");
                Step::Fail(log)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;
    use crate::error::FailureKind;

    fn acq(dir: &std::path::Path, t: FixtureTransport) -> DataAcquisition {
        let mut opts = AppOptions::default();
        opts.store.dir = dir.to_path_buf();
        DataAcquisition::new(&opts, Arc::new(t))
    }

    #[test]
    fn nothing_anywhere_fails_with_full_log() {
        let dir = tempfile::tempdir().unwrap();
        let a = acq(dir.path(), FixtureTransport::new());
        let err = a.acquire(DatasetKind::Regional, true, 1).unwrap_err();
        let ids: Vec<&str> = err.log().entries().iter().map(|e| e.source.as_str()).collect();
        assert_eq!(ids, vec!["kdca_api", "kdca_dashboard", "community"]);
        assert!(err.log().entries().iter().all(|e| e.kind == FailureKind::Transport));
        assert!(err.to_string().contains("  - kdca_dashboard: TransportError: "));
    }

    #[test]
    fn fetched_data_is_cached_then_served_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let ep = crate::config::SourceEndpoints::default();
        let t = FixtureTransport::new().with_body(&ep.who_daily, "\
Date_reported,Country,New_cases,New_deaths
2022-01-01,Republic of Korea,4400,20
");
        let a = acq(dir.path(), t);
        let first = a.acquire_detailed(DatasetKind::DailyStats, true, 1).unwrap();
        assert_eq!(first.provenance, Provenance::Source { id: s!("who_csv") });
        assert_eq!(first.attempts.len(), 4);
        assert!(a.store().exists(DatasetKind::DailyStats));

        let second = a.acquire_detailed(DatasetKind::DailyStats, true, 1).unwrap();
        assert!(matches!(second.provenance, Provenance::FreshCache { .. }));
        assert_eq!(second.dataset.headers(), first.dataset.headers());
    }

    #[test]
    fn zero_cache_days_is_never_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let a = acq(dir.path(), FixtureTransport::new());
        let mut ds = CanonicalDataset::new(DatasetKind::Regional);
        ds.set("region", crate::table::Values::Text(strings!["Seoul"]));
        a.store().write(DatasetKind::Regional, &ds).unwrap();

        let got = a.acquire_detailed(DatasetKind::Regional, true, 0).unwrap();
        assert!(matches!(got.provenance, Provenance::StaleCache { .. }));
        assert_eq!(got.attempts.len(), 3);
    }

    #[test]
    fn default_chains_for_every_kind() {
        let dir = tempfile::tempdir().unwrap();
        let a = acq(dir.path(), FixtureTransport::new());
        for kind in DatasetKind::ALL {
            let chain = a.chain(kind).unwrap();
            assert_eq!(chain.ids(), crate::sources::chain_ids(kind));
        }
    }

    #[test]
    fn ages_read_like_people_say_them() {
        assert_eq!(fmt_age(Duration::from_secs(30)), "30s old");
        assert_eq!(fmt_age(Duration::from_secs(7200)), "2h old");
        assert_eq!(fmt_age(Duration::from_secs(10 * 86_400)), "10d old");
    }
}
