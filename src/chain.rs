// src/chain.rs
//
// Ordered fallback over the adapters for one dataset kind. First adapter whose
// table still has rows after normalization wins; everything before it is
// recorded in the attempt log with its failure category.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::{AppOptions, DatasetKind};
use crate::core::Transport;
use crate::error::{AllSourcesFailed, AttemptLog, FailureKind};
use crate::sources::{SourceAdapter, default_chain};
use crate::table::CanonicalDataset;

pub struct SourceChain {
    kind: DatasetKind,
    adapters: Vec<Box<dyn SourceAdapter>>,
}

/// A successful resolution: the winning adapter, its normalized table, and
/// whatever failed before it.
pub struct Resolved<'a> {
    pub adapter: &'a dyn SourceAdapter,
    pub dataset: CanonicalDataset,
    pub log: AttemptLog,
}

impl Resolved<'_> {
    pub fn source_id(&self) -> &str { self.adapter.id() }
}

impl SourceChain {
    pub fn new(kind: DatasetKind, adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { kind, adapters }
    }

    /// The built-in priority order for `kind`.
    pub fn default_for(kind: DatasetKind, opts: &AppOptions, transport: Arc<dyn Transport>) -> Self {
        Self::new(kind, default_chain(kind, opts, transport))
    }

    pub fn kind(&self) -> DatasetKind { self.kind }

    pub fn ids(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub fn len(&self) -> usize { self.adapters.len() }
    pub fn is_empty(&self) -> bool { self.adapters.is_empty() }

    /// Fetch and normalize adapter by adapter until one yields rows. `today`
    /// stamps tables that carry no date column.
    pub fn resolve(&self, today: NaiveDate) -> Result<Resolved<'_>, AllSourcesFailed> {
        let mut log = AttemptLog::new();

        for adapter in &self.adapters {
            let id = adapter.id();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                adapter.fetch().map(|raw| {
                    let fetched = raw.len();
                    let dataset = if raw.is_empty() { CanonicalDataset::new(self.kind) } else { adapter.normalize(raw, today) };
                    (fetched, dataset)
                })
            }));

            match outcome {
                Ok(Ok((fetched, dataset))) if !dataset.is_empty() => {
                    info!(kind = self.kind.name(), source = id, fetched, rows = dataset.len(), "source succeeded");
                    return Ok(Resolved { adapter: adapter.as_ref(), dataset, log });
                }
                Ok(Ok((0, _))) => {
                    warn!(kind = self.kind.name(), source = id, "source returned no rows");
                    log.record(id, FailureKind::Validation, "no rows");
                }
                Ok(Ok((fetched, _))) => {
                    warn!(kind = self.kind.name(), source = id, fetched, "every row dropped during normalization");
                    log.record(id, FailureKind::Validation, format!("no usable rows after normalization ({fetched} fetched)"));
                }
                Ok(Err(e)) => {
                    warn!(kind = self.kind.name(), source = id, category = %e.kind(), "source failed: {e}");
                    log.push_error(&e);
                }
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    warn!(kind = self.kind.name(), source = id, "source panicked: {msg}");
                    log.record(id, FailureKind::Unexpected, msg);
                }
            }
        }
        Err(AllSourcesFailed { kind: self.kind, log })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s!(*s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        s!("panic with non-string payload")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::table::RawRecordSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Rows,
        Empty,
        BadDates,
        Fail,
        Panic,
    }

    struct Stub {
        id: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl SourceAdapter for Stub {
        fn id(&self) -> &str { self.id }
        fn kind(&self) -> DatasetKind { DatasetKind::DailyStats }
        fn fetch(&self) -> Result<RawRecordSet, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Rows => Ok(RawRecordSet::from_rows(self.id, &strings!["date"], &[strings!["2022-01-01"]])),
                Behaviour::Empty => Ok(RawRecordSet::new(self.id)),
                Behaviour::BadDates => Ok(RawRecordSet::from_rows(self.id, &strings!["date"], &[strings!["soon"], strings!["n/a"]])),
                Behaviour::Fail => Err(SourceError::transport(self.id, "connection refused")),
                Behaviour::Panic => panic!("index out of bounds"),
            }
        }
        fn normalize(&self, raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
            crate::normalize::normalize(&raw, DatasetKind::DailyStats, today)
        }
    }

    fn stub(id: &'static str, behaviour: Behaviour) -> (Box<dyn SourceAdapter>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(Stub { id, behaviour, calls: Arc::clone(&calls) }), calls)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, 1).unwrap()
    }

    #[test]
    fn first_success_stops_the_chain() {
        let (a, a_calls) = stub("a", Behaviour::Rows);
        let (b, b_calls) = stub("b", Behaviour::Rows);
        let chain = SourceChain::new(DatasetKind::DailyStats, vec![a, b]);
        let r = chain.resolve(today()).unwrap();
        assert_eq!(r.source_id(), "a");
        assert!(r.log.is_empty());
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_are_categorized_and_skipped() {
        let (a, _) = stub("a", Behaviour::Fail);
        let (b, _) = stub("b", Behaviour::Empty);
        let (c, _) = stub("c", Behaviour::Panic);
        let (d, _) = stub("d", Behaviour::Rows);
        let chain = SourceChain::new(DatasetKind::DailyStats, vec![a, b, c, d]);
        let r = chain.resolve(today()).unwrap();
        assert_eq!(r.source_id(), "d");
        let kinds: Vec<FailureKind> = r.log.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![FailureKind::Transport, FailureKind::Validation, FailureKind::Unexpected]);
        assert_eq!(r.log.entries()[2].message, "index out of bounds");
    }

    #[test]
    fn rows_lost_in_normalization_fall_through() {
        let (a, _) = stub("a", Behaviour::BadDates);
        let (b, b_calls) = stub("b", Behaviour::Rows);
        let chain = SourceChain::new(DatasetKind::DailyStats, vec![a, b]);
        let r = chain.resolve(today()).unwrap();
        assert_eq!(r.source_id(), "b");
        assert_eq!(r.dataset.len(), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        let entry = &r.log.entries()[0];
        assert_eq!(entry.kind, FailureKind::Validation);
        assert!(entry.message.contains("after normalization"));
    }

    #[test]
    fn exhausted_chain_reports_every_source() {
        let (a, _) = stub("a", Behaviour::Fail);
        let (b, _) = stub("b", Behaviour::Fail);
        let chain = SourceChain::new(DatasetKind::DailyStats, vec![a, b]);
        let err = chain.resolve(today()).err().unwrap();
        assert_eq!(err.log.len(), 2);
        assert_eq!(err.to_string(), "all 2 sources failed for daily_stats");
    }
}
