// src/sources/mod.rs
//
// One adapter per remote source. An adapter does two things:
//
// - fetch:     one GET (or a small fixed set), parse, structural validation.
//              The result keeps the source's own column names.
// - normalize: rename native columns to canonical ones, then run the shared
//              per-kind rules in `crate::normalize`.
//
// Adapters are built per dataset kind; `default_chain` lays them out in trust
// order (government APIs, then aggregators, then community/scraped data).

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use crate::config::{AppOptions, DatasetKind};
use crate::core::{Body, Transport};
use crate::csv::parse_table;
use crate::error::SourceError;
use crate::table::{CanonicalDataset, RawRecordSet};

pub mod community;
pub mod dashboard;
pub mod jhu;
pub mod kdca;
pub mod mohw;
pub mod news;
pub mod owid;
pub mod who;

pub use community::Community;
pub use dashboard::KdcaDashboard;
pub use jhu::JhuCsse;
pub use kdca::KdcaApi;
pub use mohw::MohwApi;
pub use news::NewsHtml;
pub use owid::OwidCsv;
pub use who::WhoCsv;

pub trait SourceAdapter {
    /// Stable identifier used in logs and attempt reports.
    fn id(&self) -> &str;

    fn kind(&self) -> DatasetKind;

    fn fetch(&self) -> Result<RawRecordSet, SourceError>;

    /// Map this source's native columns into the canonical dataset.
    fn normalize(&self, raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset;
}

/// Default priority order per kind.
pub fn default_chain(kind: DatasetKind, opts: &AppOptions, transport: Arc<dyn Transport>) -> Vec<Box<dyn SourceAdapter>> {
    let ep = &opts.endpoints;
    let t = || Arc::clone(&transport);
    match kind {
        DatasetKind::Vaccination => vec![
            Box::new(KdcaApi::new(kind, ep, t())),
            Box::new(MohwApi::new(kind, ep, t())),
            Box::new(OwidCsv::new(kind, ep, t())),
        ],
        DatasetKind::DailyStats => vec![
            Box::new(KdcaApi::new(kind, ep, t())),
            Box::new(MohwApi::new(kind, ep, t())),
            Box::new(OwidCsv::new(kind, ep, t())),
            Box::new(JhuCsse::new(ep, t())),
            Box::new(WhoCsv::new(ep, t())),
            Box::new(Community::new(kind, ep, t())),
            Box::new(NewsHtml::new(ep, t())),
        ],
        DatasetKind::Regional => vec![
            Box::new(KdcaApi::new(kind, ep, t())),
            Box::new(KdcaDashboard::new(ep, t())),
            Box::new(Community::new(kind, ep, t())),
        ],
    }
}

/// Source ids per kind, in chain order.
pub fn chain_ids(kind: DatasetKind) -> &'static [&'static str] {
    match kind {
        DatasetKind::Vaccination => &[kdca::ID, mohw::ID, owid::ID],
        DatasetKind::DailyStats  => &[kdca::ID, mohw::ID, owid::ID, jhu::ID, who::ID, community::ID, news::ID],
        DatasetKind::Regional    => &[kdca::ID, dashboard::ID, community::ID],
    }
}

/* ---------------- Shared fetch helpers ---------------- */

pub(crate) fn get(transport: &dyn Transport, id: &str, url: &str) -> Result<Body, SourceError> {
    transport.get(url).map_err(|e| SourceError::transport(id, e))
}

pub(crate) fn parse_json(id: &str, body: &Body) -> Result<Value, SourceError> {
    serde_json::from_str(&body.text).map_err(|e| {
        let declared = body.content_type.as_deref().unwrap_or("no content type");
        SourceError::parse(id, format!("invalid JSON from {} ({declared}): {e}", body.url))
    })
}

pub(crate) fn parse_csv(id: &str, body: &Body) -> Result<RawRecordSet, SourceError> {
    let trimmed = body.text.trim_start();
    if trimmed.starts_with('<') {
        return Err(SourceError::parse(id, format!("expected CSV from {}, got markup", body.url)));
    }
    if body.looks_like_json() {
        return Err(SourceError::parse(id, format!("expected CSV from {}, got JSON", body.url)));
    }
    let (headers, rows) =
        parse_table(&body.text, ',').ok_or_else(|| SourceError::parse(id, format!("empty CSV from {}", body.url)))?;
    Ok(RawRecordSet::from_rows(id, &headers, &rows))
}

/// Cell text for a JSON scalar. Nested values are kept as compact JSON.
fn json_cell(v: &Value) -> String {
    match v {
        Value::Null => s!(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Array of flat objects → columns. Keys are unioned in first-seen order;
/// objects lacking a key get "".
pub(crate) fn json_records(id: &str, records: &[Value]) -> RawRecordSet {
    let mut keys: Vec<String> = Vec::new();
    for r in records {
        if let Value::Object(map) = r {
            for k in map.keys() {
                if !keys.iter().any(|x| x == k) {
                    keys.push(k.clone());
                }
            }
        }
    }
    let rows: Vec<Vec<String>> = records
        .iter()
        .filter_map(|r| r.as_object())
        .map(|map| keys.iter().map(|k| map.get(k).map(json_cell).unwrap_or_default()).collect())
        .collect();
    RawRecordSet::from_rows(id, &keys, &rows)
}

/// Item list under a JSON pointer. Data-portal envelopes collapse a single
/// item to a bare object, so that case is accepted too.
pub(crate) fn items_at<'a>(value: &'a Value, pointer: &str) -> Option<Vec<&'a Value>> {
    match value.pointer(pointer)? {
        Value::Array(a) => Some(a.iter().collect()),
        obj @ Value::Object(_) => Some(vec![obj]),
        _ => None,
    }
}

pub(crate) fn require_columns(id: &str, raw: &RawRecordSet, required: &[&str]) -> Result<(), SourceError> {
    let missing = raw.missing_columns(required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SourceError::validation(id, format!("missing columns: {}", missing.join(", "))))
    }
}

pub(crate) fn require_rows(id: &str, raw: &RawRecordSet, what: &str) -> Result<(), SourceError> {
    if raw.is_empty() {
        Err(SourceError::validation(id, format!("no rows {what}")))
    } else {
        Ok(())
    }
}

/// Rename headers by case-insensitive keyword match. Each rule is
/// (keywords, canonical); the first count header matching any keyword wins,
/// then the first `%` header if no count header matched. Later headers
/// matching the same rule are left alone.
pub(crate) fn rename_by_keywords(raw: &mut RawRecordSet, rules: &[(&[&str], &str)]) {
    let headers: Vec<String> = raw.headers().map(|h| s!(h)).collect();
    let mut taken: Vec<bool> = vec![false; headers.len()];
    for (keywords, canonical) in rules {
        let mut candidates = headers.iter().enumerate().filter(|(i, h)| {
            let lc = h.to_lowercase();
            !taken[*i] && keywords.iter().any(|k| lc.contains(k))
        });
        let first = candidates.next();
        let hit = first
            .into_iter()
            .chain(candidates)
            .find(|(_, h)| !h.contains('%'))
            .or(first);
        if let Some((i, h)) = hit {
            taken[i] = true;
            raw.rename(h, canonical);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;
    use serde_json::json;

    #[test]
    fn json_records_union_keys() {
        let v = json!([{"a": 1, "b": "x"}, {"b": "y", "c": null}]);
        let raw = json_records("t", v.as_array().unwrap());
        assert_eq!(raw.headers().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(raw.column("a").unwrap(), &strings!["1", ""]);
        assert_eq!(raw.column("c").unwrap(), &strings!["", ""]);
    }

    #[test]
    fn single_item_envelope() {
        let v = json!({"response": {"body": {"items": {"item": {"stateDt": "20220101"}}}}});
        assert_eq!(items_at(&v, "/response/body/items/item").unwrap().len(), 1);
        assert!(items_at(&v, "/response/body/missing").is_none());
    }

    #[test]
    fn keyword_rename_takes_first_match() {
        let h = strings!["Region", "1st dose", "1st dose (%)", "Booster"];
        let mut raw = RawRecordSet::from_rows("t", &h, &[strings!["Seoul", "1", "2", "3"]]);
        rename_by_keywords(&mut raw, &[(&["region"], "region"), (&["1st"], "first_dose"), (&["booster"], "booster")]);
        assert_eq!(raw.headers().collect::<Vec<_>>(), vec!["region", "first_dose", "1st dose (%)", "booster"]);
    }

    #[test]
    fn keyword_rename_skips_percentage_columns() {
        let h = strings!["Region", "1st dose (%)", "1st dose", "Booster %"];
        let mut raw = RawRecordSet::from_rows("t", &h, &[strings!["Seoul", "86.1", "8123456", "61.0"]]);
        rename_by_keywords(&mut raw, &[(&["1st"], "first_dose"), (&["booster"], "booster")]);
        assert_eq!(raw.headers().collect::<Vec<_>>(), vec!["Region", "1st dose (%)", "first_dose", "booster"]);
        assert_eq!(raw.column("first_dose").unwrap(), &strings!["8123456"]);
    }

    #[test]
    fn chains_follow_trust_order() {
        let t: Arc<dyn Transport> = Arc::new(FixtureTransport::new());
        let opts = AppOptions::default();
        for kind in DatasetKind::ALL {
            let chain = default_chain(kind, &opts, Arc::clone(&t));
            let ids: Vec<&str> = chain.iter().map(|a| a.id()).collect();
            assert_eq!(ids, chain_ids(kind));
            assert!(chain.iter().all(|a| a.kind() == kind));
        }
    }

    #[test]
    fn csv_rejects_html_error_pages() {
        let body = Body { url: s!("u"), content_type: None, text: s!("<html>rate limited</html>") };
        assert!(matches!(parse_csv("t", &body), Err(SourceError::Parse { .. })));
    }

    #[test]
    fn csv_rejects_json_bodies() {
        let declared = Body { url: s!("u"), content_type: Some(s!("application/json")), text: s!("date,cases\n2022-01-01,1") };
        let err = parse_csv("t", &declared).unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
        assert!(err.to_string().contains("got JSON"));

        let sniffed = Body { url: s!("u"), content_type: None, text: s!(r#"{"error": "quota"}"#) };
        assert!(matches!(parse_csv("t", &sniffed), Err(SourceError::Parse { .. })));
    }

    #[test]
    fn json_errors_name_the_content_type() {
        let body = Body { url: s!("u"), content_type: Some(s!("text/html; charset=utf-8")), text: s!("<html>") };
        let err = parse_json("t", &body).unwrap_err();
        assert!(err.to_string().contains("text/html"));
    }
}
