// src/sources/mohw.rs
//
// Ministry open API. Flat envelope: {"resultCode": "00", "items": [...]}.
// Daily counts only; cumulative columns are derived by the normalizer.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;

use super::{SourceAdapter, get, json_records, parse_json, require_columns, require_rows};
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "mohw_api";

/// Row label of the national total in the daily feed.
const TOTAL_ROW: &str = "합계";

const VACCINATION_COLUMNS: &[(&str, &str)] = &[
    ("baseDate", "date"),
    ("firstCnt", "daily_first_dose"),
    ("secondCnt", "daily_second_dose"),
    ("boosterCnt", "daily_booster"),
    ("pfizerCnt", "Pfizer_daily"),
    ("modernaCnt", "Moderna_daily"),
    ("azCnt", "AstraZeneca_daily"),
    ("janssenCnt", "Janssen_daily"),
    ("novavaxCnt", "Novavax_daily"),
];

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("stdDay", "date"),
    ("incDec", "daily_cases"),
    ("deathIncDec", "daily_deaths"),
];

pub struct MohwApi {
    kind: DatasetKind,
    url: String,
    transport: Arc<dyn Transport>,
}

impl MohwApi {
    /// Regional is not served; the chain never asks for it.
    pub fn new(kind: DatasetKind, endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        let url = match kind {
            DatasetKind::DailyStats => endpoints.mohw_daily.clone(),
            _ => endpoints.mohw_vaccination.clone(),
        };
        Self { kind, url, transport }
    }

    fn items(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let json = parse_json(ID, &body)?;

        match json.get("resultCode").and_then(code_str) {
            Some(code) if code == "00" => {}
            Some(code) => {
                let msg = json.get("resultMsg").and_then(Value::as_str).unwrap_or("");
                return Err(SourceError::validation(ID, format!("resultCode {code} {msg}")));
            }
            None => return Err(SourceError::validation(ID, "missing resultCode")),
        }
        let Some(Value::Array(items)) = json.get("items") else {
            return Err(SourceError::validation(ID, "missing `items` array"));
        };
        Ok(json_records(ID, items))
    }
}

/// resultCode shows up both as "00" and as a bare number.
fn code_str(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_u64().map(|n| format!("{n:02}")),
        _ => None,
    }
}

impl SourceAdapter for MohwApi {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { self.kind }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let mut raw = self.items()?;
        match self.kind {
            DatasetKind::DailyStats => {
                require_columns(ID, &raw, &["stdDay", "incDec"])?;
                if raw.has_column("gubun") {
                    raw.filter_by("gubun", |g| g == TOTAL_ROW);
                }
            }
            DatasetKind::Vaccination => require_columns(ID, &raw, &["baseDate", "firstCnt"])?,
            DatasetKind::Regional => return Err(SourceError::validation(ID, "regional data not served")),
        }
        require_rows(ID, &raw, "in items")?;
        Ok(raw)
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        match self.kind {
            DatasetKind::DailyStats => raw.rename_all(DAILY_COLUMNS),
            _ => raw.rename_all(VACCINATION_COLUMNS),
        }
        normalize(&raw, self.kind, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;

    fn adapter(kind: DatasetKind, body: &str) -> MohwApi {
        let ep = SourceEndpoints::default();
        let url = if kind == DatasetKind::DailyStats { ep.mohw_daily.clone() } else { ep.mohw_vaccination.clone() };
        MohwApi::new(kind, &ep, Arc::new(FixtureTransport::new().with_body(&url, body)))
    }

    fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() }

    #[test]
    fn vaccination_running_sum_and_types() {
        let body = r#"{"resultCode": "00", "items": [
            {"baseDate": "20211101", "firstCnt": "1,000", "secondCnt": 400, "boosterCnt": 0, "pfizerCnt": 900, "modernaCnt": 500},
            {"baseDate": "20211102", "firstCnt": 500, "secondCnt": 100, "boosterCnt": 0, "pfizerCnt": 300, "modernaCnt": 300}
        ]}"#;
        let a = adapter(DatasetKind::Vaccination, body);
        let ds = a.normalize(a.fetch().unwrap(), today());
        assert_eq!(ds.ints("cumulative_first_dose").unwrap(), &[1000, 1500]);
        assert_eq!(ds.floats("Pfizer_percentage").unwrap(), &[64.29, 50.0]);
        assert_eq!(ds.ints("Janssen_daily").unwrap(), &[0, 0]);
    }

    #[test]
    fn daily_keeps_national_total_rows() {
        let body = r#"{"resultCode": "00", "items": [
            {"stdDay": "2022-01-01", "gubun": "서울", "incDec": 100, "deathIncDec": 1},
            {"stdDay": "2022-01-01", "gubun": "합계", "incDec": 400, "deathIncDec": 5}
        ]}"#;
        let a = adapter(DatasetKind::DailyStats, body);
        let ds = a.normalize(a.fetch().unwrap(), today());
        assert_eq!(ds.ints("daily_cases").unwrap(), &[400]);
        assert!(ds.column("positivity_rate").is_none());
    }

    #[test]
    fn bad_result_code() {
        let a = adapter(DatasetKind::Vaccination, r#"{"resultCode": "30", "resultMsg": "SERVICE_KEY_IS_NOT_REGISTERED_ERROR"}"#);
        match a.fetch() {
            Err(SourceError::Validation { reason, .. }) => assert!(reason.contains("30")),
            other => panic!("unexpected: {other:?}"),
        }
        let a = adapter(DatasetKind::Vaccination, r#"{"resultCode": "00", "items": []}"#);
        assert!(matches!(a.fetch(), Err(SourceError::Validation { .. })));
    }
}
