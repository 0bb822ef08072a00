// src/sources/community.rs
//
// Community-maintained mirror. Daily stats as CSV (running totals, YYYYMMDD
// dates); regional vaccination as a JSON object keyed by Korean region name:
//
//   {"updated": "...", "regions": {"서울": {"population": 9500000, "first": 1, ...}, ...}}
//
// A bare object without the "regions" wrapper is accepted as well.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{SourceAdapter, get, json_records, parse_csv, parse_json, require_columns, require_rows};
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "community";

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("confirmed", "cumulative_cases"),
    ("death", "cumulative_deaths"),
    ("tested", "cumulative_tests"),
];

const REGIONAL_COLUMNS: &[(&str, &str)] = &[
    ("first", "first_dose"),
    ("second", "second_dose"),
    ("third", "booster"),
];

pub struct Community {
    kind: DatasetKind,
    url: String,
    transport: Arc<dyn Transport>,
}

impl Community {
    pub fn new(kind: DatasetKind, endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        let url = match kind {
            DatasetKind::Regional => endpoints.community_regional.clone(),
            _ => endpoints.community_daily.clone(),
        };
        Self { kind, url, transport }
    }

    fn fetch_daily(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let raw = parse_csv(ID, &body)?;
        require_columns(ID, &raw, &["date", "confirmed"])?;
        require_rows(ID, &raw, "in kr_daily")?;
        Ok(raw)
    }

    fn fetch_regional(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let json = parse_json(ID, &body)?;
        let regions: &Map<String, Value> = match json.get("regions").or(Some(&json)) {
            Some(Value::Object(m)) => m,
            _ => return Err(SourceError::validation(ID, "expected an object keyed by region")),
        };

        // One record per region entry; the key becomes the `region` cell.
        let records: Vec<Value> = regions
            .iter()
            .filter_map(|(name, v)| {
                let mut rec = v.as_object()?.clone();
                rec.insert(s!("region"), Value::String(name.clone()));
                Some(Value::Object(rec))
            })
            .collect();
        let raw = json_records(ID, &records);
        require_rows(ID, &raw, "in regional object")?;
        Ok(raw)
    }
}

impl SourceAdapter for Community {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { self.kind }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        match self.kind {
            DatasetKind::Regional => self.fetch_regional(),
            DatasetKind::DailyStats => self.fetch_daily(),
            DatasetKind::Vaccination => Err(SourceError::validation(ID, "vaccination data not served")),
        }
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        match self.kind {
            DatasetKind::Regional => raw.rename_all(REGIONAL_COLUMNS),
            _ => raw.rename_all(DAILY_COLUMNS),
        }
        normalize(&raw, self.kind, today)
    }
}
