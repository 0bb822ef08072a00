// src/sources/kdca.rs
//
// Health agency open-data APIs. Two endpoints:
// - vaccine-stat: per-sido rows per base date ("전국" is the national total).
//   Serves Vaccination (national rows) and Regional (latest date, provinces).
// - infection state: data-portal envelope, cumulative counts per stateDt.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use super::{SourceAdapter, get, items_at, json_records, parse_json, require_columns, require_rows};
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::error::SourceError;
use crate::normalize::{normalize, parse_date};
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "kdca_api";

const NATIONAL: &str = "전국";

const VACCINATION_COLUMNS: &[(&str, &str)] = &[
    ("baseDate", "date"),
    ("firstCnt", "daily_first_dose"),
    ("secondCnt", "daily_second_dose"),
    ("thirdCnt", "daily_booster"),
    ("totalFirstCnt", "cumulative_first_dose"),
    ("totalSecondCnt", "cumulative_second_dose"),
    ("totalThirdCnt", "cumulative_booster"),
];

const REGIONAL_COLUMNS: &[(&str, &str)] = &[
    ("sido", "region"),
    ("totalFirstCnt", "first_dose"),
    ("totalSecondCnt", "second_dose"),
    ("totalThirdCnt", "booster"),
];

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("stateDt", "date"),
    ("decideCnt", "cumulative_cases"),
    ("deathCnt", "cumulative_deaths"),
    ("accExamCnt", "cumulative_tests"),
];

pub struct KdcaApi {
    kind: DatasetKind,
    vaccine_stat_url: String,
    inf_state_url: String,
    transport: Arc<dyn Transport>,
}

impl KdcaApi {
    pub fn new(kind: DatasetKind, endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self {
            kind,
            vaccine_stat_url: endpoints.kdca_vaccine_stat.clone(),
            inf_state_url: endpoints.kdca_inf_state.clone(),
            transport,
        }
    }

    /// vaccine-stat rows; accepts both the `data` array and the portal envelope.
    fn vaccine_stat(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.vaccine_stat_url)?;
        let json = parse_json(ID, &body)?;
        let items: Vec<&Value> = match json.get("data") {
            Some(Value::Array(a)) => a.iter().collect(),
            _ => items_at(&json, "/response/body/items/item")
                .ok_or_else(|| SourceError::validation(ID, "no `data` array in response"))?,
        };
        let items: Vec<Value> = items.into_iter().cloned().collect();
        let raw = json_records(ID, &items);
        require_columns(ID, &raw, &["baseDate", "sido"])?;
        Ok(raw)
    }

    fn fetch_vaccination(&self) -> Result<RawRecordSet, SourceError> {
        let mut raw = self.vaccine_stat()?;
        raw.filter_by("sido", |s| s == NATIONAL);
        require_rows(ID, &raw, "for the national total")?;
        Ok(raw)
    }

    fn fetch_regional(&self) -> Result<RawRecordSet, SourceError> {
        let mut raw = self.vaccine_stat()?;
        raw.filter_by("sido", |s| s != NATIONAL);

        // Latest base date only
        let dates: Vec<Option<NaiveDate>> = raw
            .column("baseDate")
            .map(|c| c.iter().map(|d| parse_date(d)).collect())
            .unwrap_or_default();
        if let Some(latest) = dates.iter().flatten().max().copied() {
            raw.retain_rows(|i| dates.get(i).copied().flatten() == Some(latest));
            debug!(source = ID, %latest, rows = raw.len(), "regional base date");
        }
        require_rows(ID, &raw, "for provinces")?;
        Ok(raw)
    }

    fn fetch_daily(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.inf_state_url)?;
        let json = parse_json(ID, &body)?;

        if let Some(code) = json.pointer("/response/header/resultCode").and_then(Value::as_str) {
            if code != "00" {
                let msg = json.pointer("/response/header/resultMsg").and_then(Value::as_str).unwrap_or("");
                return Err(SourceError::validation(ID, format!("resultCode {code} {msg}")));
            }
        }
        let items: Vec<Value> = items_at(&json, "/response/body/items/item")
            .ok_or_else(|| SourceError::validation(ID, "missing response.body.items.item"))?
            .into_iter()
            .cloned()
            .collect();
        let raw = json_records(ID, &items);
        require_rows(ID, &raw, "in items")?;
        require_columns(ID, &raw, &["stateDt", "decideCnt"])?;
        Ok(raw)
    }
}

impl SourceAdapter for KdcaApi {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { self.kind }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        match self.kind {
            DatasetKind::Vaccination => self.fetch_vaccination(),
            DatasetKind::DailyStats  => self.fetch_daily(),
            DatasetKind::Regional    => self.fetch_regional(),
        }
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        raw.rename_all(match self.kind {
            DatasetKind::Vaccination => VACCINATION_COLUMNS,
            DatasetKind::DailyStats  => DAILY_COLUMNS,
            DatasetKind::Regional    => REGIONAL_COLUMNS,
        });
        normalize(&raw, self.kind, today)
    }
}
