// src/sources/jhu.rs
//
// Time-series pair (confirmed, deaths). Wide layout: one row per
// province/country, one column per date, running totals in the cells.
// Reshaped here to one row per date with the country's province rows summed.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use super::{SourceAdapter, get, parse_csv, require_columns, require_rows};
use crate::config::consts::{DATE_FORMAT, JHU_COUNTRY};
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::core::sanitize::parse_count;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "jhu_csse";

const COUNTRY_COLUMN: &str = "Country/Region";
const META_COLUMNS: &[&str] = &["Province/State", "Country/Region", "Lat", "Long", "Long_"];

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("confirmed", "cumulative_cases"),
    ("deaths", "cumulative_deaths"),
];

pub struct JhuCsse {
    confirmed_url: String,
    deaths_url: String,
    transport: Arc<dyn Transport>,
}

impl JhuCsse {
    pub fn new(endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self {
            confirmed_url: endpoints.jhu_confirmed.clone(),
            deaths_url: endpoints.jhu_deaths.clone(),
            transport,
        }
    }

    /// date → country total for one file.
    fn series(&self, url: &str) -> Result<BTreeMap<NaiveDate, i64>, SourceError> {
        let body = get(self.transport.as_ref(), ID, url)?;
        let mut raw = parse_csv(ID, &body)?;
        require_columns(ID, &raw, &[COUNTRY_COLUMN])?;
        raw.filter_by(COUNTRY_COLUMN, |c| c == JHU_COUNTRY);
        require_rows(ID, &raw, &format!("for {JHU_COUNTRY}"))?;
        Ok(wide_to_long(&raw))
    }
}

/// JHU date headers: `1/22/20`, occasionally `1/22/2020`.
fn header_date(h: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(h, "%m/%d/%y")
        .or_else(|_| NaiveDate::parse_from_str(h, "%m/%d/%Y"))
        .ok()
}

/// Sum every date column over the remaining rows.
fn wide_to_long(raw: &RawRecordSet) -> BTreeMap<NaiveDate, i64> {
    let mut out = BTreeMap::new();
    for h in raw.headers() {
        if META_COLUMNS.contains(&h) { continue; }
        let Some(date) = header_date(h) else {
            warn!(source = ID, header = h, "dropping column with unparseable date");
            continue;
        };
        let total: i64 = raw
            .column(h)
            .unwrap_or_default()
            .iter()
            .map(|v| parse_count(v).unwrap_or(0).max(0))
            .sum();
        *out.entry(date).or_insert(0) += total;
    }
    out
}

impl SourceAdapter for JhuCsse {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { DatasetKind::DailyStats }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let confirmed = self.series(&self.confirmed_url)?;
        let deaths = self.series(&self.deaths_url)?;
        if confirmed.is_empty() {
            return Err(SourceError::validation(ID, "no date columns in confirmed series"));
        }

        let dates: Vec<String> = confirmed.keys().map(|d| d.format(DATE_FORMAT).to_string()).collect();
        let cases: Vec<String> = confirmed.values().map(|n| n.to_string()).collect();
        let dead: Vec<String> = confirmed
            .keys()
            .map(|d| deaths.get(d).map(|n| n.to_string()).unwrap_or_default())
            .collect();

        let mut raw = RawRecordSet::new(ID);
        raw.push_column("date", dates);
        raw.push_column("confirmed", cases);
        raw.push_column("deaths", dead);
        Ok(raw)
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        raw.rename_all(DAILY_COLUMNS);
        normalize(&raw, DatasetKind::DailyStats, today)
    }
}
