// src/sources/owid.rs
//
// International aggregator CSVs. Vaccination comes from the per-country file;
// daily stats from the all-countries file, filtered down to Korea. Both carry
// running totals only.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{SourceAdapter, get, parse_csv, require_columns, require_rows};
use crate::config::consts::OWID_ISO_CODE;
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "owid_csv";

const VACCINATION_COLUMNS: &[(&str, &str)] = &[
    ("people_vaccinated", "cumulative_first_dose"),
    ("people_fully_vaccinated", "cumulative_second_dose"),
    ("total_boosters", "cumulative_booster"),
];

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("total_cases", "cumulative_cases"),
    ("total_deaths", "cumulative_deaths"),
    ("total_tests", "cumulative_tests"),
];

pub struct OwidCsv {
    kind: DatasetKind,
    url: String,
    transport: Arc<dyn Transport>,
}

impl OwidCsv {
    pub fn new(kind: DatasetKind, endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        let url = match kind {
            DatasetKind::DailyStats => endpoints.owid_daily.clone(),
            _ => endpoints.owid_vaccination.clone(),
        };
        Self { kind, url, transport }
    }
}

impl SourceAdapter for OwidCsv {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { self.kind }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let mut raw = parse_csv(ID, &body)?;
        match self.kind {
            DatasetKind::Vaccination => {
                require_columns(ID, &raw, &["date", "people_vaccinated"])?;
                require_rows(ID, &raw, "in country file")?;
            }
            DatasetKind::DailyStats => {
                require_columns(ID, &raw, &["iso_code", "date", "total_cases"])?;
                raw.filter_by("iso_code", |c| c == OWID_ISO_CODE);
                require_rows(ID, &raw, &format!("for {OWID_ISO_CODE}"))?;
            }
            DatasetKind::Regional => return Err(SourceError::validation(ID, "regional data not served")),
        }
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
