// src/sources/who.rs
use std::sync::Arc;

use chrono::NaiveDate;

use super::{SourceAdapter, get, parse_csv, require_columns, require_rows};
use crate::config::consts::WHO_COUNTRY;
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "who_csv";

const DAILY_COLUMNS: &[(&str, &str)] = &[
    ("Date_reported", "date"),
    ("New_cases", "daily_cases"),
    ("New_deaths", "daily_deaths"),
];

/// Global health-org daily report, all countries in one file.
pub struct WhoCsv {
    url: String,
    transport: Arc<dyn Transport>,
}

impl WhoCsv {
    pub fn new(endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self { url: endpoints.who_daily.clone(), transport }
    }
}

impl SourceAdapter for WhoCsv {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { DatasetKind::DailyStats }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let mut raw = parse_csv(ID, &body)?;
        require_columns(ID, &raw, &["Date_reported", "Country", "New_cases"])?;
        raw.filter_by("Country", |c| c == WHO_COUNTRY);
        require_rows(ID, &raw, &format!("for {WHO_COUNTRY}"))?;
        Ok(raw)
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        raw.rename_all(DAILY_COLUMNS);
        normalize(&raw, DatasetKind::DailyStats, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;

    #[test]
    fn filters_country_and_maps_new_counts() {
        let ep = SourceEndpoints::default();
        let csv = "\
Date_reported,Country_code,Country,WHO_region,New_cases,Cumulative_cases,New_deaths,Cumulative_deaths
2022-01-02,KR,Republic of Korea,WPRO,3000,638000,25,5650
2022-01-01,KR,Republic of Korea,WPRO,4400,635000,,5625
2022-01-01,JP,Japan,WPRO,500,1733000,3,18393
";
        let a = WhoCsv::new(&ep, Arc::new(FixtureTransport::new().with_body(&ep.who_daily, csv)));
        let ds = a.normalize(a.fetch().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(ds.ints("daily_cases").unwrap(), &[4400, 3000]);
        assert_eq!(ds.ints("daily_deaths").unwrap(), &[0, 25]);
    }

    #[test]
    fn renamed_columns_fail_validation() {
        let ep = SourceEndpoints::default();
        let csv = "date,country,cases\n2022-01-01,Republic of Korea,1\n";
        let a = WhoCsv::new(&ep, Arc::new(FixtureTransport::new().with_body(&ep.who_daily, csv)));
        assert!(matches!(a.fetch(), Err(SourceError::Validation { .. })));
    }
}
