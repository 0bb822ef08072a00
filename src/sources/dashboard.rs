// src/sources/dashboard.rs
//
// Public dashboard page. The regional table is found by its header row
// (all keywords, case-insensitive); columns are then matched by keyword since
// the page wording shifts between releases.

use std::sync::Arc;

use chrono::NaiveDate;

use super::{SourceAdapter, get, rename_by_keywords, require_rows};
use crate::config::consts::DASHBOARD_TABLE_KEYWORDS;
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::core::html::find_table;
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "kdca_dashboard";

const HEADER_RULES: &[(&[&str], &str)] = &[
    (&["region", "시도", "province"], "region"),
    (&["population", "인구"], "population"),
    (&["1st", "first", "1차"], "first_dose"),
    (&["2nd", "second", "2차"], "second_dose"),
    (&["booster", "3rd", "third", "3차"], "booster"),
];

pub struct KdcaDashboard {
    url: String,
    keywords: Vec<String>,
    transport: Arc<dyn Transport>,
}

impl KdcaDashboard {
    pub fn new(endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: endpoints.kdca_dashboard.clone(),
            keywords: DASHBOARD_TABLE_KEYWORDS.iter().map(|k| s!(*k)).collect(),
            transport,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| s!(*k)).collect();
        self
    }
}

impl SourceAdapter for KdcaDashboard {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { DatasetKind::Regional }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let body = get(self.transport.as_ref(), ID, &self.url)?;
        let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        let table = find_table(&body.text, &keywords).ok_or_else(|| {
            SourceError::validation(ID, format!("no table with header keywords [{}]", keywords.join(", ")))
        })?;
        let raw = RawRecordSet::from_rows(ID, &table.headers, &table.rows);
        require_rows(ID, &raw, "in regional table")?;
        Ok(raw)
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        rename_by_keywords(&mut raw, HEADER_RULES);
        normalize(&raw, DatasetKind::Regional, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;

    const PAGE: &str = r#"
        <html><body>
          <table><tr><th>Notice</th></tr><tr><td>Updated daily at 09:30</td></tr></table>
          <table>
            <thead><tr><th>Region</th><th>1st dose</th><th>2nd dose</th><th>Booster dose[1]</th></tr></thead>
            <tbody>
              <tr><td>Total</td><td>44,000,000</td><td>43,000,000</td><td>32,000,000</td></tr>
              <tr><td>Seoul</td><td>8,123,456</td><td>8,001,000</td><td>5,900,000</td></tr>
              <tr><td>Jeju</td><td>560,000</td><td>550,000</td><td>400,000</td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    fn adapter(body: &str) -> KdcaDashboard {
        let ep = SourceEndpoints::default();
        KdcaDashboard::new(&ep, Arc::new(FixtureTransport::new().with_body(&ep.kdca_dashboard, body)))
    }

    #[test]
    fn scrapes_region_table() {
        let a = adapter(PAGE);
        let ds = a.normalize(a.fetch().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(ds.texts("region").unwrap(), &strings!["Seoul", "Jeju"]);
        assert_eq!(ds.ints("first_dose").unwrap(), &[8_123_456, 560_000]);
        assert_eq!(ds.ints("booster").unwrap(), &[5_900_000, 400_000]);
        assert_eq!(ds.ints("population").unwrap()[1], 510_000);
    }

    #[test]
    fn romanized_province_names() {
        let page = r#"<table>
            <tr><th>Region</th><th>1st dose</th></tr>
            <tr><td>Chungcheongbuk-do</td><td>1,400,000</td></tr>
            <tr><td>Jeollanam-do</td><td>1,600,000</td></tr>
            <tr><td>Gyeongsangnam-do</td><td>2,900,000</td></tr>
        </table>"#;
        let a = adapter(page);
        let ds = a.normalize(a.fetch().unwrap(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(ds.texts("region").unwrap(), &strings!["Chungbuk", "Jeonnam", "Gyeongnam"]);
        assert_eq!(ds.ints("first_dose").unwrap(), &[1_400_000, 1_600_000, 2_900_000]);
    }

    #[test]
    fn layout_change_is_validation() {
        let a = adapter(PAGE).with_keywords(&["province", "dose"]);
        assert!(matches!(a.fetch(), Err(SourceError::Validation { .. })));
    }
}
