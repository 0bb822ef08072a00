// src/sources/news.rs
//
// Last resort for daily stats: scrape today's headline figures off news
// pages. Only ever yields a single row, dated today.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::debug;

use super::{SourceAdapter, get, rename_by_keywords};
use crate::config::consts::{DATE_FORMAT, NEWS_TABLE_KEYWORDS};
use crate::config::{DatasetKind, SourceEndpoints};
use crate::core::Transport;
use crate::core::html::{HtmlTable, find_table};
use crate::error::SourceError;
use crate::normalize::normalize;
use crate::table::{CanonicalDataset, RawRecordSet};

pub const ID: &str = "news_html";

const HEADER_RULES: &[(&[&str], &str)] = &[
    (&["confirmed", "cases", "확진"], "daily_cases"),
    (&["death", "사망"], "daily_deaths"),
    (&["test", "검사"], "daily_tests"),
];

pub struct NewsHtml {
    urls: Vec<String>,
    transport: Arc<dyn Transport>,
}

impl NewsHtml {
    pub fn new(endpoints: &SourceEndpoints, transport: Arc<dyn Transport>) -> Self {
        Self { urls: endpoints.news.clone(), transport }
    }

    /// First data row of the table, or empty placeholders when it has none.
    fn headline(table: &HtmlTable, date: NaiveDate) -> RawRecordSet {
        let first = table
            .rows
            .first()
            .cloned()
            .unwrap_or_else(|| vec![s!(); table.headers.len()]);
        let mut raw = RawRecordSet::from_rows(ID, &table.headers, &[first]);
        raw.push_column("date", vec![date.format(DATE_FORMAT).to_string()]);
        raw
    }
}

impl SourceAdapter for NewsHtml {
    fn id(&self) -> &str { ID }

    fn kind(&self) -> DatasetKind { DatasetKind::DailyStats }

    fn fetch(&self) -> Result<RawRecordSet, SourceError> {
        let today = Local::now().date_naive();
        let mut last_err: Option<SourceError> = None;

        for url in &self.urls {
            match get(self.transport.as_ref(), ID, url) {
                Ok(body) => match find_table(&body.text, NEWS_TABLE_KEYWORDS) {
                    Some(table) => return Ok(Self::headline(&table, today)),
                    None => {
                        debug!(source = ID, url = url.as_str(), "no matching table");
                        last_err = Some(SourceError::validation(
                            ID,
                            format!("no table with header keywords [{}]", NEWS_TABLE_KEYWORDS.join(", ")),
                        ));
                    }
                },
                Err(e) => {
                    debug!(source = ID, url = url.as_str(), error = %e, "news page unavailable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SourceError::validation(ID, "no news URLs configured")))
    }

    fn normalize(&self, mut raw: RawRecordSet, today: NaiveDate) -> CanonicalDataset {
        rename_by_keywords(&mut raw, HEADER_RULES);
        normalize(&raw, DatasetKind::DailyStats, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixtureTransport;

    const PAGE: &str = r#"
        <table>
          <tr><th>Confirmed</th><th>Deaths</th><th>Tests</th></tr>
          <tr><td>4,400</td><td>-</td><td>220,000</td></tr>
        </table>
    "#;

    #[test]
    fn falls_through_to_next_url() {
        let ep = SourceEndpoints::default();
        let t = FixtureTransport::new()
            .with_status(&ep.news[0], 503)
            .with_body(&ep.news[1], PAGE);
        let a = NewsHtml::new(&ep, Arc::new(t));
        let raw = a.fetch().unwrap();
        assert_eq!(raw.len(), 1);

        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ds = a.normalize(raw, today);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.ints("daily_cases").unwrap(), &[4400]);
        assert_eq!(ds.ints("daily_deaths").unwrap(), &[0]);
        assert_eq!(ds.floats("positivity_rate").unwrap(), &[2.0]);
    }

    #[test]
    fn all_pages_fail() {
        let ep = SourceEndpoints::default();
        let t = FixtureTransport::new().with_body(&ep.news[0], "<p>no tables</p>");
        let a = NewsHtml::new(&ep, Arc::new(t));
        // Last URL is unreachable, so the last error is a transport one
        assert!(matches!(a.fetch(), Err(SourceError::Transport { .. })));
    }

    #[test]
    fn empty_table_gives_placeholders() {
        let t = HtmlTable { headers: strings!["Confirmed", "Deaths"], rows: vec![] };
        let raw = NewsHtml::headline(&t, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(raw.column("Confirmed").unwrap(), &strings![""]);
        assert_eq!(raw.column("date").unwrap(), &strings!["2024-01-01"]);
    }
}
