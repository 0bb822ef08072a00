// src/core/html.rs
//
// HTML table extraction. Tables are picked by what their header row says,
// not by position or class, so harmless layout changes don't break a scrape.

use scraper::{ElementRef, Html, Selector};

use super::sanitize::{normalize_ws, strip_brackets};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HtmlTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    /// Case-insensitive: every keyword must appear in some header cell.
    pub fn header_matches(&self, keywords: &[&str]) -> bool {
        let lc: Vec<String> = self.headers.iter().map(|h| h.to_lowercase()).collect();
        keywords
            .iter()
            .all(|k| lc.iter().any(|h| h.contains(&k.to_lowercase())))
    }
}

fn cell_text(el: ElementRef<'_>) -> String {
    strip_brackets(&normalize_ws(&el.text().collect::<String>()))
}

/// Every `<table>` in the document, header row split from body rows.
/// The header row is the first `<tr>` made only of `<th>`; failing that, the first row.
pub fn tables(doc: &str) -> Vec<HtmlTable> {
    let (Ok(table_sel), Ok(tr_sel), Ok(cell_sel), Ok(th_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
        Selector::parse("th"),
    ) else {
        return Vec::new();
    };

    let html = Html::parse_document(doc);
    let mut out = Vec::new();

    for table in html.select(&table_sel) {
        let mut header_ix: Option<usize> = None;
        let mut raw_rows: Vec<Vec<String>> = Vec::new();

        for tr in table.select(&tr_sel) {
            let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
            if cells.is_empty() { continue; }
            let all_th = tr.select(&th_sel).count() == cells.len();
            if header_ix.is_none() && all_th {
                header_ix = Some(raw_rows.len());
            }
            raw_rows.push(cells.into_iter().map(cell_text).collect());
        }
        if raw_rows.is_empty() { continue; }

        let hi = header_ix.unwrap_or(0);
        let headers = raw_rows.remove(hi);
        // Anything above the header row is caption noise
        let rows = raw_rows.split_off(hi);
        out.push(HtmlTable { headers, rows });
    }
    out
}

/// First table whose header row mentions all `keywords`.
pub fn find_table(doc: &str, keywords: &[&str]) -> Option<HtmlTable> {
    tables(doc).into_iter().find(|t| t.header_matches(keywords))
}
