// src/table.rs
//
// The two table shapes the pipeline moves around:
//
// - RawRecordSet: whatever one source returned, as named string columns in the
//                 source's own vocabulary. Built per fetch attempt, thrown away
//                 after normalization.
// - CanonicalDataset: typed columns under the fixed per-kind schema. This is
//                     what gets cached, processed, and handed downstream.

use chrono::NaiveDate;

use crate::config::DatasetKind;
use crate::config::consts::{DATE_FORMAT, VACCINE_TYPES};

/* ---------------- Raw ---------------- */

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawRecordSet {
    pub source: String,
    columns: Vec<(String, Vec<String>)>,
}

impl RawRecordSet {
    pub fn new(source: &str) -> Self {
        Self { source: s!(source), columns: Vec::new() }
    }

    /// Build from header + row-major cells. Short rows are padded with "".
    pub fn from_rows(source: &str, headers: &[String], rows: &[Vec<String>]) -> Self {
        let mut out = Self::new(source);
        for (ci, h) in headers.iter().enumerate() {
            let values = rows
                .iter()
                .map(|r| r.get(ci).cloned().unwrap_or_default())
                .collect();
            out.push_column(h.trim(), values);
        }
        out
    }

    /// Add a column, replacing any existing column of the same name.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) {
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| n == name) {
            slot.1 = values;
        } else {
            self.columns.push((s!(name), values));
        }
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Row count (longest column).
    pub fn len(&self) -> usize {
        self.columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rename `from` to `to` if present. An existing `to` is replaced.
    pub fn rename(&mut self, from: &str, to: &str) {
        if from == to || !self.has_column(from) {
            return;
        }
        self.columns.retain(|(n, _)| n != to);
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| n == from) {
            slot.0 = s!(to);
        }
    }

    /// Apply a list of (native, canonical) renames.
    pub fn rename_all(&mut self, map: &[(&str, &str)]) {
        for (from, to) in map {
            self.rename(from, to);
        }
    }

    /// Keep only rows where `keep(row_index)` holds.
    pub fn retain_rows(&mut self, keep: impl Fn(usize) -> bool) {
        for (_, values) in &mut self.columns {
            let mut i = 0usize;
            values.retain(|_| {
                let k = keep(i);
                i += 1;
                k
            });
        }
    }

    /// Keep only rows whose `column` value satisfies `pred`.
    pub fn filter_by(&mut self, column: &str, pred: impl Fn(&str) -> bool) {
        let Some(values) = self.column(column) else { return };
        let mask: Vec<bool> = values.iter().map(|v| pred(v.trim())).collect();
        self.retain_rows(|i| mask.get(i).copied().unwrap_or(false));
    }

    /// Names from `required` that are not present.
    pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|c| !self.has_column(c)).collect()
    }
}

/* ---------------- Canonical ---------------- */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Date,
    Int,
    Float,
    Text,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Date(Vec<NaiveDate>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Values {
    pub fn len(&self) -> usize {
        match self {
            Values::Date(v) => v.len(),
            Values::Int(v) => v.len(),
            Values::Float(v) => v.len(),
            Values::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Text rendering used for CSV output. NaN floats render empty.
    pub fn cell(&self, i: usize) -> String {
        match self {
            Values::Date(v) => v.get(i).map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
            Values::Int(v) => v.get(i).map(|n| n.to_string()).unwrap_or_default(),
            Values::Float(v) => match v.get(i) {
                Some(f) if f.is_finite() => f.to_string(),
                _ => s!(),
            },
            Values::Text(v) => v.get(i).cloned().unwrap_or_default(),
        }
    }

    fn select(&self, order: &[usize]) -> Values {
        match self {
            Values::Date(v) => Values::Date(order.iter().map(|&i| v[i]).collect()),
            Values::Int(v) => Values::Int(order.iter().map(|&i| v[i]).collect()),
            Values::Float(v) => Values::Float(order.iter().map(|&i| v[i]).collect()),
            Values::Text(v) => Values::Text(order.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Values,
}

/// Reconciled table for one dataset kind.
#[derive(Clone, Debug, PartialEq)]
pub struct CanonicalDataset {
    pub kind: DatasetKind,
    columns: Vec<Column>,
}

impl CanonicalDataset {
    pub fn new(kind: DatasetKind) -> Self {
        Self { kind, columns: Vec::new() }
    }

    /// Add or replace a column.
    pub fn set(&mut self, name: &str, values: Values) {
        if let Some(c) = self.columns.iter_mut().find(|c| c.name == name) {
            c.values = values;
        } else {
            self.columns.push(Column { name: s!(name), values });
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] { &self.columns }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn ints(&self, name: &str) -> Option<&[i64]> {
        match self.column(name).map(|c| &c.values) {
            Some(Values::Int(v)) => Some(v),
            _ => None,
        }
    }

    pub fn floats(&self, name: &str) -> Option<&[f64]> {
        match self.column(name).map(|c| &c.values) {
            Some(Values::Float(v)) => Some(v),
            _ => None,
        }
    }

    pub fn dates(&self, name: &str) -> Option<&[NaiveDate]> {
        match self.column(name).map(|c| &c.values) {
            Some(Values::Date(v)) => Some(v),
            _ => None,
        }
    }

    pub fn texts(&self, name: &str) -> Option<&[String]> {
        match self.column(name).map(|c| &c.values) {
            Some(Values::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Reorder every column by the given row indices.
    pub fn reorder(&mut self, order: &[usize]) {
        for c in &mut self.columns {
            c.values = c.values.select(order);
        }
    }

    /// Row-major string cells for CSV output.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        (0..self.len())
            .map(|i| self.columns.iter().map(|c| c.values.cell(i)).collect())
            .collect()
    }

    /// Rebuild from header + row-major cells, typing columns by the kind's
    /// schema and inferring anything the schema doesn't name.
    pub fn from_rows(kind: DatasetKind, headers: &[String], rows: &[Vec<String>]) -> Result<Self, String> {
        let schema = canonical_schema(kind);
        let mut ds = Self::new(kind);
        for (ci, name) in headers.iter().enumerate() {
            let cells: Vec<&str> = rows
                .iter()
                .map(|r| r.get(ci).map(|s| s.as_str()).unwrap_or(""))
                .collect();
            let ty = schema
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, t)| *t)
                .unwrap_or_else(|| infer_type(&cells));
            let values = parse_cells(&cells, ty).map_err(|e| format!("column '{name}': {e}"))?;
            ds.set(name, values);
        }
        Ok(ds)
    }
}

fn infer_type(cells: &[&str]) -> ColumnType {
    let filled = cells.iter().filter(|c| !c.trim().is_empty());
    let mut any = false;
    let mut all_int = true;
    let mut all_float = true;
    for c in filled {
        any = true;
        let c = c.trim();
        if c.parse::<i64>().is_err() { all_int = false; }
        if c.parse::<f64>().is_err() { all_float = false; }
    }
    match (any, all_int, all_float) {
        (true, true, _) => ColumnType::Int,
        (true, _, true) => ColumnType::Float,
        _ => ColumnType::Text,
    }
}

fn parse_cells(cells: &[&str], ty: ColumnType) -> Result<Values, String> {
    Ok(match ty {
        ColumnType::Date => Values::Date(
            cells
                .iter()
                .map(|c| {
                    NaiveDate::parse_from_str(c.trim(), DATE_FORMAT)
                        .map_err(|e| format!("bad date '{c}': {e}"))
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnType::Int => Values::Int(
            cells
                .iter()
                .map(|c| match c.trim() {
                    "" => Ok(0),
                    t => t.parse::<i64>().map_err(|e| format!("bad integer '{t}': {e}")),
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnType::Float => Values::Float(
            cells
                .iter()
                .map(|c| match c.trim() {
                    "" => Ok(f64::NAN),
                    t => t.parse::<f64>().map_err(|e| format!("bad number '{t}': {e}")),
                })
                .collect::<Result<_, _>>()?,
        ),
        ColumnType::Text => Values::Text(cells.iter().map(|c| s!(*c)).collect()),
    })
}

/* ---------------- Schemas ---------------- */

pub const DOSES: [&str; 3] = ["first_dose", "second_dose", "booster"];

pub fn vaccine_daily_column(vaccine: &str) -> String { join!(vaccine, "_daily") }
pub fn vaccine_share_column(vaccine: &str) -> String { join!(vaccine, "_percentage") }

/// Fixed column list per kind, in output order.
pub fn canonical_schema(kind: DatasetKind) -> Vec<(String, ColumnType)> {
    use ColumnType::*;
    let mut cols: Vec<(String, ColumnType)> = Vec::new();
    match kind {
        DatasetKind::Vaccination => {
            cols.push((s!("date"), Date));
            for d in DOSES { cols.push((join!("daily_", d), Int)); }
            for d in DOSES { cols.push((join!("cumulative_", d), Int)); }
            for d in DOSES { cols.push((join!(d, "_percentage"), Float)); }
            for v in VACCINE_TYPES {
                cols.push((vaccine_daily_column(v), Int));
                cols.push((vaccine_share_column(v), Float));
            }
        }
        DatasetKind::DailyStats => {
            cols.push((s!("date"), Date));
            cols.push((s!("daily_cases"), Int));
            cols.push((s!("daily_deaths"), Int));
            cols.push((s!("daily_tests"), Int));
            cols.push((s!("positivity_rate"), Float));
        }
        DatasetKind::Regional => {
            cols.push((s!("region"), Text));
            cols.push((s!("population"), Int));
            for d in DOSES { cols.push((s!(d), Int)); }
            for d in DOSES { cols.push((join!(d, "_percentage"), Float)); }
        }
    }
    cols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_from_rows_pads_short_rows() {
        let h = strings!["a", "b"];
        let rows = vec![strings!["1", "2"], strings!["3"]];
        let raw = RawRecordSet::from_rows("t", &h, &rows);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.column("b").unwrap(), &["2".to_string(), "".to_string()]);
    }

    #[test]
    fn raw_filter_and_rename() {
        let h = strings!["country", "cases"];
        let rows = vec![strings!["KOR", "5"], strings!["JPN", "7"], strings!["KOR", "9"]];
        let mut raw = RawRecordSet::from_rows("t", &h, &rows);
        raw.filter_by("country", |c| c == "KOR");
        raw.rename("cases", "daily_cases");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.column("daily_cases").unwrap(), &["5".to_string(), "9".to_string()]);
        assert!(!raw.has_column("cases"));
    }

    #[test]
    fn canonical_rows_roundtrip_types() {
        let mut ds = CanonicalDataset::new(DatasetKind::DailyStats);
        ds.set("date", Values::Date(vec![NaiveDate::from_ymd_opt(2021, 3, 1).unwrap()]));
        ds.set("daily_cases", Values::Int(vec![420]));
        ds.set("positivity_rate", Values::Float(vec![1.25]));
        ds.set("note", Values::Text(vec![s!("ok")]));

        let back = CanonicalDataset::from_rows(ds.kind, &ds.headers(), &ds.to_rows()).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn unknown_columns_are_inferred() {
        let h = strings!["date", "extra_int", "extra_float"];
        let rows = vec![strings!["2021-01-01", "3", "0.5"]];
        let ds = CanonicalDataset::from_rows(DatasetKind::Vaccination, &h, &rows).unwrap();
        assert_eq!(ds.ints("extra_int"), Some(&[3i64][..]));
        assert_eq!(ds.floats("extra_float"), Some(&[0.5f64][..]));
    }

    #[test]
    fn bad_date_is_an_error() {
        let h = strings!["date"];
        let rows = vec![strings!["yesterday"]];
        assert!(CanonicalDataset::from_rows(DatasetKind::DailyStats, &h, &rows).is_err());
    }
}
