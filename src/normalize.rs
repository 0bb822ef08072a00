// src/normalize.rs
//
// Shared rules that turn a RawRecordSet into a CanonicalDataset.
//
// Sources rename their native columns to the canonical names first (each
// adapter owns that mapping, see `sources`), then hand the table to
// `normalize`. From here on the rules are source-agnostic:
//
// - Dated kinds: parse dates (several accepted formats), drop unparseable rows,
//   sort, keep the last row per date.
// - Daily vs cumulative: whichever side is missing is derived from the other;
//   negative deltas are clamped to zero.
// - Anything still missing is filled with a sentinel (zero / today).
// - Percentages are derived, rounded to 2 dp.
//
// Normalization never fails. An unusable table is the adapter's problem and is
// reported there as a validation error.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::config::DatasetKind;
use crate::config::consts::{POPULATION_SHARE, REGIONS, TOTAL_POPULATION, VACCINE_TYPES};
use crate::core::sanitize::{letters_only_trim, parse_count, parse_float, round2};
use crate::table::{CanonicalDataset, DOSES, RawRecordSet, Values, vaccine_daily_column, vaccine_share_column};

// US-style before %Y/%m/%d: a 1-digit %Y would otherwise swallow "3/1/21".
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y.%m.%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

pub fn normalize(raw: &RawRecordSet, kind: DatasetKind, today: NaiveDate) -> CanonicalDataset {
    let ds = match kind {
        DatasetKind::Vaccination => vaccination(raw, today),
        DatasetKind::DailyStats  => daily_stats(raw, today),
        DatasetKind::Regional    => regional(raw),
    };
    debug!(kind = kind.name(), source = raw.source.as_str(), rows_in = raw.len(), rows_out = ds.len(), "normalized");
    ds
}

/* ---------------- Primitives ---------------- */

/// Accepts the handful of date spellings the sources use.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim().trim_end_matches('Z');
    if s.is_empty() { return None; }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return Some(d);
        }
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt.date());
        }
    }
    None
}

/// Successive difference; the first value stands as-is. Negatives clamp to 0.
pub fn daily_from_cumulative(cum: &[i64]) -> Vec<i64> {
    let mut prev = 0i64;
    cum.iter()
        .map(|&c| {
            let d = (c - prev).max(0);
            prev = c;
            d
        })
        .collect()
}

/// Running sum.
pub fn cumulative_from_daily(daily: &[i64]) -> Vec<i64> {
    let mut acc = 0i64;
    daily.iter().map(|&d| { acc += d.max(0); acc }).collect()
}

/// Running max: cumulative series never go down.
fn monotonic(cum: &[i64]) -> Vec<i64> {
    let mut hi = 0i64;
    cum.iter().map(|&c| { hi = hi.max(c); hi }).collect()
}

/// Non-negative counts of `col` in row `order`. None if the column is absent.
fn counts(raw: &RawRecordSet, col: &str, order: &[usize]) -> Option<Vec<i64>> {
    let values = raw.column(col)?;
    Some(
        order
            .iter()
            .map(|&i| values.get(i).and_then(|v| parse_count(v)).unwrap_or(0).max(0))
            .collect(),
    )
}

/// Like `counts`, but a blank or unparseable cell repeats the previous value:
/// a gap in a running total is missing data, not a reset.
fn cumulative_counts(raw: &RawRecordSet, col: &str, order: &[usize]) -> Option<Vec<i64>> {
    let values = raw.column(col)?;
    let mut prev = 0i64;
    Some(
        order
            .iter()
            .map(|&i| {
                if let Some(v) = values.get(i).and_then(|v| parse_count(v)) {
                    prev = v.max(0);
                }
                prev
            })
            .collect(),
    )
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 { return 0.0; }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Row order for dated tables: unparseable dates dropped, ascending, last
/// occurrence of a date wins. A table with no date column is stamped `today`.
fn dated_order(raw: &RawRecordSet, today: NaiveDate) -> (Vec<NaiveDate>, Vec<usize>) {
    let n = raw.len();
    let mut keyed: Vec<(NaiveDate, usize)> = match raw.column("date") {
        Some(values) => {
            let mut out = Vec::with_capacity(n);
            let mut dropped = 0usize;
            for i in 0..n {
                match values.get(i).and_then(|v| parse_date(v)) {
                    Some(d) => out.push((d, i)),
                    None => dropped += 1,
                }
            }
            if dropped > 0 {
                warn!(source = raw.source.as_str(), dropped, "rows with unparseable dates dropped");
            }
            out
        }
        None => {
            warn!(source = raw.source.as_str(), "no date column; stamping rows with {today}");
            (0..n).map(|i| (today, i)).collect()
        }
    };

    // Stable sort keeps source order within a date; the last one wins below.
    keyed.sort_by_key(|(d, _)| *d);
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(keyed.len());
    let mut order: Vec<usize> = Vec::with_capacity(keyed.len());
    for (d, i) in keyed {
        if dates.last() == Some(&d) {
            if let Some(last) = order.last_mut() { *last = i; }
        } else {
            dates.push(d);
            order.push(i);
        }
    }
    (dates, order)
}

/// Daily and cumulative series for one measure, deriving whichever is missing.
fn daily_and_cumulative(raw: &RawRecordSet, daily_col: &str, cum_col: &str, order: &[usize]) -> (Vec<i64>, Vec<i64>) {
    match (counts(raw, daily_col, order), cumulative_counts(raw, cum_col, order)) {
        (Some(d), Some(c)) => (d, monotonic(&c)),
        (None, Some(c)) => (daily_from_cumulative(&c), monotonic(&c)),
        (Some(d), None) => {
            let c = cumulative_from_daily(&d);
            (d, c)
        }
        (None, None) => {
            debug!(source = raw.source.as_str(), column = daily_col, "absent; filled with zeros");
            (vec![0; order.len()], vec![0; order.len()])
        }
    }
}

/* ---------------- Vaccination ---------------- */

pub fn vaccination(raw: &RawRecordSet, today: NaiveDate) -> CanonicalDataset {
    let (dates, order) = dated_order(raw, today);
    let n = order.len();

    let mut daily: Vec<Vec<i64>> = Vec::with_capacity(DOSES.len());
    let mut cumulative: Vec<Vec<i64>> = Vec::with_capacity(DOSES.len());
    for dose in DOSES {
        let (d, c) = daily_and_cumulative(raw, &join!("daily_", dose), &join!("cumulative_", dose), &order);
        daily.push(d);
        cumulative.push(c);
    }

    let mut ds = CanonicalDataset::new(DatasetKind::Vaccination);
    ds.set("date", Values::Date(dates));
    for (dose, d) in DOSES.into_iter().zip(&daily) {
        ds.set(&join!("daily_", dose), Values::Int(d.clone()));
    }
    for (dose, c) in DOSES.into_iter().zip(&cumulative) {
        ds.set(&join!("cumulative_", dose), Values::Int(c.clone()));
    }
    for (dose, c) in DOSES.into_iter().zip(&cumulative) {
        let pct = c.iter().map(|&v| percent(v, TOTAL_POPULATION)).collect();
        ds.set(&join!(dose, "_percentage"), Values::Float(pct));
    }

    // Per-vaccine daily counts and their share of the day's doses.
    let day_total: Vec<i64> = (0..n).map(|i| daily.iter().map(|d| d[i]).sum()).collect();
    for vaccine in VACCINE_TYPES {
        let dcol = vaccine_daily_column(vaccine);
        let pcol = vaccine_share_column(vaccine);
        let counts_v = counts(raw, &dcol, &order).unwrap_or_else(|| vec![0; n]);
        let share: Vec<f64> = match raw.column(&pcol) {
            Some(values) => order
                .iter()
                .map(|&i| values.get(i).and_then(|v| parse_float(v)).unwrap_or(0.0).max(0.0))
                .collect(),
            None => counts_v.iter().zip(&day_total).map(|(&v, &t)| percent(v, t)).collect(),
        };
        ds.set(&dcol, Values::Int(counts_v));
        ds.set(&pcol, Values::Float(share));
    }
    ds
}

/* ---------------- Daily stats ---------------- */

pub fn daily_stats(raw: &RawRecordSet, today: NaiveDate) -> CanonicalDataset {
    let (dates, order) = dated_order(raw, today);

    let (cases, _) = daily_and_cumulative(raw, "daily_cases", "cumulative_cases", &order);
    let (deaths, _) = daily_and_cumulative(raw, "daily_deaths", "cumulative_deaths", &order);
    let tests = match (counts(raw, "daily_tests", &order), cumulative_counts(raw, "cumulative_tests", &order)) {
        (Some(t), _) => Some(t),
        (None, Some(c)) => Some(daily_from_cumulative(&c)),
        (None, None) => None,
    };

    let mut ds = CanonicalDataset::new(DatasetKind::DailyStats);
    ds.set("date", Values::Date(dates));

    match tests {
        Some(tests) => {
            let rate = cases.iter().zip(&tests).map(|(&c, &t)| percent(c, t)).collect();
            ds.set("daily_cases", Values::Int(cases));
            ds.set("daily_deaths", Values::Int(deaths));
            ds.set("daily_tests", Values::Int(tests));
            ds.set("positivity_rate", Values::Float(rate));
        }
        None => {
            ds.set("daily_cases", Values::Int(cases));
            ds.set("daily_deaths", Values::Int(deaths));
            if let Some(values) = raw.column("positivity_rate") {
                let rate = order
                    .iter()
                    .map(|&i| values.get(i).and_then(|v| parse_float(v)).unwrap_or(0.0).max(0.0))
                    .collect();
                ds.set("positivity_rate", Values::Float(rate));
            }
        }
    }
    ds
}

/* ---------------- Regional ---------------- */

/// Native spellings → canonical region. Keys are compared after `region_key`.
const REGION_ALIASES: &[(&str, &str)] = &[
    ("seoul", "Seoul"), ("서울", "Seoul"), ("서울특별시", "Seoul"), ("seoulmetropolitancity", "Seoul"),
    ("busan", "Busan"), ("pusan", "Busan"), ("부산", "Busan"), ("부산광역시", "Busan"),
    ("daegu", "Daegu"), ("taegu", "Daegu"), ("대구", "Daegu"), ("대구광역시", "Daegu"),
    ("incheon", "Incheon"), ("inchon", "Incheon"), ("인천", "Incheon"), ("인천광역시", "Incheon"),
    ("gwangju", "Gwangju"), ("kwangju", "Gwangju"), ("광주", "Gwangju"), ("광주광역시", "Gwangju"),
    ("daejeon", "Daejeon"), ("taejon", "Daejeon"), ("대전", "Daejeon"), ("대전광역시", "Daejeon"),
    ("ulsan", "Ulsan"), ("울산", "Ulsan"), ("울산광역시", "Ulsan"),
    ("sejong", "Sejong"), ("sejongcity", "Sejong"), ("세종", "Sejong"), ("세종특별자치시", "Sejong"),
    ("gyeonggi", "Gyeonggi"), ("gyeonggido", "Gyeonggi"), ("kyonggi", "Gyeonggi"), ("경기", "Gyeonggi"), ("경기도", "Gyeonggi"),
    ("gangwon", "Gangwon"), ("gangwondo", "Gangwon"), ("kangwon", "Gangwon"), ("강원", "Gangwon"), ("강원도", "Gangwon"), ("강원특별자치도", "Gangwon"),
    ("chungbuk", "Chungbuk"), ("chungcheongbukdo", "Chungbuk"), ("northchungcheong", "Chungbuk"), ("충북", "Chungbuk"), ("충청북도", "Chungbuk"),
    ("chungnam", "Chungnam"), ("chungcheongnamdo", "Chungnam"), ("southchungcheong", "Chungnam"), ("충남", "Chungnam"), ("충청남도", "Chungnam"),
    ("jeonbuk", "Jeonbuk"), ("jeollabukdo", "Jeonbuk"), ("northjeolla", "Jeonbuk"), ("전북", "Jeonbuk"), ("전라북도", "Jeonbuk"), ("전북특별자치도", "Jeonbuk"),
    ("jeonnam", "Jeonnam"), ("jeollanamdo", "Jeonnam"), ("southjeolla", "Jeonnam"), ("전남", "Jeonnam"), ("전라남도", "Jeonnam"),
    ("gyeongbuk", "Gyeongbuk"), ("gyeongsangbukdo", "Gyeongbuk"), ("northgyeongsang", "Gyeongbuk"), ("경북", "Gyeongbuk"), ("경상북도", "Gyeongbuk"),
    ("gyeongnam", "Gyeongnam"), ("gyeongsangnamdo", "Gyeongnam"), ("southgyeongsang", "Gyeongnam"), ("경남", "Gyeongnam"), ("경상남도", "Gyeongnam"),
    ("jeju", "Jeju"), ("jejudo", "Jeju"), ("cheju", "Jeju"), ("제주", "Jeju"), ("제주도", "Jeju"), ("제주특별자치도", "Jeju"),
];

fn region_key(s: &str) -> String {
    // "Chungcheongbuk-do" must survive the cut at the first non-letter.
    let joined: String = s.chars().filter(|c| !matches!(c, '-' | '‐' | '–' | '·')).collect();
    let lc: String = letters_only_trim(&joined)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    lc.strip_suffix("province").map(str::to_string).unwrap_or(lc)
}

/// Canonical region for a native name, if it is one of the 17.
pub fn canonical_region(native: &str) -> Option<&'static str> {
    let key = region_key(native);
    if key.is_empty() { return None; }
    REGION_ALIASES.iter().find(|(alias, _)| *alias == key).map(|(_, canon)| *canon)
}

/// Population estimate from the fixed share table.
pub fn estimated_population(region: &str) -> i64 {
    POPULATION_SHARE
        .iter()
        .find(|(r, _)| *r == region)
        .map(|(_, share)| (TOTAL_POPULATION as f64 * share).round() as i64)
        .unwrap_or(0)
}

pub fn regional(raw: &RawRecordSet) -> CanonicalDataset {
    // Region slot → source row (last one wins)
    let mut slots: [Option<usize>; 17] = [None; 17];
    if let Some(names) = raw.column("region") {
        for (i, name) in names.iter().enumerate() {
            match canonical_region(name).and_then(|r| REGIONS.iter().position(|x| *x == r)) {
                Some(slot) => slots[slot] = Some(i),
                None => debug!(source = raw.source.as_str(), name = name.as_str(), "row skipped: not a region"),
            }
        }
    }
    let (regions, order): (Vec<String>, Vec<usize>) = slots
        .iter()
        .enumerate()
        .filter_map(|(slot, row)| row.map(|i| (s!(REGIONS[slot]), i)))
        .unzip();

    let population: Vec<i64> = match counts(raw, "population", &order) {
        Some(p) => p
            .iter()
            .zip(&regions)
            .map(|(&p, r)| if p > 0 { p } else { estimated_population(r) })
            .collect(),
        None => regions.iter().map(|r| estimated_population(r)).collect(),
    };

    let mut ds = CanonicalDataset::new(DatasetKind::Regional);
    let mut doses: Vec<Vec<i64>> = Vec::with_capacity(DOSES.len());
    for dose in DOSES {
        doses.push(counts(raw, dose, &order).unwrap_or_else(|| vec![0; order.len()]));
    }
    let pcts: Vec<Vec<f64>> = doses
        .iter()
        .map(|d| d.iter().zip(&population).map(|(&v, &p)| percent(v, p)).collect())
        .collect();

    ds.set("region", Values::Text(regions));
    ds.set("population", Values::Int(population));
    for (dose, d) in DOSES.into_iter().zip(doses) {
        ds.set(dose, Values::Int(d));
    }
    for (dose, p) in DOSES.into_iter().zip(pcts) {
        ds.set(&join!(dose, "_percentage"), Values::Float(p));
    }
    ds
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn raw(headers: &[&str], rows: &[&[&str]]) -> RawRecordSet {
        let h: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        let r: Vec<Vec<String>> = rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect();
        RawRecordSet::from_rows("test", &h, &r)
    }

    #[test]
    fn deltas_clamp_negative_corrections() {
        assert_eq!(daily_from_cumulative(&[100, 150, 140, 200]), vec![100, 50, 0, 60]);
        assert_eq!(cumulative_from_daily(&[5, 0, 7]), vec![5, 5, 12]);
    }

    #[test]
    fn dates_accept_several_formats() {
        assert_eq!(parse_date("2021-03-01"), Some(day(2021, 3, 1)));
        assert_eq!(parse_date("20210301"), Some(day(2021, 3, 1)));
        assert_eq!(parse_date("3/1/21"), Some(day(2021, 3, 1)));
        assert_eq!(parse_date("03/01/2021"), Some(day(2021, 3, 1)));
        assert_eq!(parse_date("2021-03-01 00:00:00"), Some(day(2021, 3, 1)));
        assert_eq!(parse_date("Province/State"), None);
    }

    #[test]
    fn vaccination_derives_daily_from_cumulative() {
        let r = raw(
            &["date", "cumulative_first_dose"],
            &[&["2021-03-02", "150"], &["2021-03-01", "100"], &["2021-03-03", "140"], &["2021-03-04", "200"]],
        );
        let ds = vaccination(&r, day(2024, 1, 1));
        assert_eq!(ds.ints("daily_first_dose").unwrap(), &[100, 50, 0, 60]);
        // Sentinel-filled dose columns exist
        assert_eq!(ds.ints("daily_booster").unwrap(), &[0, 0, 0, 0]);
        // Cumulative never goes down
        assert_eq!(ds.ints("cumulative_first_dose").unwrap(), &[100, 150, 150, 200]);
        assert_eq!(ds.headers().len(), crate::table::canonical_schema(DatasetKind::Vaccination).len());
    }

    #[test]
    fn vaccination_derives_cumulative_and_percentages() {
        let r = raw(
            &["date", "daily_first_dose", "Pfizer_daily"],
            &[&["2021-03-01", "510000", "255000"], &["2021-03-02", "510000", "0"]],
        );
        let ds = vaccination(&r, day(2024, 1, 1));
        assert_eq!(ds.ints("cumulative_first_dose").unwrap(), &[510_000, 1_020_000]);
        assert_eq!(ds.floats("first_dose_percentage").unwrap(), &[1.0, 2.0]);
        assert_eq!(ds.floats("Pfizer_percentage").unwrap(), &[50.0, 0.0]);
        assert_eq!(ds.ints("Novavax_daily").unwrap(), &[0, 0]);
    }

    #[test]
    fn gaps_in_running_totals_carry_forward() {
        let r = raw(
            &["date", "cumulative_cases"],
            &[&["2022-01-01", "100"], &["2022-01-02", ""], &["2022-01-03", "150"]],
        );
        let ds = daily_stats(&r, day(2024, 1, 1));
        assert_eq!(ds.ints("daily_cases").unwrap(), &[100, 0, 50]);
    }

    #[test]
    fn missing_date_column_uses_today() {
        let r = raw(&["daily_first_dose"], &[&["10"]]);
        let ds = vaccination(&r, day(2024, 5, 6));
        assert_eq!(ds.dates("date").unwrap(), &[day(2024, 5, 6)]);
    }

    #[test]
    fn duplicate_and_bad_dates() {
        let r = raw(
            &["date", "daily_cases", "daily_deaths"],
            &[&["2022-01-01", "1", "0"], &["garbage", "9", "9"], &["2022-01-01", "3", "1"]],
        );
        let ds = daily_stats(&r, day(2024, 1, 1));
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.ints("daily_cases").unwrap(), &[3]);
        assert!(ds.column("daily_tests").is_none());
    }

    #[test]
    fn daily_stats_positivity() {
        let r = raw(
            &["date", "cumulative_cases", "daily_deaths", "daily_tests"],
            &[&["2022-01-01", "300", "2", "10000"], &["2022-01-02", "650", "1", "0"]],
        );
        let ds = daily_stats(&r, day(2024, 1, 1));
        assert_eq!(ds.ints("daily_cases").unwrap(), &[300, 350]);
        assert_eq!(ds.floats("positivity_rate").unwrap(), &[3.0, 0.0]);
    }

    #[test]
    fn regional_maps_korean_names_and_fills_population() {
        let r = raw(
            &["region", "first_dose"],
            &[&["서울특별시", "8500000"], &["합계", "44000000"], &["Gyeonggi-do", "11000000"]],
        );
        let ds = regional(&r);
        assert_eq!(ds.texts("region").unwrap(), &["Seoul".to_string(), "Gyeonggi".to_string()]);
        let pop = ds.ints("population").unwrap();
        assert_eq!(pop[0], (TOTAL_POPULATION as f64 * 0.20).round() as i64);
        let expected = round2(8_500_000f64 / pop[0] as f64 * 100.0);
        assert_eq!(ds.floats("first_dose_percentage").unwrap()[0], expected);
        assert_eq!(ds.ints("booster").unwrap(), &[0, 0]);
    }

    #[test]
    fn region_aliases() {
        assert_eq!(canonical_region("North Chungcheong Province"), Some("Chungbuk"));
        assert_eq!(canonical_region("제주"), Some("Jeju"));
        assert_eq!(canonical_region("Seoul *"), Some("Seoul"));
        assert_eq!(canonical_region("Quarantine"), None);
        assert_eq!(canonical_region("검역"), None);
    }

    #[test]
    fn hyphenated_provinces() {
        let cases = [
            ("Gyeonggi-do", "Gyeonggi"),
            ("Gangwon-do", "Gangwon"),
            ("Chungcheongbuk-do", "Chungbuk"),
            ("Chungcheongnam-do", "Chungnam"),
            ("Jeollabuk-do", "Jeonbuk"),
            ("Jeollanam-do", "Jeonnam"),
            ("Gyeongsangbuk-do", "Gyeongbuk"),
            ("Gyeongsangnam-do", "Gyeongnam"),
            ("Jeju-do", "Jeju"),
        ];
        for (name, want) in cases {
            assert_eq!(canonical_region(name), Some(want), "{name}");
        }
        assert_eq!(canonical_region("Jeollanam-do (2)"), Some("Jeonnam"));
    }
}
