// src/process.rs
//
// Derived tables on top of the canonical datasets: moving averages, change
// rates, vaccination/case correlation, regional comparison, and a one-page
// summary. Inputs are never modified; each step returns an extended copy.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::DatasetKind;
use crate::config::consts::{DATE_FORMAT, REGIONS};
use crate::core::sanitize::round2;
use crate::table::{CanonicalDataset, DOSES, Values};

pub const ROLLING_WINDOW: usize = 7;
/// Days between a vaccination level and the case count it is compared with.
pub const CORRELATION_LAG: usize = 14;
/// Correlations need strictly more qualifying points than this.
pub const MIN_CORRELATION_POINTS: usize = 10;

const PERCENTAGES: [&str; 3] = ["first_dose_percentage", "second_dose_percentage", "booster_percentage"];

/* ---------------- Series helpers ---------------- */

/// Trailing mean over `window` values; NaN until the window is full.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 { return vec![f64::NAN; values.len()]; }
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window { sum -= values[i - window]; }
        out.push(if i + 1 >= window { sum / window as f64 } else { f64::NAN });
    }
    out
}

/// Day-over-day percent change. NaN for the first row and after a zero.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        let v = match i.checked_sub(1).map(|p| values[p]) {
            Some(prev) if prev != 0.0 => (values[i] - prev) / prev * 100.0,
            _ => f64::NAN,
        };
        out.push(v);
    }
    out
}

/// Pearson correlation; None for fewer than two points or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 { return None; }
    let mx = xs[..n].iter().sum::<f64>() / n as f64;
    let my = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = xs[i] - mx;
        let dy = ys[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 { return None; }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}

/// Dense rank, highest value first (ties share a rank, no gaps).
pub fn dense_rank_desc(values: &[f64]) -> Vec<i64> {
    let mut distinct: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    distinct.sort_by(|a, b| b.total_cmp(a));
    distinct.dedup();
    values
        .iter()
        .map(|v| distinct.iter().position(|d| d == v).map(|p| p as i64 + 1).unwrap_or(0))
        .collect()
}

fn round_all(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v.round()).collect()
}

fn ints_or_zero(ds: &CanonicalDataset, name: &str) -> Vec<i64> {
    ds.ints(name).map(<[i64]>::to_vec).unwrap_or_else(|| vec![0; ds.len()])
}

fn as_f64(v: &[i64]) -> Vec<f64> {
    v.iter().map(|&x| x as f64).collect()
}

/* ---------------- Vaccination ---------------- */

pub fn process_vaccination(vax: &CanonicalDataset) -> CanonicalDataset {
    let mut out = vax.clone();
    let mut total = vec![0i64; vax.len()];

    for dose in DOSES {
        let col = join!("daily_", dose);
        let daily = ints_or_zero(vax, &col);
        for (t, d) in total.iter_mut().zip(&daily) { *t += d; }
        out.set(&join!(&col, "_7d_avg"), Values::Float(round_all(&rolling_mean(&as_f64(&daily), ROLLING_WINDOW))));
    }
    let total_f = as_f64(&total);
    out.set("daily_total", Values::Int(total));
    out.set("daily_total_7d_avg", Values::Float(round_all(&rolling_mean(&total_f, ROLLING_WINDOW))));

    for dose in DOSES {
        let col = join!("daily_", dose);
        let daily = as_f64(&ints_or_zero(vax, &col));
        out.set(&join!(&col, "_change"), Values::Float(pct_change(&daily)));
    }
    out.set("daily_total_change", Values::Float(pct_change(&total_f)));
    debug!(rows = out.len(), "vaccination processed");
    out
}

/* ---------------- Daily stats ---------------- */

pub fn process_daily_stats(stats: &CanonicalDataset, vax: &CanonicalDataset) -> CanonicalDataset {
    let mut out = stats.clone();
    let n = stats.len();

    let cases = as_f64(&ints_or_zero(stats, "daily_cases"));
    let deaths = as_f64(&ints_or_zero(stats, "daily_deaths"));
    out.set("daily_cases_7d_avg", Values::Float(round_all(&rolling_mean(&cases, ROLLING_WINDOW))));
    out.set("daily_deaths_7d_avg", Values::Float(round_all(&rolling_mean(&deaths, ROLLING_WINDOW))));
    if let Some(rate) = stats.floats("positivity_rate") {
        let avg = rolling_mean(rate, ROLLING_WINDOW).into_iter().map(round2).collect();
        out.set("positivity_rate_7d_avg", Values::Float(avg));
    }

    // Left join of vaccination percentages by date; no match → 0
    let mut by_date: HashMap<NaiveDate, [f64; 3]> = HashMap::new();
    if let Some(dates) = vax.dates("date") {
        for (i, d) in dates.iter().enumerate() {
            let mut row = [0.0; 3];
            for (slot, col) in PERCENTAGES.iter().enumerate() {
                row[slot] = vax.floats(col).and_then(|v| v.get(i)).copied().filter(|v| v.is_finite()).unwrap_or(0.0);
            }
            by_date.insert(*d, row);
        }
    }
    let joined: Vec<[f64; 3]> = match stats.dates("date") {
        Some(dates) => dates.iter().map(|d| by_date.get(d).copied().unwrap_or([0.0; 3])).collect(),
        None => vec![[0.0; 3]; n],
    };
    for (slot, col) in PERCENTAGES.iter().enumerate() {
        out.set(col, Values::Float(joined.iter().map(|r| r[slot]).collect()));
    }

    // Vaccination level vs cases CORRELATION_LAG days later
    for (slot, dose) in ["first_dose", "second_dose"].into_iter().enumerate() {
        let (xs, ys): (Vec<f64>, Vec<f64>) = (0..n)
            .filter(|&i| i + CORRELATION_LAG < n && joined[i][slot] > 0.0)
            .map(|i| (joined[i][slot], cases[i + CORRELATION_LAG]))
            .unzip();
        if xs.len() <= MIN_CORRELATION_POINTS { continue; }
        if let Some(r) = pearson(&xs, &ys) {
            debug!(dose, r, points = xs.len(), "lagged correlation");
            out.set(&join!(dose, "_case_correlation"), Values::Float(vec![r; n]));
        }
    }
    out
}

/* ---------------- Regional ---------------- */

pub fn process_regional(regional: &CanonicalDataset) -> CanonicalDataset {
    let mut out = regional.clone();

    // Fixed region order
    let names: Vec<String> = regional.texts("region").map(<[String]>::to_vec).unwrap_or_default();
    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by_key(|&i| REGIONS.iter().position(|r| *r == names[i]).unwrap_or(REGIONS.len()));
    out.reorder(&order);

    let population = ints_or_zero(&out, "population");
    let pop_total: i64 = population.iter().sum();
    let doses: Vec<Vec<i64>> = DOSES.iter().map(|d| ints_or_zero(&out, d)).collect();

    for (dose, pct_col) in doses.iter().zip(PERCENTAGES) {
        let national = if pop_total > 0 { dose.iter().sum::<i64>() as f64 / pop_total as f64 * 100.0 } else { 0.0 };
        let pct: Vec<f64> = out.floats(pct_col).map(<[f64]>::to_vec).unwrap_or_else(|| vec![0.0; out.len()]);
        out.set(&join!(pct_col, "_diff_from_avg"), Values::Float(pct.iter().map(|p| round2(p - national)).collect()));
        out.set(&join!(pct_col, "_rank"), Values::Int(dense_rank_desc(&pct)));
    }

    let efficiency = (0..out.len())
        .map(|i| {
            let given: i64 = doses.iter().map(|d| d[i]).sum();
            if population[i] > 0 { given as f64 / population[i] as f64 } else { 0.0 }
        })
        .collect();
    out.set("vaccination_efficiency", Values::Float(efficiency));
    out
}

/* ---------------- Summary ---------------- */

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub report_date: String,
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
    pub daily_vaccinations_last_week: i64,
    pub weekly_change_percentage: Option<f64>,
    pub top_region: Option<String>,
    pub bottom_region: Option<String>,
    pub regional_variation: f64,
    /// kind → where the data came from
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, String>,
}

/// Needs processed vaccination (for the 7-day columns) and processed regional.
/// None when there is no vaccination row to report on.
pub fn summarize(vax: &CanonicalDataset, regional: &CanonicalDataset) -> Option<Summary> {
    debug_assert_eq!(vax.kind, DatasetKind::Vaccination);
    let dates = vax.dates("date")?;
    let (last, report_date) = dates.iter().enumerate().max_by_key(|(_, d)| **d)?;

    let latest = |col: &str| vax.floats(col).and_then(|v| v.get(last)).copied().filter(|v| v.is_finite());
    let daily_vaccinations_last_week = latest("daily_total_7d_avg")
        .or_else(|| {
            // Fewer than a week of rows: average what there is
            let total = vax.ints("daily_total")?;
            Some(total.iter().sum::<i64>() as f64 / total.len().max(1) as f64)
        })
        .map(|v| v.round() as i64)
        .unwrap_or(0);

    let pop: i64 = ints_or_zero(regional, "population").iter().sum();
    let national = |dose: &str| -> f64 {
        if pop <= 0 { return 0.0; }
        round2(ints_or_zero(regional, dose).iter().sum::<i64>() as f64 / pop as f64 * 100.0)
    };

    let names = regional.texts("region").unwrap_or_default();
    let first_pct = regional.floats("first_dose_percentage").unwrap_or_default();
    let ranked: Vec<(&String, f64)> = names.iter().zip(first_pct.iter().copied()).filter(|(_, p)| p.is_finite()).collect();
    let top = ranked.iter().max_by(|a, b| a.1.total_cmp(&b.1));
    let bottom = ranked.iter().min_by(|a, b| a.1.total_cmp(&b.1));
    let regional_variation = match (top, bottom) {
        (Some(t), Some(b)) => round2(t.1 - b.1),
        _ => 0.0,
    };

    Some(Summary {
        report_date: report_date.format(DATE_FORMAT).to_string(),
        first_dose_percentage: national("first_dose"),
        second_dose_percentage: national("second_dose"),
        booster_percentage: national("booster"),
        daily_vaccinations_last_week,
        weekly_change_percentage: latest("daily_total_change").map(round2),
        top_region: top.map(|t| t.0.clone()),
        bottom_region: bottom.map(|b| b.0.clone()),
        regional_variation,
        sources: BTreeMap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize;
    use crate::table::RawRecordSet;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 6, 1).unwrap() + chrono::Days::new(u64::from(n))
    }

    fn vax(days: u32, per_day: i64) -> CanonicalDataset {
        let headers = strings!["date", "daily_first_dose"];
        let rows: Vec<Vec<String>> = (0..days)
            .map(|i| vec![day(i).format(DATE_FORMAT).to_string(), (per_day * i64::from(i + 1)).to_string()])
            .collect();
        normalize::vaccination(&RawRecordSet::from_rows("t", &headers, &rows), day(0))
    }

    #[test]
    fn rolling_mean_waits_for_full_window() {
        let r = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(r[0].is_nan() && r[1].is_nan());
        assert_eq!(&r[2..], &[2.0, 3.0]);
    }

    #[test]
    fn pct_change_handles_zero() {
        let c = pct_change(&[0.0, 10.0, 15.0]);
        assert!(c[0].is_nan() && c[1].is_nan());
        assert_eq!(c[2], 50.0);
    }

    #[test]
    fn pearson_perfect_and_flat() {
        assert!((pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 1.0], &[3.0, 4.0]).is_none());
    }

    #[test]
    fn dense_rank_ties() {
        assert_eq!(dense_rank_desc(&[80.0, 90.0, 80.0, 70.0]), vec![2, 1, 2, 3]);
    }

    #[test]
    fn vaccination_adds_totals_and_averages() {
        let p = process_vaccination(&vax(8, 100));
        assert_eq!(p.ints("daily_total").unwrap()[7], 800);
        // mean of 200..=800 step 100
        assert_eq!(p.floats("daily_total_7d_avg").unwrap()[7], 500.0);
        assert_eq!(p.floats("daily_first_dose_change").unwrap()[1], 100.0);
    }

    #[test]
    fn daily_stats_join_and_correlation() {
        let v = vax(30, 10_000);
        let headers = strings!["date", "daily_cases", "daily_deaths"];
        let rows: Vec<Vec<String>> = (0..30)
            .map(|i| vec![day(i).format(DATE_FORMAT).to_string(), (5000 - i * 100).to_string(), s!("1")])
            .collect();
        let stats = normalize::daily_stats(&RawRecordSet::from_rows("t", &headers, &rows), day(0));

        let p = process_daily_stats(&stats, &v);
        assert_eq!(p.floats("first_dose_percentage").unwrap()[0], v.floats("first_dose_percentage").unwrap()[0]);
        // 16 qualifying points, cases fall as coverage rises
        let r = p.floats("first_dose_case_correlation").unwrap()[0];
        assert!(r < -0.9);
        assert!(p.column("second_dose_case_correlation").is_none());
    }

    #[test]
    fn regional_ranks_and_summary() {
        let headers = strings!["region", "first_dose", "second_dose", "booster"];
        let rows = vec![
            strings!["Busan", "3000000", "2900000", "1000000"],
            strings!["Seoul", "9000000", "8000000", "5000000"],
        ];
        let r = normalize::regional(&RawRecordSet::from_rows("t", &headers, &rows));
        let p = process_regional(&r);
        assert_eq!(p.texts("region").unwrap(), &strings!["Seoul", "Busan"]);
        assert_eq!(p.ints("first_dose_percentage_rank").unwrap(), &[1, 2]);

        let s = summarize(&process_vaccination(&vax(3, 100)), &p).unwrap();
        assert_eq!(s.report_date, "2021-06-03");
        assert_eq!(s.top_region.as_deref(), Some("Seoul"));
        assert_eq!(s.daily_vaccinations_last_week, 200);
        assert_eq!(s.first_dose_percentage, round2(12_000_000.0 / 13_770_000.0 * 100.0));
        let json = serde_json::to_value(&s).unwrap();
        assert!(json.get("sources").is_none());
    }
}
