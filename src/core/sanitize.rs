// src/core/sanitize.rs

pub fn normalize_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() || ch == '\u{a0}' {
            if !prev_space { out.push(' '); prev_space = true; }
        } else { out.push(ch); prev_space = false; }
    }
    out.trim().to_string()
}

/// Remove any `[ ... ]` bracket tags (footnotes like `[1]`, `[note]`).
/// Greedy within each bracket pair, no nesting.
pub fn strip_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_bracket = false;
    for ch in s.chars() {
        match ch {
            '[' => in_bracket = true,
            ']' => in_bracket = false,
            _ if !in_bracket => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Keep only letters and spaces up to the first non-letter.
/// If the non-letter is preceded by a space, drop that trailing space too.
pub fn letters_only_trim(s: &str) -> String {
    let s = normalize_ws(s);
    for (i, ch) in s.char_indices() {
        if !(ch.is_alphabetic() || ch.is_whitespace()) {
            let cut = s[..i].trim_end();
            return cut.to_string();
        }
    }
    s.trim().to_string()
}

/// Clean a numeric cell: footnotes, thousands separators, `%`, `+`, `*`.
fn numeric_core(s: &str) -> String {
    strip_brackets(s)
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '+' | '*' | ' ' | '\u{a0}'))
        .collect()
}

/// Tolerant count parse. `"1,234"` → 1234, `"12.0"` → 12. Empty/garbage → None.
pub fn parse_count(s: &str) -> Option<i64> {
    let core = numeric_core(s);
    if core.is_empty() || core == "-" { return None; }
    core.parse::<i64>()
        .ok()
        .or_else(|| core.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

pub fn parse_float(s: &str) -> Option<f64> {
    let core = numeric_core(s);
    core.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Round half away from zero to 2 decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
