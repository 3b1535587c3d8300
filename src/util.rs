// Utility helpers for parsing, date windows and number formatting.
//
// This module centralizes the loose JSON value handling so the rest of the
// code can assume typed values.
use chrono::{Duration, NaiveDate};
use num_format::{Locale, ToFormattedString};
use serde_json::Value;

/// Parse a string-like value into `f64`.
///
/// Accepts anything `f64::from_str` accepts after trimming, plus integer
/// parts grouped by well-formed thousands separators (`1,200`, `-12,345.5`).
/// A comma anywhere else (`12,5`) makes the value unparseable.
///
/// Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if !s.contains(',') {
        return s.parse::<f64>().ok();
    }
    let (sign, rest) = match s.strip_prefix(['-', '+']) {
        Some(rest) => (&s[..1], rest),
        None => ("", s),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (rest, None),
    };
    let groups: Vec<&str> = int_part.split(',').collect();
    let digits = |g: &str| g.chars().all(|c| c.is_ascii_digit());
    let well_formed = (1..=3).contains(&groups[0].len())
        && digits(groups[0])
        && groups[1..].iter().all(|g| g.len() == 3 && digits(g))
        && frac_part.map_or(true, |f| !f.is_empty() && digits(f));
    if !well_formed {
        return None;
    }
    let mut plain = format!("{}{}", sign, groups.concat());
    if let Some(frac) = frac_part {
        plain.push('.');
        plain.push_str(frac);
    }
    plain.parse::<f64>().ok()
}

/// Read a metric value from a source field.
///
/// - absent or `null` -> `None`
/// - numbers and numeric strings -> their value
/// - anything else -> `Some(NaN)`, neutralized later by [`numeric_or_zero`]
pub fn metric_value(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => Some(parse_f64_safe(Some(s)).unwrap_or(f64::NAN)),
        _ => Some(f64::NAN),
    }
}

/// Numeric-or-zero coalescing used at every summation boundary.
pub fn numeric_or_zero(v: Option<f64>) -> f64 {
    match v {
        Some(x) if x.is_finite() => x,
        _ => 0.0,
    }
}

/// Render a JSON scalar as an identifier. Numbers are accepted because some
/// feeds expose numeric entity codes.
pub fn value_as_label(v: Option<&Value>) -> Option<String> {
    let label = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if label.is_empty() {
        None
    } else {
        Some(label)
    }
}

pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    // Dates arrive as `YYYY-MM-DD`, sometimes with a time part attached.
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let day = s.split(['T', ' ']).next().unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Restricted-mode indicator: set for `1`, `true` or the string `"1"`.
pub fn indicator_set(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => s.trim() == "1",
        _ => false,
    }
}

/// The last `days` calendar days ending at `today`, most recent first.
pub fn date_window(today: NaiveDate, days: usize) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = (0..days)
        .filter_map(|i| today.checked_sub_signed(Duration::days(i as i64)))
        .collect();
    // NaiveDate ordering matches lexicographic ordering of ISO strings.
    dates.sort();
    dates.dedup();
    dates.reverse();
    dates
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    let neg = n.is_sign_negative() && n != 0.0;
    let abs_n = n.abs();
    let s = format!("{:.*}", decimals, abs_n);
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
