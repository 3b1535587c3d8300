//! Deviation severity of a (delta, sortedOn) pair.
//!
//! The ratio `delta / sortedOn` is bucketed with inclusive lower bounds.
//! A zero denominator, or any other non-finite ratio, counts as a ratio of 0.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ratio at or above which a cell is `red`.
pub const RED_THRESHOLD: f64 = 0.3;

/// Ratio at or above which a cell is at least `yellow`.
pub const YELLOW_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTag {
    Red,
    Yellow,
    White,
    Green,
}

impl SeverityTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityTag::Red => "red",
            SeverityTag::Yellow => "yellow",
            SeverityTag::White => "white",
            SeverityTag::Green => "green",
        }
    }
}

impl fmt::Display for SeverityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerced deviation ratio.
pub fn deviation_ratio(delta: f64, sorted_on: f64) -> f64 {
    let ratio = delta / sorted_on;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

pub fn classify(delta: f64, sorted_on: f64) -> SeverityTag {
    classify_ratio(deviation_ratio(delta, sorted_on))
}

pub fn classify_ratio(ratio: f64) -> SeverityTag {
    if ratio >= RED_THRESHOLD {
        SeverityTag::Red
    } else if ratio >= YELLOW_THRESHOLD {
        SeverityTag::Yellow
    } else if ratio >= 0.0 {
        SeverityTag::White
    } else {
        SeverityTag::Green
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_belong_to_higher_bucket() {
        assert_eq!(classify_ratio(0.3), SeverityTag::Red);
        assert_eq!(classify_ratio(0.1), SeverityTag::Yellow);
        assert_eq!(classify_ratio(0.0), SeverityTag::White);
        assert_eq!(classify(30.0, 100.0), SeverityTag::Red);
        assert_eq!(classify(10.0, 100.0), SeverityTag::Yellow);
    }

    #[test]
    fn test_buckets() {
        assert_eq!(classify(40.0, 100.0), SeverityTag::Red);
        assert_eq!(classify(29.0, 100.0), SeverityTag::Yellow);
        assert_eq!(classify(9.0, 100.0), SeverityTag::White);
        assert_eq!(classify(-1.0, 100.0), SeverityTag::Green);
        assert_eq!(classify(5.0, -10.0), SeverityTag::Green);
    }

    #[test]
    fn test_zero_denominator_is_neutral() {
        assert_eq!(classify(0.0, 0.0), SeverityTag::White);
        assert_eq!(classify(12.0, 0.0), SeverityTag::White);
        assert_eq!(classify(-12.0, 0.0), SeverityTag::White);
        assert_eq!(deviation_ratio(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_non_finite_inputs_are_neutral() {
        assert_eq!(classify(f64::NAN, 10.0), SeverityTag::White);
        assert_eq!(classify(10.0, f64::NAN), SeverityTag::White);
        assert_eq!(classify(f64::INFINITY, 10.0), SeverityTag::White);
        assert_eq!(classify(f64::NEG_INFINITY, 10.0), SeverityTag::White);
    }

    #[test]
    fn test_total_over_sample_grid() {
        let values = [-1e9, -3.0, -0.5, 0.0, 0.05, 0.1, 0.3, 1.0, 1e9];
        for d in values {
            for s in values {
                let tag = classify(d, s);
                let ratio = deviation_ratio(d, s);
                let expected = if ratio >= 0.3 {
                    SeverityTag::Red
                } else if ratio >= 0.1 {
                    SeverityTag::Yellow
                } else if ratio >= 0.0 {
                    SeverityTag::White
                } else {
                    SeverityTag::Green
                };
                assert_eq!(tag, expected, "delta={} sortedOn={}", d, s);
            }
        }
    }
}
