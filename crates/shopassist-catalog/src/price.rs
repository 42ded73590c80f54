//! Price constraints in shopper queries.
//!
//! Recognised forms, in precedence order:
//!
//! 1. `$40 to $80`, `$40-$80`, `$40 - 80` set both bounds
//! 2. `under $50`, `below 50`, `less than $50` set the upper bound
//! 3. `over $20`, `above 20`, `more than $20` set the lower bound
//!
//! Forms 2 and 3 may appear together. A range always wins over them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s*(\d[\d,]*)\s*(?:to|-)\s*\$?\s*(\d[\d,]*)").expect("valid range regex")
});

static UPPER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:under|below|less\s+than)\s*\$?\s*(\d[\d,]*)").expect("valid upper regex")
});

static LOWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:over|above|more\s+than)\s*\$?\s*(\d[\d,]*)").expect("valid lower regex")
});

/// Optional price bounds in the catalog's base currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl PriceRange {
    /// Extract bounds from free text. Never fails; unmatched text yields no bounds.
    pub fn parse(query: &str) -> Self {
        if let Some(caps) = RANGE.captures(query) {
            let min = caps.get(1).and_then(|m| parse_amount(m.as_str()));
            let max = caps.get(2).and_then(|m| parse_amount(m.as_str()));
            if min.is_some() || max.is_some() {
                return Self { min, max };
            }
        }

        Self {
            min: capture(&LOWER, query),
            max: capture(&UPPER, query),
        }
    }

    /// True when neither bound is set.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// A range written high-to-low, e.g. `$80 to $50`.
    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    /// Whether `price` lies within the bounds. Missing bounds are open;
    /// an inverted range constrains nothing.
    pub fn contains(&self, price: f64) -> bool {
        if self.is_inverted() {
            return true;
        }
        let above_min = self.min.map_or(true, |min| price >= min as f64);
        let below_max = self.max.map_or(true, |max| price <= max as f64);
        above_min && below_max
    }
}

fn capture(re: &Regex, query: &str) -> Option<u64> {
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_amount(m.as_str()))
}

fn parse_amount(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}
