//! Wall clock and the display date stamped onto new cases.

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

/// Source of the creation time for new cases.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the machine clock in its local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// How `date_str` is rendered when a case is created.
///
/// The string is stored with the case and never recomputed, so a reader
/// sees exactly what the creator saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateStyle {
    /// `chrono` strftime pattern.
    pub pattern: String,
    /// Render ASCII digits as Eastern Arabic digits (U+0660..U+0669).
    pub eastern_arabic_digits: bool,
}

impl Default for DateStyle {
    fn default() -> Self {
        Self {
            pattern: "%-d/%-m/%Y".to_string(),
            eastern_arabic_digits: true,
        }
    }
}

const FALLBACK_PATTERN: &str = "%Y-%m-%d";

impl DateStyle {
    pub fn is_valid(&self) -> bool {
        !StrftimeItems::new(&self.pattern).any(|item| matches!(item, Item::Error))
    }

    /// Falls back to an ISO date if the pattern cannot be rendered.
    pub fn format(&self, time: &DateTime<FixedOffset>) -> String {
        let mut text = String::new();
        if write!(text, "{}", time.format(&self.pattern)).is_err() {
            text = time.format(FALLBACK_PATTERN).to_string();
        }
        if !self.eastern_arabic_digits {
            return text;
        }
        text.chars()
            .map(|c| match c.to_digit(10) {
                Some(d) => char::from_u32('\u{0660}' as u32 + d).unwrap_or(c),
                None => c,
            })
            .collect()
    }
}
