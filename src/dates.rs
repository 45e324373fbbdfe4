//! Normalization of loosely formatted listing dates.
//!
//! Front pages print dates like `"Mar 14"` or `"MARCH 3"` with no year. The
//! normalizer pulls a day-of-month and a month name out of such a string and
//! pins them to a reference year (normally the current one).

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DateError;
use crate::models::CanonicalDate;

static DAY_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static MONTH_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]{3}").unwrap());

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// What to do with a day that does not exist in the month, e.g. `"Feb 30"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Reject the date with [`DateError::DayOutOfRange`].
    #[default]
    Strict,
    /// Carry the overflow into the following month(s); day 0 is the last day
    /// of the previous month.
    Rollover,
}

/// The two tokens a raw date is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateTokens {
    day: u32,
    /// 1-based month number.
    month: u32,
}

fn tokenize(raw: &str) -> Result<DateTokens, DateError> {
    let digits = DAY_RUN
        .find(raw)
        .ok_or_else(|| DateError::MissingDay {
            raw: raw.to_string(),
        })?
        .as_str();
    let day = digits.parse::<u32>().map_err(|_| DateError::DayTooLarge {
        raw: raw.to_string(),
        digits: digits.to_string(),
    })?;

    let month = MONTH_TOKEN
        .find(raw)
        .map(|m| m.as_str().to_ascii_lowercase())
        .and_then(|token| MONTHS.iter().position(|name| *name == token))
        .map(|idx| idx as u32 + 1)
        .ok_or_else(|| DateError::MissingMonth {
            raw: raw.to_string(),
        })?;

    Ok(DateTokens { day, month })
}

/// Normalize `raw` to a calendar date in `reference_year`.
///
/// The day is the first run of digits; the month is the first run of three
/// letters, matched case-insensitively against English month abbreviations.
/// Only those first runs are considered, so `"3rd of March 14"` is March 3rd
/// and `"event on March 14"` has no month (`"eve"`).
pub fn normalize(
    raw: &str,
    reference_year: i32,
    policy: DatePolicy,
) -> Result<CanonicalDate, DateError> {
    let DateTokens { day, month } = tokenize(raw)?;

    let out_of_range = || DateError::DayOutOfRange {
        raw: raw.to_string(),
        year: reference_year,
        month,
        day,
    };

    let date = match policy {
        DatePolicy::Strict => {
            NaiveDate::from_ymd_opt(reference_year, month, day).ok_or_else(out_of_range)?
        }
        DatePolicy::Rollover => {
            let first = NaiveDate::from_ymd_opt(reference_year, month, 1).ok_or_else(out_of_range)?;
            if day == 0 {
                first.pred_opt()
            } else {
                first.checked_add_days(Days::new(u64::from(day) - 1))
            }
            .ok_or_else(out_of_range)?
        }
    };

    Ok(CanonicalDate(date))
}
