//! Turns day counts into human phrases for the countdown board.
//!
//! Months and years are averages (30.44 and 365.25 days) because the span
//! being described crosses arbitrary month boundaries. The sign of the input
//! is ignored; callers say "in X" or "X ago" themselves.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::NoteError;

/// Average days per month over the Gregorian cycle.
pub const AVG_DAYS_PER_MONTH: f64 = 30.44;
/// Average days per year over the Gregorian cycle.
pub const AVG_DAYS_PER_YEAR: f64 = 365.25;

/// Display unit for a countdown span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownUnit {
    #[default]
    Days,
    Weeks,
    Months,
    Years,
}

impl CountdownUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountdownUnit::Days => "days",
            CountdownUnit::Weeks => "weeks",
            CountdownUnit::Months => "months",
            CountdownUnit::Years => "years",
        }
    }
}

impl fmt::Display for CountdownUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CountdownUnit {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days" => Ok(CountdownUnit::Days),
            "weeks" => Ok(CountdownUnit::Weeks),
            "months" => Ok(CountdownUnit::Months),
            "years" => Ok(CountdownUnit::Years),
            other => Err(NoteError::InvalidFormat {
                message: format!("unknown countdown unit: {other}"),
            }),
        }
    }
}

/// Formats a span of days in the requested unit, largest part first.
/// Zero remainders are dropped; a span too small for the unit falls back
/// to the next smaller one.
pub fn format_day_span(days: i64, unit: CountdownUnit) -> String {
    let total = days.abs();

    let parts = match unit {
        CountdownUnit::Days => vec![plural(total, "day")],
        CountdownUnit::Weeks => two_part(total / 7, "week", total % 7, "day"),
        CountdownUnit::Months => {
            let months = (total as f64 / AVG_DAYS_PER_MONTH) as i64;
            let rem = (total as f64 - months as f64 * AVG_DAYS_PER_MONTH) as i64;
            two_part(months, "month", rem, "day")
        }
        CountdownUnit::Years => {
            let years = (total as f64 / AVG_DAYS_PER_YEAR) as i64;
            let rem_days = total as f64 - years as f64 * AVG_DAYS_PER_YEAR;
            let months = (rem_days / AVG_DAYS_PER_MONTH) as i64;
            if years == 0 && months == 0 {
                vec![plural(total, "day")]
            } else {
                two_part(years, "year", months, "month")
            }
        }
    };

    parts.join(" ")
}

fn two_part(primary: i64, primary_unit: &str, rem: i64, rem_unit: &str) -> Vec<String> {
    if primary == 0 && rem == 0 {
        return vec![plural(0, rem_unit)];
    }
    let mut parts = Vec::new();
    if primary > 0 {
        parts.push(plural(primary, primary_unit));
    }
    if rem > 0 {
        parts.push(plural(rem, rem_unit));
    }
    parts
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}
