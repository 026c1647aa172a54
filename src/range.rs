//! # Date Range Resolver
//!
//! Turns a declarative range specification into an ordered list of calendar
//! days in the fixed operating timezone. Resolution is a pure function of
//! the spec and the supplied "today"; malformed specs are rejected with a
//! validation error rather than clamped.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{FlowsyncError, Result};

fn default_include_today() -> bool {
    false
}

/// Declarative date-range specification stored on a workflow definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DateRangeSpec {
    /// A single day, `offset_days` before today. Offset 0 is today itself.
    Rolling { offset_days: u32 },
    /// The last `days` calendar days. Ends at yesterday unless
    /// `include_today` is set, in which case it ends at today.
    Relative {
        days: u32,
        #[serde(default = "default_include_today")]
        include_today: bool,
    },
    /// Inclusive calendar-day bounds, `since <= until`.
    Absolute { since: NaiveDate, until: NaiveDate },
}

impl DateRangeSpec {
    /// Resolve the spec against `today` into a non-empty, strictly
    /// ascending, gap-free list of calendar days.
    pub fn resolve(&self, today: NaiveDate) -> Result<Vec<NaiveDate>> {
        match *self {
            DateRangeSpec::Rolling { offset_days } => {
                let day = today
                    .checked_sub_days(Days::new(u64::from(offset_days)))
                    .ok_or_else(|| {
                        FlowsyncError::validation(format!(
                            "rolling offset {offset_days} underflows the calendar"
                        ))
                    })?;
                Ok(vec![day])
            }
            DateRangeSpec::Relative {
                days,
                include_today,
            } => {
                if days < 1 {
                    return Err(FlowsyncError::validation(
                        "relative range requires days >= 1",
                    ));
                }
                let until = if include_today {
                    today
                } else {
                    today.pred_opt().ok_or_else(|| {
                        FlowsyncError::validation("relative range underflows the calendar")
                    })?
                };
                let since = until
                    .checked_sub_days(Days::new(u64::from(days) - 1))
                    .ok_or_else(|| {
                        FlowsyncError::validation(format!(
                            "relative range of {days} days underflows the calendar"
                        ))
                    })?;
                Ok(Self::expand(since, until))
            }
            DateRangeSpec::Absolute { since, until } => {
                if since > until {
                    return Err(FlowsyncError::validation(format!(
                        "absolute range is inverted: {since} > {until}"
                    )));
                }
                Ok(Self::expand(since, until))
            }
        }
    }

    fn expand(since: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
        since.iter_days().take_while(|d| *d <= until).collect()
    }

    /// Short description used in logs and execution records.
    pub fn describe(&self) -> String {
        match self {
            DateRangeSpec::Rolling { offset_days } => format!("rolling(-{offset_days}d)"),
            DateRangeSpec::Relative {
                days,
                include_today,
            } => format!("relative({days}d, include_today={include_today})"),
            DateRangeSpec::Absolute { since, until } => format!("absolute({since}..{until})"),
        }
    }
}
