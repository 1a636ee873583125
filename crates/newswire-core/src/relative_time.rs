//! Relative ages ("3 minutes ago") as shown on listing pages
//!
//! Seconds up to weeks are subtracted as fixed durations. Months and years
//! shift the calendar fields instead, clamping the day of month when the
//! target month is shorter (Mar 31 minus one month is the last day of
//! February).

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use time::{Date, Duration, Month, OffsetDateTime};

static RELATIVE_AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago")
        .expect("Valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for RelativeUnit {
    type Err = RelativeAgeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "second" => Self::Second,
            "minute" => Self::Minute,
            "hour" => Self::Hour,
            "day" => Self::Day,
            "week" => Self::Week,
            "month" => Self::Month,
            "year" => Self::Year,
            _ => return UnknownUnitSnafu { unit: s }.fail(),
        })
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum RelativeAgeParseError {
    #[snafu(display("No relative age in: {input}"))]
    NoMatch { input: String },
    #[snafu(display("Unknown time unit: {unit}"))]
    UnknownUnit { unit: String },
    #[snafu(display("Invalid amount: {amount}"))]
    InvalidAmount {
        amount: String,
        source: std::num::ParseIntError,
    },
}

/// An offset like "3 minutes", found in a string like "3 minutes ago"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeAge {
    pub amount: u32,
    pub unit: RelativeUnit,
}

impl FromStr for RelativeAge {
    type Err = RelativeAgeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let captures = RELATIVE_AGE_RE
            .captures(s)
            .context(NoMatchSnafu { input: s })?;

        let amount = &captures[1];
        Ok(Self {
            amount: amount.parse().context(InvalidAmountSnafu { amount })?,
            unit: captures[2].parse()?,
        })
    }
}

impl RelativeAge {
    /// The instant this age refers to, measured back from `now`
    ///
    /// `None` when the result is not representable.
    pub fn before(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let amount = i64::from(self.amount);
        match self.unit {
            RelativeUnit::Second => now.checked_sub(Duration::seconds(amount)),
            RelativeUnit::Minute => now.checked_sub(Duration::minutes(amount)),
            RelativeUnit::Hour => now.checked_sub(Duration::hours(amount)),
            RelativeUnit::Day => now.checked_sub(Duration::days(amount)),
            RelativeUnit::Week => now.checked_sub(Duration::weeks(amount)),
            RelativeUnit::Month => months_before(now, amount),
            RelativeUnit::Year => months_before(now, amount.checked_mul(12)?),
        }
    }
}

fn months_before(now: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let month_index = i64::from(now.year()) * 12 + i64::from(u8::from(now.month()) - 1) - months;

    let year = i32::try_from(month_index.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(month_index.rem_euclid(12) + 1).ok()?).ok()?;

    // Walk back from the original day until it exists in the target month
    let date = (1..=now.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())?;

    Some(now.replace_date(date))
}

/// Turn a relative age string into an absolute instant
///
/// Strings with no recognizable age yield `now` unchanged.
pub fn parse_relative_time(s: &str, now: OffsetDateTime) -> OffsetDateTime {
    s.parse::<RelativeAge>()
        .ok()
        .and_then(|age| age.before(now))
        .unwrap_or(now)
}
