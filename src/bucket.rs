use std::fmt;

use chrono::{Days, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

const NAME_FORMAT: &str = "%Y-%m-%d";

/// A dated backup folder: the calendar day it represents and its canonical `YYYY-MM-DD` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateBucket {
    pub date: NaiveDate,
    pub name: String,
}

impl DateBucket {
    pub fn new(date: NaiveDate) -> DateBucket {
        DateBucket {date, name: format(date)}
    }

    /// Classifies a folder name. Anything but an exact `YYYY-MM-DD` name of an existing calendar
    /// day is not a bucket.
    pub fn parse(name: &str) -> Option<DateBucket> {
        lazy_static! {
            static ref NAME_RE: Regex = Regex::new(
                r"^(?P<year>[0-9]{4})-(?P<month>[0-9]{2})-(?P<day>[0-9]{2})$").unwrap();
        }

        let captures = NAME_RE.captures(name)?;
        let year = captures.name("year")?.as_str().parse().ok()?;
        let month = captures.name("month")?.as_str().parse().ok()?;
        let day = captures.name("day")?.as_str().parse().ok()?;

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some(DateBucket {date, name: name.to_owned()})
    }

    pub fn is_expired(&self, cutoff: NaiveDate) -> bool {
        self.date < cutoff
    }
}

impl fmt::Display for DateBucket {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn format(date: NaiveDate) -> String {
    date.format(NAME_FORMAT).to_string()
}

/// Buckets dated strictly before the returned day are expired.
pub fn cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today.checked_sub_days(Days::new(retention_days.into())).unwrap_or(NaiveDate::MIN)
}
