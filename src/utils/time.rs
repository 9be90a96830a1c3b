use std::{ffi::OsStr, future};

use chrono::NaiveDate;
use futures::{stream, Stream};

const RECORD_NAME_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in timex.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format(RECORD_NAME_FORMAT).to_string()
}

/// Inverse of [date_to_record_name]. Anything that isn't a record name gives `None`.
pub fn record_name_to_date(name: &OsStr) -> Option<NaiveDate> {
    name.to_str()
        .and_then(|v| NaiveDate::parse_from_str(v, RECORD_NAME_FORMAT).ok())
}

/// Returns a stream of dates between start (inclusive) and end (inclusive). Empty if `start` is
/// after `end`.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold(Some(start), move |current| {
        future::ready(match current {
            Some(day) if day <= end => Some((day, day.succ_opt())),
            _ => None,
        })
    })
}
