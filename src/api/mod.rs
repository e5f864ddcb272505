pub mod dto;
pub mod error;
pub mod pages;
pub mod routes;
pub mod session_guard;

use chrono::{Local, NaiveDateTime, TimeZone};

/// Formats a stored (UTC) timestamp in the server's local time.
pub(crate) fn local_time(ts: NaiveDateTime, fmt: &str) -> String {
    Local.from_utc_datetime(&ts).format(fmt).to_string()
}
