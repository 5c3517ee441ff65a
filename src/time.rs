//! Clock helpers shared by the hygiene engine and the marathon runner.
//!
//! All stamps are UTC. File ages are derived from filesystem mtimes and measured in
//! fractional days, rounded to two decimals.

use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Compact stamp used in archive filenames and run identifiers: `YYYYMMDDTHHMMSSZ`.
pub fn utc_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Age in days of a timestamp relative to `now`, rounded to 2 decimals.
pub fn age_days(mtime: SystemTime, now: DateTime<Utc>) -> f64 {
    let secs = (now - to_utc(mtime)).num_milliseconds() as f64 / 1000.0;
    round_to(secs / 86_400.0, 2)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
