use chrono::{Local, TimeZone};
use std::fmt;
use std::time::Duration;

/// Format of `date -d @<epoch>`.
const SUBMIT_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

/// Extend `indicatif::HumanDuration` with milliseconds
#[derive(Debug)]
pub struct HumanDuration(pub Duration);

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.as_secs_f64() > 1.0 {
            return indicatif::HumanDuration(self.0).fmt(f);
        }

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let t = (self.0.as_secs_f64() * 1e3).round() as u64;

        if f.alternate() {
            write!(f, "{t}ms")
        } else if t == 1 {
            write!(f, "{t} millisecond")
        } else {
            write!(f, "{t} milliseconds")
        }
    }
}

/// Render a submit time (seconds since the epoch) in the local time zone.
///
/// Spaces are replaced with underscores so that the result is a single token
/// in whitespace separated output.
///
/// # Returns
/// `None` when `epoch` is outside the range of representable dates.
///
pub fn human_submit_time(epoch: i64) -> Option<String> {
    let time = Local.timestamp_opt(epoch, 0).single()?;
    Some(time.format(SUBMIT_TIME_FORMAT).to_string().replace(' ', "_"))
}
