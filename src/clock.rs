/// Time source for group ids, display dates and backup stamps
use chrono::{DateTime, Local, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time (browser `Date` under WASM)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock stuck at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Creation date as shown next to a group, e.g. "3/14/2024, 9:05:00 AM"
pub fn display_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 5, 0).unwrap();
        assert_eq!(FixedClock(at).now(), at);
    }

    #[test]
    fn test_display_date_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap();
        let label = display_date(at);

        // Local offset varies by machine, the date part stays within a day
        assert!(label.contains("/2024, "));
        assert!(label.ends_with("AM") || label.ends_with("PM"));
    }
}
