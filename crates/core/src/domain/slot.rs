use std::fmt;

use chrono::{NaiveDate, NaiveTime};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// A bookable (date, time) pair. Identity is the pair itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    pub fn parse(date: &str, time: &str) -> Option<Self> {
        Some(Self { date: parse_date(date)?, time: parse_time(time)? })
    }

    pub fn date_label(&self) -> String {
        format_date(self.date)
    }

    pub fn time_label(&self) -> String {
        format_time(self.time)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date_label(), self.time_label())
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::Slot;

    #[test]
    fn parses_iso_date_and_hour_minute_time() {
        let slot = Slot::parse("2026-10-20", "09:00").expect("valid slot");

        assert_eq!(slot.date, NaiveDate::from_ymd_opt(2026, 10, 20).expect("date"));
        assert_eq!(slot.time, NaiveTime::from_hms_opt(9, 0, 0).expect("time"));
        assert_eq!(slot.to_string(), "2026-10-20 09:00");
    }

    #[test]
    fn rejects_malformed_components() {
        assert!(Slot::parse("20/10/2026", "09:00").is_none());
        assert!(Slot::parse("2026-10-20", "nine").is_none());
        assert!(Slot::parse("2026-02-30", "09:00").is_none());
    }
}
