//! In-memory view of open test-drive slots.
//!
//! The calendar is a cache local to one process. It is generated once from a
//! [`CalendarConfig`] and mutated only through [`AvailabilityCalendar::try_reserve`]
//! and [`AvailabilityCalendar::release`], both of which hold the same mutex so two
//! requests in one process can never both observe a slot as free. It is never the
//! sole gate against double-booking; the reservation ledger is.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::slot::{format_date, format_time, Slot};

/// Date (`YYYY-MM-DD`) to ascending open times (`HH:MM`).
pub type AvailabilitySnapshot = BTreeMap<String, Vec<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub days_ahead: u32,
    pub start_hour: u32,
    /// Exclusive: the last slot of the day starts at `end_hour - 1`.
    pub end_hour: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self { days_ahead: 7, start_hour: 9, end_hour: 17 }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("the requested time slot {} on {} is not available", .0.time_label(), .0.date_label())]
    SlotUnavailable(Slot),
}

#[derive(Debug, Default)]
pub struct AvailabilityCalendar {
    days: Mutex<BTreeMap<NaiveDate, Vec<NaiveTime>>>,
}

impl AvailabilityCalendar {
    pub fn initialize(config: &CalendarConfig, today: NaiveDate) -> Self {
        Self { days: Mutex::new(generate_slots(config, today)) }
    }

    fn days(&self) -> MutexGuard<'_, BTreeMap<NaiveDate, Vec<NaiveTime>>> {
        match self.days.lock() {
            Ok(days) => days,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Dates within the inclusive bounds that still have at least one open slot.
    ///
    /// Bounds compare lexicographically against the ISO-8601 date, so partial
    /// bounds such as `2026-10` behave like string prefixes would. Empty bounds
    /// are ignored.
    pub fn list_available(&self, from: Option<&str>, to: Option<&str>) -> AvailabilitySnapshot {
        let from = from.map(str::trim).filter(|value| !value.is_empty());
        let to = to.map(str::trim).filter(|value| !value.is_empty());

        self.days()
            .iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(date, times)| (format_date(*date), times))
            .filter(|(date, _)| from.map_or(true, |from| date.as_str() >= from))
            .filter(|(date, _)| to.map_or(true, |to| date.as_str() <= to))
            .map(|(date, times)| (date, times.iter().map(|time| format_time(*time)).collect()))
            .collect()
    }

    /// Whether the date was generated into this calendar, even if fully booked.
    pub fn has_date(&self, date: NaiveDate) -> bool {
        self.days().contains_key(&date)
    }

    pub fn is_open(&self, slot: &Slot) -> bool {
        self.days().get(&slot.date).is_some_and(|times| times.contains(&slot.time))
    }

    pub fn try_reserve(&self, slot: &Slot) -> Result<(), CalendarError> {
        let mut days = self.days();
        let times = days.get_mut(&slot.date).ok_or(CalendarError::SlotUnavailable(*slot))?;
        let position = times
            .iter()
            .position(|time| *time == slot.time)
            .ok_or(CalendarError::SlotUnavailable(*slot))?;
        times.remove(position);
        Ok(())
    }

    pub fn release(&self, slot: &Slot) {
        let mut days = self.days();
        let times = days.entry(slot.date).or_default();
        if let Err(position) = times.binary_search(&slot.time) {
            times.insert(position, slot.time);
        }
    }

    /// Drops every slot the ledger already holds. Returns how many were removed.
    pub fn reconcile<'a>(&self, occupied: impl IntoIterator<Item = &'a Slot>) -> usize {
        let mut days = self.days();
        let mut removed = 0;
        for slot in occupied {
            if let Some(times) = days.get_mut(&slot.date) {
                let before = times.len();
                times.retain(|time| *time != slot.time);
                removed += before - times.len();
            }
        }
        removed
    }

    /// First and last generated date, if any.
    pub fn horizon(&self) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.days();
        let first = days.keys().next().copied()?;
        let last = days.keys().next_back().copied()?;
        Some((first, last))
    }
}

/// Hourly slots for `today + 1 ..= today + days_ahead`.
pub fn generate_slots(
    config: &CalendarConfig,
    today: NaiveDate,
) -> BTreeMap<NaiveDate, Vec<NaiveTime>> {
    let times: Vec<NaiveTime> = (config.start_hour..config.end_hour)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .collect();

    (1..=i64::from(config.days_ahead))
        .filter_map(|offset| today.checked_add_signed(Duration::days(offset)))
        .map(|date| (date, times.clone()))
        .collect()
}
