//! Test-drive booking orchestration.
//!
//! A booking attempt moves `Requested -> Validated -> Reserved` and then ends in
//! either `Confirmed` or `RolledBack`. The in-memory calendar is reserved first so
//! concurrent requests inside one process are serialized, and the ledger commit
//! decides the outcome across processes:
//!
//! - commit succeeds: the booking is confirmed;
//! - ledger reports a conflict: the slot stays removed (the calendar was stale)
//!   and the caller gets `SlotUnavailable`;
//! - ledger is unavailable or times out: the slot is released back into the
//!   calendar before `TransientStorage` is returned, so the identical request can
//!   be retried.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::calendar::{AvailabilityCalendar, AvailabilitySnapshot, CalendarConfig};
use crate::domain::booking::{
    AttemptState, Booking, BookingAttempt, BookingId, BookingStatus, Customer, RollbackReason,
};
use crate::domain::slot::{parse_date, parse_time, Slot};
use crate::errors::ActionError;
use crate::ids::{Clock, IdGenerator};
use crate::ledger::{LedgerError, ReservationLedger};

pub const REQUIRED_BOOKING_FIELDS: [&str; 6] = [
    "customerName",
    "customerEmail",
    "customerPhone",
    "vehicleModel",
    "appointmentDate",
    "appointmentTime",
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BookingRequest {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub vehicle_model: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub booking: Booking,
    pub message: String,
}

struct ValidatedRequest {
    customer: Customer,
    vehicle_model: String,
    date: String,
    time: String,
}

pub struct BookingService {
    calendar: AvailabilityCalendar,
    ledger: Arc<dyn ReservationLedger>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    commit_timeout: Duration,
}

impl BookingService {
    pub fn new(
        calendar: AvailabilityCalendar,
        ledger: Arc<dyn ReservationLedger>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        commit_timeout: Duration,
    ) -> Self {
        Self { calendar, ledger, ids, clock, commit_timeout }
    }

    /// Generates the calendar anchored at `clock.today()` and drops every slot
    /// the ledger already holds.
    pub async fn initialize(
        config: &CalendarConfig,
        ledger: Arc<dyn ReservationLedger>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        commit_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let calendar = AvailabilityCalendar::initialize(config, clock.today());
        let service = Self::new(calendar, ledger, ids, clock, commit_timeout);
        service.reconcile_with_ledger().await?;
        Ok(service)
    }

    pub fn calendar(&self) -> &AvailabilityCalendar {
        &self.calendar
    }

    pub fn list_availability(&self, from: Option<&str>, to: Option<&str>) -> AvailabilitySnapshot {
        self.calendar.list_available(from, to)
    }

    /// Removes slots the ledger already holds from the calendar horizon.
    pub async fn reconcile_with_ledger(&self) -> Result<usize, LedgerError> {
        let Some((first, last)) = self.calendar.horizon() else {
            return Ok(0);
        };
        let occupied = self.ledger.occupied_slots(first, last).await?;
        let removed = self.calendar.reconcile(occupied.iter());
        info!(
            event_name = "booking.calendar.reconciled",
            occupied = occupied.len(),
            removed,
            "calendar reconciled against reservation ledger"
        );
        Ok(removed)
    }

    pub async fn book_appointment(
        &self,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, ActionError> {
        let mut attempt = BookingAttempt::default();

        let validated = validate_required(request)?;
        let slot = self.validate_slot(&validated.date, &validated.time)?;
        advance(&mut attempt, AttemptState::Validated)?;

        if let Err(error) = self.calendar.try_reserve(&slot) {
            debug!(
                event_name = "booking.attempt.lost_race",
                date = %slot.date_label(),
                time = %slot.time_label(),
                "slot was taken between validation and reservation"
            );
            return Err(ActionError::SlotUnavailable(error.to_string()));
        }
        let reservation = Reservation::hold(&self.calendar, slot);
        advance(&mut attempt, AttemptState::Reserved)?;

        let booking = Booking {
            id: BookingId(self.ids.next_id()),
            customer: validated.customer,
            vehicle_model: validated.vehicle_model,
            slot,
            created_at: self.clock.now(),
            status: BookingStatus::Confirmed,
        };

        match self.commit(&booking).await {
            Ok(()) => {
                reservation.keep();
                advance(&mut attempt, AttemptState::Confirmed)?;
                info!(
                    event_name = "booking.attempt.confirmed",
                    booking_id = %booking.id.0,
                    date = %slot.date_label(),
                    time = %slot.time_label(),
                    "test drive booking confirmed"
                );
                let message = format!(
                    "Test drive booked successfully for {} on {} at {} for {}",
                    booking.customer.name,
                    slot.date_label(),
                    slot.time_label(),
                    booking.vehicle_model
                );
                Ok(BookingConfirmation { booking, message })
            }
            Err(LedgerError::Conflict) => {
                reservation.keep();
                advance(&mut attempt, AttemptState::RolledBack(RollbackReason::SlotUnavailable))?;
                warn!(
                    event_name = "booking.attempt.ledger_conflict",
                    booking_id = %booking.id.0,
                    date = %slot.date_label(),
                    time = %slot.time_label(),
                    "ledger already holds this slot; local calendar was stale"
                );
                Err(ActionError::SlotUnavailable(format!(
                    "The requested time slot {} on {} is not available",
                    slot.time_label(),
                    slot.date_label()
                )))
            }
            Err(LedgerError::Unavailable(reason)) => {
                drop(reservation);
                advance(
                    &mut attempt,
                    AttemptState::RolledBack(RollbackReason::TransientStorageError),
                )?;
                error!(
                    event_name = "booking.attempt.rolled_back",
                    booking_id = %booking.id.0,
                    date = %slot.date_label(),
                    time = %slot.time_label(),
                    error = %reason,
                    "ledger commit failed; slot released back to calendar"
                );
                Err(ActionError::TransientStorage(format!(
                    "booking could not be saved, please retry: {reason}"
                )))
            }
        }
    }

    fn validate_slot(&self, date: &str, time: &str) -> Result<Slot, ActionError> {
        let not_found = || ActionError::NotFound(format!("No appointments available on {date}"));
        let date_value = parse_date(date).ok_or_else(not_found)?;
        if !self.calendar.has_date(date_value) {
            return Err(not_found());
        }

        let unavailable = || {
            ActionError::SlotUnavailable(format!(
                "The requested time slot {time} on {date} is not available"
            ))
        };
        let time_value = parse_time(time).ok_or_else(unavailable)?;
        let slot = Slot::new(date_value, time_value);
        if !self.calendar.is_open(&slot) {
            return Err(unavailable());
        }
        Ok(slot)
    }

    async fn commit(&self, booking: &Booking) -> Result<(), LedgerError> {
        match tokio::time::timeout(self.commit_timeout, self.ledger.commit_if_absent(booking)).await
        {
            Ok(result) => result,
            Err(_) => Err(LedgerError::Unavailable(format!(
                "commit timed out after {}ms",
                self.commit_timeout.as_millis()
            ))),
        }
    }
}

/// A slot taken out of the calendar for one attempt.
///
/// Dropping it without `keep` puts the slot back, which covers storage failures
/// as well as a commit that panics or is cancelled mid-flight.
struct Reservation<'a> {
    calendar: &'a AvailabilityCalendar,
    slot: Slot,
    settled: bool,
}

impl<'a> Reservation<'a> {
    fn hold(calendar: &'a AvailabilityCalendar, slot: Slot) -> Self {
        Self { calendar, slot, settled: false }
    }

    /// The ledger now accounts for the slot; leave it out of the calendar.
    fn keep(mut self) {
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.calendar.release(&self.slot);
        debug!(
            event_name = "booking.reservation.released",
            date = %self.slot.date_label(),
            time = %self.slot.time_label(),
            "unsettled reservation returned to calendar"
        );
    }
}

fn validate_required(request: BookingRequest) -> Result<ValidatedRequest, ActionError> {
    let fields = [
        request.customer_name,
        request.customer_email,
        request.customer_phone,
        request.vehicle_model,
        request.appointment_date,
        request.appointment_time,
    ];
    let missing: Vec<&str> = REQUIRED_BOOKING_FIELDS
        .iter()
        .zip(fields.iter())
        .filter(|(_, value)| value.as_deref().map_or(true, |value| value.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ActionError::missing(missing));
    }

    let [Some(name), Some(email), Some(phone), Some(vehicle_model), Some(date), Some(time)] = fields
    else {
        return Err(ActionError::Internal("required field check was inconsistent".to_string()));
    };
    Ok(ValidatedRequest { customer: Customer { name, email, phone }, vehicle_model, date, time })
}

fn advance(attempt: &mut BookingAttempt, next: AttemptState) -> Result<(), ActionError> {
    let from = attempt.state();
    attempt.transition_to(next).map_err(|error| ActionError::Internal(error.to_string()))?;
    debug!(
        event_name = "booking.attempt.transition",
        from = ?from,
        to = ?next,
        "booking attempt advanced"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{BookingRequest, BookingService};
    use crate::calendar::{AvailabilityCalendar, CalendarConfig};
    use crate::domain::booking::Booking;
    use crate::domain::slot::Slot;
    use crate::errors::ActionError;
    use crate::ids::{FixedClock, SequentialIdGenerator};
    use crate::ledger::{InMemoryReservationLedger, LedgerError, ReservationLedger};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("date")
    }

    fn service_with(ledger: Arc<dyn ReservationLedger>, config: CalendarConfig) -> BookingService {
        instance_with_prefix(ledger, config, "BK")
    }

    fn instance_with_prefix(
        ledger: Arc<dyn ReservationLedger>,
        config: CalendarConfig,
        id_prefix: &str,
    ) -> BookingService {
        BookingService::new(
            AvailabilityCalendar::initialize(&config, today()),
            ledger,
            Arc::new(SequentialIdGenerator::new(id_prefix)),
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap())),
            Duration::from_millis(200),
        )
    }

    fn request(date: &str, time: &str) -> BookingRequest {
        BookingRequest {
            customer_name: Some("Ada Lovelace".to_string()),
            customer_email: Some("ada@example.com".to_string()),
            customer_phone: Some("555-0100".to_string()),
            vehicle_model: Some("Roadster".to_string()),
            appointment_date: Some(date.to_string()),
            appointment_time: Some(time.to_string()),
        }
    }

    fn single_slot() -> CalendarConfig {
        CalendarConfig { days_ahead: 1, start_hour: 9, end_hour: 10 }
    }

    #[tokio::test]
    async fn confirmed_booking_removes_slot_and_reaches_ledger() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let service = service_with(ledger.clone(), single_slot());

        let confirmation =
            service.book_appointment(request("2026-10-20", "09:00")).await.expect("booked");

        assert_eq!(confirmation.booking.id.0, "BK-1");
        assert_eq!(
            confirmation.message,
            "Test drive booked successfully for Ada Lovelace on 2026-10-20 at 09:00 for Roadster"
        );
        assert!(service.list_availability(None, None).is_empty());
        assert_eq!(ledger.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn second_identical_booking_is_slot_unavailable() {
        let service = service_with(Arc::new(InMemoryReservationLedger::default()), single_slot());
        service.book_appointment(request("2026-10-20", "09:00")).await.expect("first");

        let second = service.book_appointment(request("2026-10-20", "09:00")).await;

        assert!(matches!(second, Err(ActionError::SlotUnavailable(_))));
    }

    #[tokio::test]
    async fn missing_fields_are_all_reported() {
        let service = service_with(Arc::new(InMemoryReservationLedger::default()), single_slot());
        let mut incomplete = request("2026-10-20", "09:00");
        incomplete.customer_phone = None;
        incomplete.vehicle_model = Some("   ".to_string());

        let error = service.book_appointment(incomplete).await.expect_err("validation");

        assert_eq!(
            error,
            ActionError::Validation {
                missing_fields: vec!["customerPhone".to_string(), "vehicleModel".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn unknown_or_malformed_date_is_not_found() {
        let service = service_with(Arc::new(InMemoryReservationLedger::default()), single_slot());

        for date in ["2026-12-25", "tomorrow"] {
            let error = service.book_appointment(request(date, "09:00")).await.expect_err(date);
            assert!(matches!(error, ActionError::NotFound(_)), "{date}: {error:?}");
        }
    }

    #[tokio::test]
    async fn unlisted_time_is_slot_unavailable() {
        let service = service_with(Arc::new(InMemoryReservationLedger::default()), single_slot());

        for time in ["18:00", "noon"] {
            let error =
                service.book_appointment(request("2026-10-20", time)).await.expect_err(time);
            assert!(matches!(error, ActionError::SlotUnavailable(_)), "{time}: {error:?}");
        }
    }

    #[tokio::test]
    async fn storage_failure_releases_slot_and_is_retryable() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let service = service_with(ledger.clone(), single_slot());
        ledger.set_unavailable(true);

        let error =
            service.book_appointment(request("2026-10-20", "09:00")).await.expect_err("outage");

        assert!(matches!(error, ActionError::TransientStorage(_)));
        assert!(error.is_retryable());
        assert_eq!(service.list_availability(None, None)["2026-10-20"], vec!["09:00"]);

        ledger.set_unavailable(false);
        service.book_appointment(request("2026-10-20", "09:00")).await.expect("retry succeeds");
    }

    #[tokio::test]
    async fn ledger_conflict_keeps_slot_removed() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let other_instance = instance_with_prefix(ledger.clone(), single_slot(), "A");
        let this_instance = instance_with_prefix(ledger.clone(), single_slot(), "B");
        other_instance.book_appointment(request("2026-10-20", "09:00")).await.expect("elsewhere");

        let error = this_instance
            .book_appointment(request("2026-10-20", "09:00"))
            .await
            .expect_err("stale");

        assert!(matches!(error, ActionError::SlotUnavailable(_)));
        assert!(this_instance.list_availability(None, None).is_empty());
        assert_eq!(ledger.bookings().await.len(), 1);
    }

    #[tokio::test]
    async fn colliding_booking_id_from_another_customer_is_not_confirmed() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let first = instance_with_prefix(ledger.clone(), single_slot(), "BK");
        let second = instance_with_prefix(ledger.clone(), single_slot(), "BK");
        first.book_appointment(request("2026-10-20", "09:00")).await.expect("first");

        let mut other_customer = request("2026-10-20", "09:00");
        other_customer.customer_name = Some("Grace Hopper".to_string());
        let error = second.book_appointment(other_customer).await.expect_err("id collision");

        assert!(matches!(error, ActionError::SlotUnavailable(_)));
        let stored = ledger.bookings().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].customer.name, "Ada Lovelace");
    }

    struct StalledLedger;

    #[async_trait]
    impl ReservationLedger for StalledLedger {
        async fn commit_if_absent(&self, _booking: &Booking) -> Result<(), LedgerError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        async fn occupied_slots(
            &self,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<Slot>, LedgerError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn commit_timeout_is_treated_as_transient_storage_error() {
        let service = service_with(Arc::new(StalledLedger), single_slot());

        let error =
            service.book_appointment(request("2026-10-20", "09:00")).await.expect_err("timeout");

        assert!(matches!(
            error,
            ActionError::TransientStorage(ref message) if message.contains("timed out")
        ));
        assert_eq!(service.list_availability(None, None)["2026-10-20"], vec!["09:00"]);
    }

    #[tokio::test]
    async fn cancelled_commit_returns_slot_to_calendar() {
        let service = BookingService::new(
            AvailabilityCalendar::initialize(&single_slot(), today()),
            Arc::new(StalledLedger),
            Arc::new(SequentialIdGenerator::new("BK")),
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap())),
            Duration::from_secs(60),
        );

        let attempt = tokio::time::timeout(
            Duration::from_millis(50),
            service.book_appointment(request("2026-10-20", "09:00")),
        )
        .await;

        assert!(attempt.is_err(), "commit should still be pending when cancelled");
        assert_eq!(service.list_availability(None, None)["2026-10-20"], vec!["09:00"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_bookings_for_one_slot_confirm_exactly_once() {
        let service = Arc::new(service_with(
            Arc::new(InMemoryReservationLedger::default()),
            CalendarConfig::default(),
        ));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service.book_appointment(request("2026-10-21", "13:00")).await
                })
            })
            .collect();

        let mut confirmed = 0;
        let mut unavailable = 0;
        for handle in handles {
            match handle.await.expect("task") {
                Ok(_) => confirmed += 1,
                Err(ActionError::SlotUnavailable(_)) => unavailable += 1,
                Err(other) => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(confirmed, 1);
        assert_eq!(unavailable, 11);
    }

    #[tokio::test]
    async fn reconcile_drops_slots_held_by_other_instances() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let first = service_with(ledger.clone(), CalendarConfig::default());
        first.book_appointment(request("2026-10-22", "10:00")).await.expect("booked");

        let restarted = service_with(ledger, CalendarConfig::default());
        let removed = restarted.reconcile_with_ledger().await.expect("reconcile");

        assert_eq!(removed, 1);
        let listing = restarted.list_availability(None, None);
        assert!(!listing["2026-10-22"].contains(&"10:00".to_string()));
    }

    #[tokio::test]
    async fn initialize_anchors_on_clock_and_reconciles() {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        service_with(ledger.clone(), single_slot())
            .book_appointment(request("2026-10-20", "09:00"))
            .await
            .expect("booked");

        let service = BookingService::initialize(
            &CalendarConfig { days_ahead: 2, start_hour: 9, end_hour: 10 },
            ledger,
            Arc::new(SequentialIdGenerator::new("BK")),
            Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap())),
            Duration::from_millis(200),
        )
        .await
        .expect("initialize");

        let listing = service.list_availability(None, None);
        assert_eq!(listing.keys().map(String::as_str).collect::<Vec<_>>(), vec!["2026-10-21"]);
        assert!(service.calendar().has_date(today().succ_opt().expect("tomorrow")));
    }
}
