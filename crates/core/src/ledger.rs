//! Contracts for the durable collaborators behind the booking flow, plus
//! in-memory implementations used by tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::enquiry::Enquiry;
use crate::domain::slot::Slot;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("slot is already held by another booking")]
    Conflict,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// System of record for confirmed bookings.
///
/// `commit_if_absent` must succeed only when no record occupies the booking's
/// slot, and must be idempotent on the booking id: re-submitting a booking that
/// was already committed succeeds without writing a second record.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    async fn commit_if_absent(&self, booking: &Booking) -> Result<(), LedgerError>;

    /// Slots held by confirmed bookings with dates in `from..=to`.
    async fn occupied_slots(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, LedgerError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("enquiry store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait EnquiryStore: Send + Sync {
    async fn append(&self, enquiry: &Enquiry) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReservationLedger {
    bookings: RwLock<HashMap<String, Booking>>,
    unavailable: AtomicBool,
}

impl InMemoryReservationLedger {
    /// Simulates a storage outage: every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        let mut bookings: Vec<Booking> = self.bookings.read().await.values().cloned().collect();
        bookings.sort_by_key(|booking| booking.slot);
        bookings
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReservationLedger for InMemoryReservationLedger {
    async fn commit_if_absent(&self, booking: &Booking) -> Result<(), LedgerError> {
        self.check_available()?;
        let mut bookings = self.bookings.write().await;

        if let Some(existing) = bookings.get(&booking.id.0) {
            return if existing.is_replay_of(booking) { Ok(()) } else { Err(LedgerError::Conflict) };
        }
        let occupied = bookings.values().any(|existing| {
            existing.slot == booking.slot && existing.status == BookingStatus::Confirmed
        });
        if occupied {
            return Err(LedgerError::Conflict);
        }

        bookings.insert(booking.id.0.clone(), booking.clone());
        Ok(())
    }

    async fn occupied_slots(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, LedgerError> {
        self.check_available()?;
        let bookings = self.bookings.read().await;
        let mut slots: Vec<Slot> = bookings
            .values()
            .filter(|booking| booking.status == BookingStatus::Confirmed)
            .map(|booking| booking.slot)
            .filter(|slot| slot.date >= from && slot.date <= to)
            .collect();
        slots.sort();
        Ok(slots)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEnquiryStore {
    enquiries: RwLock<Vec<Enquiry>>,
    unavailable: AtomicBool,
}

impl InMemoryEnquiryStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn enquiries(&self) -> Vec<Enquiry> {
        self.enquiries.read().await.clone()
    }
}

#[async_trait]
impl EnquiryStore for InMemoryEnquiryStore {
    async fn append(&self, enquiry: &Enquiry) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        self.enquiries.write().await.push(enquiry.clone());
        Ok(())
    }
}
