use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slot::Slot;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Rejected,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A test-drive booking. Immutable once confirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Booking {
    pub id: BookingId,
    pub customer: Customer,
    pub vehicle_model: String,
    pub slot: Slot,
    pub created_at: DateTime<Utc>,
    pub status: BookingStatus,
}

impl Booking {
    /// True when `other` carries the same id and the same booking content.
    /// `created_at` is ignored so a retried submission still matches.
    pub fn is_replay_of(&self, other: &Booking) -> bool {
        self.id == other.id
            && self.customer == other.customer
            && self.vehicle_model == other.vehicle_model
            && self.slot == other.slot
            && self.status == other.status
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackReason {
    SlotUnavailable,
    TransientStorageError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Requested,
    Validated,
    Reserved,
    Confirmed,
    RolledBack(RollbackReason),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::RolledBack(_))
    }
}

/// Lifecycle of a single `BookAppointment` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingAttempt {
    state: AttemptState,
}

impl Default for BookingAttempt {
    fn default() -> Self {
        Self { state: AttemptState::Requested }
    }
}

impl BookingAttempt {
    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn can_transition_to(&self, next: AttemptState) -> bool {
        matches!(
            (self.state, next),
            (AttemptState::Requested, AttemptState::Validated)
                | (AttemptState::Validated, AttemptState::Reserved)
                | (AttemptState::Reserved, AttemptState::Confirmed)
                | (AttemptState::Reserved, AttemptState::RolledBack(_))
        )
    }

    pub fn transition_to(&mut self, next: AttemptState) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.state = next;
            return Ok(());
        }

        Err(DomainError::InvalidAttemptTransition { from: self.state, to: next })
    }
}
