pub mod booking;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ids;
pub mod ledger;
pub mod params;

pub use booking::{BookingConfirmation, BookingRequest, BookingService, REQUIRED_BOOKING_FIELDS};
pub use calendar::{AvailabilityCalendar, AvailabilitySnapshot, CalendarConfig, CalendarError};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::booking::{
    AttemptState, Booking, BookingAttempt, BookingId, BookingStatus, Customer, RollbackReason,
};
pub use domain::enquiry::{Enquiry, EnquiryId};
pub use domain::slot::Slot;
pub use errors::{ActionError, DomainError};
pub use ids::{Clock, FixedClock, IdGenerator, SequentialIdGenerator, SystemClock, UuidGenerator};
pub use ledger::{
    EnquiryStore, InMemoryEnquiryStore, InMemoryReservationLedger, LedgerError, ReservationLedger,
    StoreError,
};
pub use params::{ExtractionStrategy, ParameterExtractor, ParameterMap};
