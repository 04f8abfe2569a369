use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use tracing::debug;

use showroom_core::domain::booking::{Booking, BookingId, BookingStatus, Customer};
use showroom_core::domain::slot::{format_date, Slot};
use showroom_core::ledger::{LedgerError, ReservationLedger};

use super::RepositoryError;
use crate::DbPool;

/// Reservation ledger backed by the `booking` table.
///
/// The table's `UNIQUE(appointment_date, appointment_time)` constraint is the
/// cross-process guard against double booking.
pub struct SqlReservationLedger {
    pool: DbPool,
}

impl SqlReservationLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        let row = sqlx::query(
            "SELECT booking_id, customer_name, customer_email, customer_phone, vehicle_model,
                    appointment_date, appointment_time, created_at, status
             FROM booking WHERE booking_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, booking: &Booking) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO booking (booking_id, customer_name, customer_email, customer_phone,
                                  vehicle_model, appointment_date, appointment_time,
                                  created_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(booking_id) DO NOTHING",
        )
        .bind(&booking.id.0)
        .bind(&booking.customer.name)
        .bind(&booking.customer.email)
        .bind(&booking.customer.phone)
        .bind(&booking.vehicle_model)
        .bind(booking.slot.date_label())
        .bind(booking.slot.time_label())
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// A replay of an already-stored booking id is accepted only when the stored
    /// record matches the submitted booking.
    async fn resolve_replay(&self, booking: &Booking) -> Result<(), LedgerError> {
        match self.find_by_id(&booking.id).await? {
            Some(existing) if existing.is_replay_of(booking) => {
                debug!(
                    event_name = "ledger.commit.replayed",
                    booking_id = %booking.id.0,
                    "booking id already committed with identical details"
                );
                Ok(())
            }
            _ => Err(LedgerError::Conflict),
        }
    }
}

#[async_trait]
impl ReservationLedger for SqlReservationLedger {
    async fn commit_if_absent(&self, booking: &Booking) -> Result<(), LedgerError> {
        match self.insert(booking).await {
            Ok(0) => self.resolve_replay(booking).await,
            Ok(_) => Ok(()),
            Err(error) if error.is_unique_violation() => self.resolve_replay(booking).await,
            Err(error) => Err(error.into()),
        }
    }

    async fn occupied_slots(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Slot>, LedgerError> {
        let rows = sqlx::query(
            "SELECT appointment_date, appointment_time
             FROM booking
             WHERE status = ? AND appointment_date >= ? AND appointment_date <= ?
             ORDER BY appointment_date, appointment_time",
        )
        .bind(BookingStatus::Confirmed.as_str())
        .bind(format_date(from))
        .bind(format_date(to))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let mut slots = Vec::with_capacity(rows.len());
        for row in &rows {
            slots.push(row_to_slot(row)?);
        }
        Ok(slots)
    }
}

fn row_to_slot(row: &sqlx::sqlite::SqliteRow) -> Result<Slot, RepositoryError> {
    let date: String =
        row.try_get("appointment_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let time: String =
        row.try_get("appointment_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Slot::parse(&date, &time)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid stored slot `{date} {time}`")))
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking, RepositoryError> {
    let id: String =
        row.try_get("booking_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String =
        row.try_get("customer_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("customer_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phone: String =
        row.try_get("customer_phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let vehicle_model: String =
        row.try_get("vehicle_model").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid created_at: {e}")))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown booking status `{status_str}`")))?;

    Ok(Booking {
        id: BookingId(id),
        customer: Customer { name, email, phone },
        vehicle_model,
        slot: row_to_slot(row)?,
        created_at,
        status,
    })
}
