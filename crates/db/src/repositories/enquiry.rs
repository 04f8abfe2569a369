use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use showroom_core::domain::enquiry::{Enquiry, EnquiryId};
use showroom_core::ledger::{EnquiryStore, StoreError};

use super::RepositoryError;
use crate::DbPool;

pub struct SqlEnquiryStore {
    pool: DbPool,
}

impl SqlEnquiryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Enquiry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT enquiry_id, email_address, enquiry, timestamp, action_group, action_id
             FROM enquiry ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_enquiry).collect()
    }
}

#[async_trait]
impl EnquiryStore for SqlEnquiryStore {
    async fn append(&self, enquiry: &Enquiry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO enquiry (enquiry_id, email_address, enquiry, timestamp,
                                  action_group, action_id)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&enquiry.id.0)
        .bind(&enquiry.email_address)
        .bind(&enquiry.text)
        .bind(enquiry.timestamp.to_rfc3339())
        .bind(&enquiry.action_group)
        .bind(&enquiry.action_id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}

fn row_to_enquiry(row: &sqlx::sqlite::SqliteRow) -> Result<Enquiry, RepositoryError> {
    let id: String =
        row.try_get("enquiry_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email_address: String =
        row.try_get("email_address").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let text: String = row.try_get("enquiry").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let timestamp_str: String =
        row.try_get("timestamp").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_group: String =
        row.try_get("action_group").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let action_id: String =
        row.try_get("action_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp: {e}")))?;

    Ok(Enquiry { id: EnquiryId(id), email_address, text, timestamp, action_group, action_id })
}
