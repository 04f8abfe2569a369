use std::sync::Arc;

use showroom_agent::{ActionRouter, ActionServices, ToolRegistry};
use showroom_core::booking::BookingService;
use showroom_core::config::AppConfig;
use showroom_core::ids::{Clock, SystemClock, UuidGenerator};
use showroom_core::ledger::LedgerError;
use showroom_db::{connect_with_settings, migrations, DbPool, SqlEnquiryStore, SqlReservationLedger};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub action_router: ActionRouter,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("calendar reconciliation against the booking ledger failed: {0}")]
    Reconcile(#[source] LedgerError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    bootstrap_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn bootstrap_with_clock(
    config: AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let ids = Arc::new(UuidGenerator);
    let booking = BookingService::initialize(
        &config.calendar,
        Arc::new(SqlReservationLedger::new(db_pool.clone())),
        ids.clone(),
        Arc::clone(&clock),
        config.ledger.commit_timeout(),
    )
    .await
    .map_err(BootstrapError::Reconcile)?;
    info!(
        event_name = "system.bootstrap.calendar_ready",
        correlation_id = "bootstrap",
        days_ahead = config.calendar.days_ahead,
        "availability calendar generated and reconciled"
    );

    let services = ActionServices {
        booking: Arc::new(booking),
        enquiries: Arc::new(SqlEnquiryStore::new(db_pool.clone())),
        ids,
        clock,
    };
    let action_router = ActionRouter::new(ToolRegistry::with_showroom_tools(&services));

    Ok(Application { config, db_pool, action_router })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use showroom_core::config::AppConfig;
    use showroom_core::ids::FixedClock;

    use crate::bootstrap::{bootstrap_with_clock, bootstrap_with_config, BootstrapError};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.database.max_connections = 1;
        config
    }

    #[tokio::test]
    async fn bootstrap_reports_unreachable_database() {
        let mut config = memory_config();
        config.database.url = "sqlite:///definitely/missing/dir/showroom.db".to_string();

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }

    #[tokio::test]
    async fn bootstrap_wires_persistent_booking_path() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        let app = bootstrap_with_clock(memory_config(), clock)
            .await
            .expect("bootstrap should succeed against in-memory sqlite");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('booking', 'enquiry')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 2, "bootstrap should apply migrations");

        let response = app
            .action_router
            .dispatch(json!({
                "actionGroup": "showroom",
                "apiPath": "/book-appointment",
                "httpMethod": "POST",
                "parameters": [
                    {"name": "customerName", "value": "Ada"},
                    {"name": "customerEmail", "value": "ada@example.com"},
                    {"name": "customerPhone", "value": "555-0100"},
                    {"name": "vehicleModel", "value": "Roadster"},
                    {"name": "appointmentDate", "value": "2026-10-20"},
                    {"name": "appointmentTime", "value": "09:00"}
                ]
            }))
            .await;
        assert_eq!(response.status_code, 200, "{:?}", response.body);

        let (stored,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM booking
             WHERE appointment_date = '2026-10-20' AND appointment_time = '09:00'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("booking query");
        assert_eq!(stored, 1, "confirmed booking should be durable");
    }

    #[tokio::test]
    async fn restart_reconciles_calendar_with_stored_bookings() {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        let app = bootstrap_with_clock(memory_config(), clock.clone()).await.expect("bootstrap");
        sqlx::query(
            "INSERT INTO booking (booking_id, customer_name, customer_email, customer_phone,
                                  vehicle_model, appointment_date, appointment_time,
                                  created_at, status)
             VALUES ('other-instance', 'Grace', 'grace@example.com', '555-0101', 'Coupe',
                     '2026-10-21', '14:00', '2026-10-19T07:00:00+00:00', 'confirmed')",
        )
        .execute(&app.db_pool)
        .await
        .expect("seed booking");

        let booking = showroom_core::booking::BookingService::initialize(
            &app.config.calendar,
            Arc::new(showroom_db::SqlReservationLedger::new(app.db_pool.clone())),
            Arc::new(showroom_core::ids::UuidGenerator),
            clock,
            app.config.ledger.commit_timeout(),
        )
        .await
        .expect("reinitialize");

        let listing = booking.list_availability(Some("2026-10-21"), Some("2026-10-21"));
        assert!(!listing["2026-10-21"].contains(&"14:00".to_string()));
        assert_eq!(listing["2026-10-21"].len(), 7);
    }
}
