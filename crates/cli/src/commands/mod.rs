pub mod config;
pub mod invoke;
pub mod migrate;
pub mod slots;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use showroom_agent::{ActionRouter, ActionServices, ToolRegistry};
use showroom_core::booking::BookingService;
use showroom_core::config::{AppConfig, LoadOptions};
use showroom_core::ids::{SystemClock, UuidGenerator};
use showroom_db::{connect_with_settings, migrations, DbPool, SqlEnquiryStore, SqlReservationLedger};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// `(error_class, message, exit_code)` for a failed step.
pub(crate) type StepFailure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    fn from_step(command: &str, (error_class, message, exit_code): StepFailure) -> Self {
        Self::failure(command, error_class, message, exit_code)
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })
}

/// Runs `step` on a fresh current-thread runtime.
pub(crate) fn block_on<T, F>(command: &str, step: F) -> Result<T, CommandResult>
where
    F: std::future::Future<Output = Result<T, StepFailure>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        },
    )?;

    runtime.block_on(step).map_err(|failure| CommandResult::from_step(command, failure))
}

pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, StepFailure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

pub(crate) async fn booking_service(
    config: &AppConfig,
    pool: &DbPool,
) -> Result<BookingService, StepFailure> {
    BookingService::initialize(
        &config.calendar,
        Arc::new(SqlReservationLedger::new(pool.clone())),
        Arc::new(UuidGenerator),
        Arc::new(SystemClock),
        config.ledger.commit_timeout(),
    )
    .await
    .map_err(|error| ("reconcile", error.to_string(), 6u8))
}

pub(crate) async fn action_router(
    config: &AppConfig,
    pool: &DbPool,
) -> Result<ActionRouter, StepFailure> {
    let services = ActionServices {
        booking: Arc::new(booking_service(config, pool).await?),
        enquiries: Arc::new(SqlEnquiryStore::new(pool.clone())),
        ids: Arc::new(UuidGenerator),
        clock: Arc::new(SystemClock),
    };
    Ok(ActionRouter::new(ToolRegistry::with_showroom_tools(&services)))
}
