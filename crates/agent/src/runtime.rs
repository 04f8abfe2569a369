use std::sync::Arc;

use serde_json::Value;
use showroom_core::errors::ActionError;
use showroom_core::params::ParameterExtractor;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::envelope::{ActionRequest, ActionResponse};
use crate::tools::{ToolContext, ToolRegistry};

/// Routes one envelope to one tool and always answers with an envelope.
///
/// Tools run on their own task so a panic inside a handler is reported as an
/// `internal_error` response instead of unwinding into the caller.
#[derive(Clone)]
pub struct ActionRouter {
    registry: Arc<ToolRegistry>,
    extractor: Arc<ParameterExtractor>,
}

impl ActionRouter {
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_extractor(registry, ParameterExtractor::default())
    }

    pub fn with_extractor(registry: ToolRegistry, extractor: ParameterExtractor) -> Self {
        Self { registry: Arc::new(registry), extractor: Arc::new(extractor) }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, envelope: Value) -> ActionResponse {
        let request = ActionRequest::from_value(envelope);
        let correlation_id = Uuid::new_v4().to_string();

        let outcome = self.run(&request, &correlation_id).await;
        let response = match &outcome {
            Ok(body) => ActionResponse::success(&request, body.clone()),
            Err(action_error) => ActionResponse::failure(&request, action_error),
        };

        match &outcome {
            Ok(_) => info!(
                event_name = "action.dispatch.completed",
                correlation_id = %correlation_id,
                action_group = %request.action_group,
                action_id = %request.action_id,
                status_code = response.status_code,
                "action completed"
            ),
            Err(action_error) if action_error.status_code() >= 500 => error!(
                event_name = "action.dispatch.failed",
                correlation_id = %correlation_id,
                action_group = %request.action_group,
                action_id = %request.action_id,
                status_code = response.status_code,
                error_class = action_error.error_class(),
                error = %action_error,
                "action failed"
            ),
            Err(action_error) => warn!(
                event_name = "action.dispatch.rejected",
                correlation_id = %correlation_id,
                action_group = %request.action_group,
                action_id = %request.action_id,
                status_code = response.status_code,
                error_class = action_error.error_class(),
                error = %action_error,
                "action rejected"
            ),
        }

        response
    }

    async fn run(
        &self,
        request: &ActionRequest,
        correlation_id: &str,
    ) -> Result<Value, ActionError> {
        let tool = self
            .registry
            .resolve(&request.action_id)
            .ok_or_else(|| ActionError::UnsupportedAction(request.action_id.clone()))?;

        let parameters = self.extractor.extract(&request.envelope);
        let context = ToolContext {
            action_group: request.action_group.clone(),
            action_id: request.action_id.clone(),
            correlation_id: correlation_id.to_string(),
        };

        let handle = tokio::spawn(async move { tool.execute(&context, parameters).await });
        match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_panic() => {
                Err(ActionError::Internal("action handler panicked".to_string()))
            }
            Err(join_error) => Err(ActionError::Internal(join_error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::{json, Value};
    use showroom_core::booking::BookingService;
    use showroom_core::calendar::{AvailabilityCalendar, CalendarConfig};
    use showroom_core::errors::ActionError;
    use showroom_core::ids::{FixedClock, SequentialIdGenerator};
    use showroom_core::domain::booking::Booking;
    use showroom_core::domain::slot::Slot;
    use showroom_core::ledger::{
        InMemoryEnquiryStore, InMemoryReservationLedger, LedgerError, ReservationLedger,
    };
    use showroom_core::params::ParameterMap;

    use super::ActionRouter;
    use crate::tools::{ActionServices, Tool, ToolContext, ToolRegistry};

    struct Fixture {
        router: ActionRouter,
        ledger: Arc<InMemoryReservationLedger>,
        enquiries: Arc<InMemoryEnquiryStore>,
    }

    fn fixture(config: CalendarConfig) -> Fixture {
        let ledger = Arc::new(InMemoryReservationLedger::default());
        let enquiries = Arc::new(InMemoryEnquiryStore::default());
        let router = router_over(config, ledger.clone(), enquiries.clone());
        Fixture { router, ledger, enquiries }
    }

    fn router_over(
        config: CalendarConfig,
        ledger: Arc<dyn ReservationLedger>,
        enquiries: Arc<InMemoryEnquiryStore>,
    ) -> ActionRouter {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()));
        let booking = BookingService::new(
            AvailabilityCalendar::initialize(&config, today),
            ledger,
            Arc::new(SequentialIdGenerator::new("BK")),
            clock.clone(),
            Duration::from_secs(1),
        );
        let services = ActionServices {
            booking: Arc::new(booking),
            enquiries,
            ids: Arc::new(SequentialIdGenerator::new("ENQ")),
            clock,
        };
        ActionRouter::new(ToolRegistry::with_showroom_tools(&services))
    }

    fn single_slot() -> CalendarConfig {
        CalendarConfig { days_ahead: 1, start_hour: 9, end_hour: 10 }
    }

    fn booking_envelope(date: &str, time: &str) -> Value {
        json!({
            "actionGroup": "showroom",
            "apiPath": "/book-appointment",
            "httpMethod": "POST",
            "requestBody": {
                "content": {
                    "application/json": {
                        "properties": [
                            {"name": "customerName", "value": "Ada"},
                            {"name": "customerEmail", "value": "ada@example.com"},
                            {"name": "customerPhone", "value": "555-0100"},
                            {"name": "vehicleModel", "value": "Roadster"},
                            {"name": "appointmentDate", "value": date},
                            {"name": "appointmentTime", "value": time}
                        ]
                    }
                }
            }
        })
    }

    fn list_envelope() -> Value {
        json!({
            "actionGroup": "showroom",
            "apiPath": "/get-available-appointments",
            "httpMethod": "GET"
        })
    }

    #[tokio::test]
    async fn single_slot_scenario_books_once_then_reports_unavailable() {
        let fixture = fixture(single_slot());

        let listed = fixture.router.dispatch(list_envelope()).await;
        assert_eq!(listed.status_code, 200);
        assert_eq!(listed.body, json!({"availableAppointments": {"2026-10-20": ["09:00"]}}));

        let booked = fixture.router.dispatch(booking_envelope("2026-10-20", "09:00")).await;
        assert_eq!(booked.status_code, 200);
        assert_eq!(booked.action_id, "/book-appointment");
        assert_eq!(booked.body["bookingId"], "BK-1");

        let relisted = fixture.router.dispatch(list_envelope()).await;
        assert_eq!(relisted.body, json!({"availableAppointments": {}}));

        let again = fixture.router.dispatch(booking_envelope("2026-10-20", "09:00")).await;
        assert_eq!(again.status_code, 400);
        assert_eq!(again.body["errorClass"], "slot_unavailable");
        assert_eq!(fixture.ledger.bookings().await.len(), 1);

        let enquiry = fixture
            .router
            .dispatch(json!({
                "actionGroup": "showroom",
                "function": "capture_enquiry_for_follow_up",
                "parameters": [
                    {"name": "emailAddress", "value": "b@y.com"},
                    {"name": "enquiry", "value": "test"}
                ]
            }))
            .await;
        assert_eq!(enquiry.status_code, 200);
        let message = enquiry.body["message"].as_str().unwrap_or_default();
        assert!(message.contains("successfully"), "{message}");
        let stored = fixture.enquiries.enquiries().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text, "test");
    }

    #[tokio::test]
    async fn list_availability_honours_bounds_from_any_shape() {
        let fixture = fixture(CalendarConfig::default());

        let response = fixture
            .router
            .dispatch(json!({
                "actionId": "ListAvailability",
                "parameters": [{"name": "startDate", "value": "2026-10-22"}],
                "body": "{\"endDate\": \"2026-10-23\"}"
            }))
            .await;

        let dates: Vec<&String> = response.body["availableAppointments"]
            .as_object()
            .map(|dates| dates.keys().collect())
            .unwrap_or_default();
        assert_eq!(dates, vec!["2026-10-22", "2026-10-23"]);
    }

    #[tokio::test]
    async fn storage_outage_is_retryable_and_restores_the_slot() {
        let fixture = fixture(single_slot());
        fixture.ledger.set_unavailable(true);

        let failed = fixture.router.dispatch(booking_envelope("2026-10-20", "09:00")).await;
        assert_eq!(failed.status_code, 500);
        assert_eq!(failed.body["errorClass"], "transient_storage_error");
        assert_eq!(failed.body["retryable"], true);

        let listed = fixture.router.dispatch(list_envelope()).await;
        assert_eq!(listed.body, json!({"availableAppointments": {"2026-10-20": ["09:00"]}}));

        fixture.ledger.set_unavailable(false);
        let retried = fixture.router.dispatch(booking_envelope("2026-10-20", "09:00")).await;
        assert_eq!(retried.status_code, 200);
    }

    #[tokio::test]
    async fn missing_booking_fields_are_all_reported() {
        let fixture = fixture(single_slot());

        let response = fixture
            .router
            .dispatch(json!({
                "actionId": "BookAppointment",
                "body": {
                    "customerName": "Ada",
                    "customerEmail": "ada@example.com",
                    "appointmentDate": "2026-10-20",
                    "appointmentTime": "09:00"
                }
            }))
            .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.body["missingFields"], json!(["customerPhone", "vehicleModel"]));
    }

    #[tokio::test]
    async fn unknown_action_is_unsupported_and_echoes_identity() {
        let fixture = fixture(single_slot());

        let response = fixture
            .router
            .dispatch(json!({
                "actionGroup": "showroom",
                "apiPath": "/inventory",
                "httpMethod": "GET"
            }))
            .await;

        assert_eq!(response.status_code, 400);
        assert_eq!(response.action_group, "showroom");
        assert_eq!(response.action_id, "/inventory");
        assert_eq!(response.http_method, "GET");
        assert_eq!(response.message_version, "1.0");
        assert_eq!(response.body["errorClass"], "unsupported_action");
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &'static str {
            "Explode"
        }

        async fn execute(
            &self,
            _context: &ToolContext,
            _parameters: ParameterMap,
        ) -> Result<Value, ActionError> {
            panic!("handler bug");
        }
    }

    #[tokio::test]
    async fn panicking_handler_becomes_internal_error() {
        let mut registry = ToolRegistry::default();
        registry.register(PanickingTool);
        let router = ActionRouter::new(registry);

        let response = router.dispatch(json!({"actionId": "Explode"})).await;
        let follow_up = router.dispatch(json!({"actionId": "Explode"})).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body["errorClass"], "internal_error");
        assert_eq!(response.body["retryable"], false);
        assert_eq!(follow_up.status_code, 500, "router keeps serving after a panic");
    }

    struct PanickingLedger;

    #[async_trait]
    impl ReservationLedger for PanickingLedger {
        async fn commit_if_absent(&self, _booking: &Booking) -> Result<(), LedgerError> {
            panic!("ledger driver bug");
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
    async fn ledger_panic_during_commit_returns_slot_to_calendar() {
        let router = router_over(
            single_slot(),
            Arc::new(PanickingLedger),
            Arc::new(InMemoryEnquiryStore::default()),
        );

        let booked = router.dispatch(booking_envelope("2026-10-20", "09:00")).await;
        let listing = router.dispatch(list_envelope()).await;

        assert_eq!(booked.status_code, 500);
        assert_eq!(booked.body["errorClass"], "internal_error");
        assert_eq!(
            listing.body,
            json!({"availableAppointments": {"2026-10-20": ["09:00"]}}),
            "slot must be bookable again after the failed commit"
        );
    }
}
