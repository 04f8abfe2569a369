use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use showroom_core::booking::{BookingRequest, BookingService};
use showroom_core::domain::enquiry::{Enquiry, EnquiryId};
use showroom_core::errors::ActionError;
use showroom_core::ids::{Clock, IdGenerator};
use showroom_core::ledger::EnquiryStore;
use showroom_core::params::ParameterMap;
use tracing::{error, info};

pub const ENQUIRY_RECEIVED_MESSAGE: &str =
    "The enquiry has been sent successfully! Someone will be in touch within 24 hours.";

/// Identity of the invocation a tool is running for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub action_group: String,
    pub action_id: String,
    pub correlation_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Alternative identifiers the agent platform may use for this action.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    async fn execute(
        &self,
        context: &ToolContext,
        parameters: ParameterMap,
    ) -> Result<Value, ActionError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        for alias in tool.aliases() {
            self.tools.insert((*alias).to_string(), Arc::clone(&tool));
        }
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn resolve(&self, action_id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(action_id.trim()).cloned()
    }

    /// Canonical tool names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tools.values().map(|tool| tool.name()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registry holding the four showroom actions.
    pub fn with_showroom_tools(services: &ActionServices) -> Self {
        let mut registry = Self::default();
        registry.register(ListAvailabilityTool::new(Arc::clone(&services.booking)));
        registry.register(BookAppointmentTool::new(Arc::clone(&services.booking)));
        registry.register(CaptureEnquiryTool::new(
            Arc::clone(&services.enquiries),
            Arc::clone(&services.ids),
            Arc::clone(&services.clock),
        ));
        registry.register(GetCurrentDateTool::new(Arc::clone(&services.clock)));
        registry
    }
}

/// Collaborators the showroom tools are built from.
#[derive(Clone)]
pub struct ActionServices {
    pub booking: Arc<BookingService>,
    pub enquiries: Arc<dyn EnquiryStore>,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

pub struct ListAvailabilityTool {
    booking: Arc<BookingService>,
}

impl ListAvailabilityTool {
    pub fn new(booking: Arc<BookingService>) -> Self {
        Self { booking }
    }
}

#[async_trait]
impl Tool for ListAvailabilityTool {
    fn name(&self) -> &'static str {
        "ListAvailability"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["/get-available-appointments"]
    }

    async fn execute(
        &self,
        _context: &ToolContext,
        parameters: ParameterMap,
    ) -> Result<Value, ActionError> {
        let start = parameters.get("startDate").map(String::as_str);
        let end = parameters.get("endDate").map(String::as_str);
        let available = self.booking.list_availability(start, end);
        Ok(json!({ "availableAppointments": available }))
    }
}

pub struct BookAppointmentTool {
    booking: Arc<BookingService>,
}

impl BookAppointmentTool {
    pub fn new(booking: Arc<BookingService>) -> Self {
        Self { booking }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &'static str {
        "BookAppointment"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["/book-appointment"]
    }

    async fn execute(
        &self,
        _context: &ToolContext,
        mut parameters: ParameterMap,
    ) -> Result<Value, ActionError> {
        let request = BookingRequest {
            customer_name: parameters.remove("customerName"),
            customer_email: parameters.remove("customerEmail"),
            customer_phone: parameters.remove("customerPhone"),
            vehicle_model: parameters.remove("vehicleModel"),
            appointment_date: parameters.remove("appointmentDate"),
            appointment_time: parameters.remove("appointmentTime"),
        };

        let confirmation = self.booking.book_appointment(request).await?;
        let booking = &confirmation.booking;

        Ok(json!({
            "bookingId": booking.id.0,
            "message": confirmation.message,
            "bookingDetails": {
                "customer": {
                    "name": booking.customer.name,
                    "email": booking.customer.email,
                    "phone": booking.customer.phone,
                },
                "appointment": {
                    "date": booking.slot.date_label(),
                    "time": booking.slot.time_label(),
                    "vehicle": booking.vehicle_model,
                },
            },
        }))
    }
}

pub struct CaptureEnquiryTool {
    store: Arc<dyn EnquiryStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl CaptureEnquiryTool {
    pub fn new(
        store: Arc<dyn EnquiryStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, ids, clock }
    }
}

#[async_trait]
impl Tool for CaptureEnquiryTool {
    fn name(&self) -> &'static str {
        "CaptureEnquiry"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["capture_enquiry_for_follow_up"]
    }

    async fn execute(
        &self,
        context: &ToolContext,
        mut parameters: ParameterMap,
    ) -> Result<Value, ActionError> {
        let email_address =
            parameters.remove("emailAddress").filter(|value| !value.trim().is_empty());
        let text = parameters.remove("enquiry").filter(|value| !value.trim().is_empty());

        let (email_address, text) = match (email_address, text) {
            (Some(email_address), Some(text)) => (email_address, text),
            (email_address, text) => {
                let missing =
                    [("emailAddress", email_address.is_none()), ("enquiry", text.is_none())]
                        .into_iter()
                        .filter(|(_, missing)| *missing)
                        .map(|(name, _)| name);
                return Err(ActionError::missing(missing));
            }
        };

        let enquiry = Enquiry {
            id: EnquiryId(self.ids.next_id()),
            email_address,
            text,
            timestamp: self.clock.now(),
            action_group: context.action_group.clone(),
            action_id: context.action_id.clone(),
        };

        if let Err(store_error) = self.store.append(&enquiry).await {
            error!(
                event_name = "enquiry.capture.failed",
                correlation_id = %context.correlation_id,
                enquiry_id = %enquiry.id.0,
                error = %store_error,
                "enquiry could not be stored"
            );
            return Err(ActionError::TransientStorage(store_error.to_string()));
        }

        info!(
            event_name = "enquiry.capture.stored",
            correlation_id = %context.correlation_id,
            enquiry_id = %enquiry.id.0,
            "enquiry captured for follow-up"
        );
        Ok(json!({ "message": ENQUIRY_RECEIVED_MESSAGE }))
    }
}

pub struct GetCurrentDateTool {
    clock: Arc<dyn Clock>,
}

impl GetCurrentDateTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for GetCurrentDateTool {
    fn name(&self) -> &'static str {
        "GetCurrentDate"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["get_current_date"]
    }

    async fn execute(
        &self,
        _context: &ToolContext,
        _parameters: ParameterMap,
    ) -> Result<Value, ActionError> {
        Ok(json!({ "currentDateTime": self.clock.local_datetime_label() }))
    }
}
