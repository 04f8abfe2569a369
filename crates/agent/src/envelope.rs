use serde::{Deserialize, Serialize};
use serde_json::Value;
use showroom_core::errors::ActionError;

pub const MESSAGE_VERSION: &str = "1.0";

/// Identity of one inbound tool invocation plus the raw envelope it came in.
///
/// The action identifier is read from `actionId`, falling back to `apiPath` and
/// then `function`, since the agent platform addresses API-style and
/// function-style action groups differently. Null or blank identity fields count
/// as absent. Parameters stay in `envelope` for the extractor.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRequest {
    pub message_version: String,
    pub action_group: String,
    pub action_id: String,
    pub http_method: String,
    pub envelope: Value,
}

impl ActionRequest {
    pub fn from_value(envelope: Value) -> Self {
        let text = |key: &str| {
            envelope
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };

        let message_version =
            text("messageVersion").unwrap_or_else(|| MESSAGE_VERSION.to_string());
        let action_group = text("actionGroup").unwrap_or_default();
        let action_id = text("actionId")
            .or_else(|| text("apiPath"))
            .or_else(|| text("function"))
            .unwrap_or_default();
        let http_method = text("httpMethod").unwrap_or_default();

        Self { message_version, action_group, action_id, http_method, envelope }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message_version: String,
    pub action_group: String,
    pub action_id: String,
    pub http_method: String,
    pub status_code: u16,
    pub body: Value,
}

impl ActionResponse {
    pub fn success(request: &ActionRequest, body: Value) -> Self {
        Self::with_status(request, 200, body)
    }

    pub fn failure(request: &ActionRequest, error: &ActionError) -> Self {
        let body = serde_json::to_value(ErrorBody::from(error)).unwrap_or(Value::Null);
        Self::with_status(request, error.status_code(), body)
    }

    fn with_status(request: &ActionRequest, status_code: u16, body: Value) -> Self {
        Self {
            message_version: request.message_version.clone(),
            action_group: request.action_group.clone(),
            action_id: request.action_id.clone(),
            http_method: request.http_method.clone(),
            status_code,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub error_class: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
}

impl From<&ActionError> for ErrorBody {
    fn from(error: &ActionError) -> Self {
        let missing_fields = match error {
            ActionError::Validation { missing_fields } => Some(missing_fields.clone()),
            _ => None,
        };
        Self {
            message: error.to_string(),
            error_class: error.error_class().to_string(),
            retryable: error.is_retryable(),
            missing_fields,
        }
    }
}
