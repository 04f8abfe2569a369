use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnquiryId(pub String);

/// A customer enquiry captured for human follow-up. Append-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub email_address: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub action_group: String,
    pub action_id: String,
}
