//! Request-Body für den Call-Placement-Endpoint

use serde::Serialize;

/// Fordert einen ausgehenden Anruf des KI-Assistenten an
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MakeCallRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    #[serde(rename = "campaignId")]
    pub campaign_id: String,
    #[serde(rename = "listId")]
    pub list_id: String,
}

impl MakeCallRequest {
    pub fn new(phone_number: String, campaign_id: String, list_id: String) -> Self {
        Self {
            phone_number,
            campaign_id,
            list_id,
        }
    }
}
