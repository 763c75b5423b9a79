//! Abgeleiteter Anzeige-Zustand für die Oberfläche

use super::state::{CallStatus, Session};
use serde::Serialize;

pub const CALL_BUTTON_LABEL: &str = "Call Now";
pub const SUCCESS_TITLE: &str = "Call Initiated!";
pub const SUCCESS_DETAIL: &str = "You will receive a call from our AI assistant shortly.";
pub const RESET_BUTTON_LABEL: &str = "Make Another Call";

/// Alles was das Formular rendern muss, ohne selbst Logik abzuleiten
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: CallStatus,
    pub elapsed_seconds: u64,
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub can_edit: bool,
    pub can_submit: bool,
    pub can_reset: bool,
    pub button_label: String,
    pub show_success: bool,
    pub success_title: &'static str,
    pub success_detail: &'static str,
    pub reset_label: &'static str,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let status = session.status();
        let calling = status == CallStatus::Calling;

        let button_label = if calling {
            format!("Calling... {}s", session.elapsed_seconds())
        } else {
            CALL_BUTTON_LABEL.to_string()
        };

        let error_message = Some(session.error_message())
            .filter(|message| !message.is_empty())
            .map(str::to_string);

        Self {
            status,
            elapsed_seconds: session.elapsed_seconds(),
            phone_number: session.phone_number().map(str::to_string),
            error_message,
            can_edit: status == CallStatus::Idle,
            can_submit: status == CallStatus::Idle
                && session.phone_number().is_some_and(|n| !n.is_empty()),
            can_reset: status.is_terminal(),
            button_label,
            show_success: status == CallStatus::Success,
            success_title: SUCCESS_TITLE,
            success_detail: SUCCESS_DETAIL,
            reset_label: RESET_BUTTON_LABEL,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
