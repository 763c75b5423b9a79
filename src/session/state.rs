//! Session State
//!
//! Der veränderliche Zustand eines einzelnen Anrufversuchs.
//! Alle Übergänge sind reine Methoden ohne Seiteneffekte; Ticker und
//! HTTP-Request verwaltet der [`CallController`](super::CallController).

use serde::Serialize;

// ============================================================================
// USER-FACING MESSAGES
// ============================================================================

/// Meldung wenn beim Absenden keine Telefonnummer vorhanden ist
pub const INVALID_PHONE_NUMBER_MESSAGE: &str = "Please enter a valid phone number";

/// Generische Meldung bei jedem Fehlschlag des Call-Requests
pub const CALL_FAILED_MESSAGE: &str = "Unable to initiate call. Please try again.";

// ============================================================================
// CALL STATUS
// ============================================================================

/// Lebenszyklus eines Anrufversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Formular bereit, kein Request offen
    #[default]
    Idle,
    /// Request läuft, Ticker zählt
    Calling,
    /// Endpoint hat den Anruf angenommen
    Success,
    /// Request fehlgeschlagen
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Calling => "calling",
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }

    /// `success` und `error` bleiben bis zum Reset bestehen
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Success | CallStatus::Error)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Zustand eines Anrufversuchs, so wie ihn die Oberfläche anzeigt
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    phone_number: Option<String>,
    status: CallStatus,
    elapsed_seconds: u64,
    error_message: String,
}

impl Session {
    /// Frische Session: `idle`, keine Nummer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Speichert den aktuellen Kandidaten ohne Validierung
    pub fn set_phone_number(&mut self, value: Option<String>) {
        self.phone_number = value;
    }

    /// Absenden ohne Nummer: Status bleibt, nur die Meldung wird gesetzt
    pub fn reject_missing_number(&mut self) {
        self.error_message = INVALID_PHONE_NUMBER_MESSAGE.to_string();
    }

    /// Wechselt nach `calling` und startet die Zählung bei 0
    pub fn begin_call(&mut self, phone_number: String) {
        self.phone_number = Some(phone_number);
        self.status = CallStatus::Calling;
        self.elapsed_seconds = 0;
        self.error_message.clear();
    }

    /// Eine Sekunde vergangen. Gibt `false` zurück wenn nicht `calling`.
    pub fn tick(&mut self) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        true
    }

    /// `calling` → `success`
    pub fn succeed(&mut self) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.status = CallStatus::Success;
        self.error_message.clear();
        true
    }

    /// `calling` → `error` mit der generischen Meldung
    pub fn fail(&mut self) -> bool {
        if self.status != CallStatus::Calling {
            return false;
        }
        self.status = CallStatus::Error;
        self.error_message = CALL_FAILED_MESSAGE.to_string();
        true
    }

    /// Verwirft Nummer, Zählung und Meldung
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Leere oder nur aus Leerzeichen bestehende Eingaben gelten als fehlend
pub(crate) fn normalize_candidate(candidate: Option<String>) -> Option<String> {
    candidate
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// ============================================================================
// TESTS
// ============================================================================
