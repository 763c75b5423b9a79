//! Session Module - Zustandsautomat des Anruf-Formulars
//!
//! Dieses Modul verwaltet:
//! - Den Zustand eines Anrufversuchs (`idle`, `calling`, `success`, `error`)
//! - Den Sekunden-Ticker während der Request läuft
//! - Den abgeleiteten Anzeige-Zustand für die Oberfläche

mod controller;
mod state;
mod view;

pub use controller::{AttemptOutcome, CallController, SessionError, SessionEvent, TICK_INTERVAL};
pub use state::{CallStatus, Session, CALL_FAILED_MESSAGE, INVALID_PHONE_NUMBER_MESSAGE};
pub use view::SessionView;
