//! Hexa Call - Rückruf-Formular für den Hexa AI Assistenten
//!
//! Der Benutzer gibt seine Telefonnummer ein, die App fordert beim
//! Call-Placement-Endpoint einen Anruf des KI-Assistenten an:
//! - Zustandsautomat für genau einen Anrufversuch pro Session
//! - Sekunden-Anzeige solange der Request offen ist
//! - HTTP Client für den Endpoint (JSON POST)
//! - Tauri-Oberfläche (Feature `desktop`)

pub mod config;
pub mod placement;
pub mod session;

use anyhow::Context;
use config::AppConfig;
use placement::HttpCallPlacer;
use session::CallController;
use std::sync::Arc;

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// Application State, wird von der Tauri-Shell verwaltet
pub struct AppState {
    controller: Arc<CallController>,
    config: AppConfig,
}

impl AppState {
    /// Erstellt HTTP Client und Controller für die gegebene Konfiguration
    pub fn init(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        tracing::info!("Initializing Hexa Call...");

        let placer = HttpCallPlacer::new(&config).context("Failed to create call placer")?;
        tracing::info!("Call placement endpoint: {}", placer.endpoint());

        Ok(Arc::new(Self {
            controller: Arc::new(CallController::new(Arc::new(placer))),
            config,
        }))
    }

    pub fn controller(&self) -> &Arc<CallController> {
        &self.controller
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Logging initialisieren (`RUST_LOG` hat Vorrang)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hexa_call_lib=debug,reqwest=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(feature = "desktop")]
pub use shell::run;

#[cfg(feature = "desktop")]
mod shell {
    use super::*;
    use crate::session::{SessionError, SessionEvent, SessionView};
    use tauri::{AppHandle, Emitter, Manager, State};
    use tokio::sync::broadcast::error::RecvError;

    // ========================================================================
    // TAURI COMMANDS - SESSION
    // ========================================================================

    /// Gibt den aktuellen Anzeige-Zustand zurück
    #[tauri::command]
    async fn get_session(state: State<'_, Arc<AppState>>) -> Result<SessionView, String> {
        Ok(state.controller.view())
    }

    /// Übernimmt den Wert des Telefonnummer-Eingabefelds
    #[tauri::command]
    async fn set_phone_number(
        phone_number: Option<String>,
        state: State<'_, Arc<AppState>>,
    ) -> Result<SessionView, String> {
        Ok(state.controller.set_phone_number(phone_number))
    }

    /// "Call Now": fordert den Anruf mit der aktuellen Nummer an
    ///
    /// Kehrt erst zurück wenn der Request aufgelöst ist. Die Zwischenstände
    /// kommen als `session:changed` Events.
    #[tauri::command]
    async fn submit_call(state: State<'_, Arc<AppState>>) -> Result<SessionView, String> {
        let controller = Arc::clone(&state.controller);

        match controller.submit_current().await {
            Ok(outcome) => {
                tracing::info!("Call attempt finished: {:?}", outcome);
                Ok(controller.view())
            }
            // Meldung steht bereits in der Session
            Err(SessionError::MissingPhoneNumber) => Ok(controller.view()),
            Err(e) => Err(e.to_string()),
        }
    }

    /// "Make Another Call": zurück zum leeren Formular
    #[tauri::command]
    async fn reset_session(state: State<'_, Arc<AppState>>) -> Result<SessionView, String> {
        Ok(state.controller.reset())
    }

    // ========================================================================
    // EVENT FORWARDING
    // ========================================================================

    /// Leitet Session-Events an das Frontend weiter
    fn forward_session_events(state: &AppState, app_handle: AppHandle) {
        let mut events = state.controller.subscribe();

        tauri::async_runtime::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Changed(view)) => {
                        let _ = app_handle.emit("session:changed", &view);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Frontend missed {} session events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    // ========================================================================
    // TAURI APP RUNNER
    // ========================================================================

    /// Startet die Tauri-Anwendung
    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        init_tracing();

        tauri::Builder::default()
            .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
                if let Some(window) = app.get_webview_window("main") {
                    let _ = window.set_focus();
                }
            }))
            .plugin(tauri_plugin_opener::init())
            .setup(|app| {
                let config = AppConfig::load()?;
                let state = AppState::init(config)?;

                forward_session_events(&state, app.handle().clone());

                // State im Tauri-App registrieren
                app.manage(state);

                Ok(())
            })
            .invoke_handler(tauri::generate_handler![
                get_session,
                set_phone_number,
                submit_call,
                reset_session,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}

// ============================================================================
// TESTS
// ============================================================================
