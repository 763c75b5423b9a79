//! Placement Module - HTTP Client für den Call-Placement-Endpoint
//!
//! Dieses Modul kapselt den einzigen Wire-Contract der Anwendung:
//! - POST an den konfigurierten Endpoint
//! - JSON-Body mit Telefonnummer und festen Routing-Parametern
//! - Erfolg ausschließlich anhand des HTTP-Status
//!

mod client;
mod messages;

pub use client::{CallPlacer, HttpCallPlacer, PlacementError};
pub use messages::MakeCallRequest;
