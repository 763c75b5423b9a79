//! HTTP Client für den Call-Placement-Endpoint
//!
//! Sendet genau einen POST pro Anrufversuch. Der Response-Body wird
//! nicht gelesen, es zählt nur ob Transport und Status OK sind.
//! Es gibt keinen eigenen Timeout, der Request wartet so lange
//! wie der Transport es zulässt.

use super::messages::MakeCallRequest;
use crate::config::AppConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),

    #[error("Call placement request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Call placement endpoint answered with status {0}")]
    Status(StatusCode),
}

// ============================================================================
// CALL PLACER
// ============================================================================

/// Stößt einen ausgehenden Anruf beim entfernten Dienst an
#[async_trait]
pub trait CallPlacer: Send + Sync {
    /// `Ok(())` nur wenn der Dienst den Request mit einem OK-Status bestätigt
    async fn place_call(&self, phone_number: &str) -> Result<(), PlacementError>;
}

/// [`CallPlacer`] über HTTP POST mit JSON-Body
pub struct HttpCallPlacer {
    http: reqwest::Client,
    endpoint: Url,
    campaign_id: String,
    list_id: String,
}

impl HttpCallPlacer {
    /// Erstellt einen Placer mit eigenem HTTP Client
    pub fn new(config: &AppConfig) -> Result<Self, PlacementError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PlacementError::ClientBuild)?;

        Ok(Self::with_client(http, config))
    }

    /// Verwendet einen bereits konfigurierten HTTP Client
    pub fn with_client(http: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            campaign_id: config.campaign_id.clone(),
            list_id: config.list_id.clone(),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CallPlacer for HttpCallPlacer {
    async fn place_call(&self, phone_number: &str) -> Result<(), PlacementError> {
        let body = MakeCallRequest::new(
            phone_number.to_string(),
            self.campaign_id.clone(),
            self.list_id.clone(),
        );

        tracing::debug!("POST {} (campaign {})", self.endpoint, self.campaign_id);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlacementError::Status(status));
        }

        tracing::debug!("Call placement accepted with status {}", status);
        Ok(())
    }
}

impl std::fmt::Debug for HttpCallPlacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCallPlacer")
            .field("endpoint", &self.endpoint.as_str())
            .field("campaign_id", &self.campaign_id)
            .field("list_id", &self.list_id)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
