use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use planner_core::PlanRequest;
use planner_core::model::SessionStatus;

use crate::config::PlannerConfig;
use crate::error::TransportError;

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

/// Body returned by `POST /api/generate_plan`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub plan: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub current_date: Option<String>,
    #[serde(default)]
    pub tips: Option<Vec<String>>,
}

impl GenerationResponse {
    /// The service-reported error, if present and non-empty.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Body of `POST /api/update_session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdateRequest {
    pub date: String,
    pub subject: String,
    pub topic: Option<String>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusUpdateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// A plan stored by the service, as listed by `GET /api/plans`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemotePlanRecord {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub subjects: Option<String>,
    #[serde(default)]
    pub generated_plan: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

//
// ─── CONTRACT ──────────────────────────────────────────────────────────────────
//

/// The remote study planner.
#[async_trait]
pub trait PlannerApi: Send + Sync {
    /// Ask the service to generate a plan.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for network, status or decoding failures. A
    /// service-level `error` field is returned inside the response instead.
    async fn generate_plan(&self, request: &PlanRequest)
    -> Result<GenerationResponse, TransportError>;

    /// Report a session status change.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for network, status or decoding failures.
    async fn update_session(
        &self,
        request: &StatusUpdateRequest,
    ) -> Result<StatusUpdateResponse, TransportError>;

    /// List plans the service has stored.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` for network, status or decoding failures.
    async fn list_plans(&self) -> Result<Vec<RemotePlanRecord>, TransportError>;
}

//
// ─── HTTP ──────────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct HttpPlannerApi {
    client: Client,
    config: PlannerConfig,
}

impl HttpPlannerApi {
    /// Build a client honoring the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be constructed.
    pub fn new(config: PlannerConfig) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }
}

#[async_trait]
impl PlannerApi for HttpPlannerApi {
    async fn generate_plan(
        &self,
        request: &PlanRequest,
    ) -> Result<GenerationResponse, TransportError> {
        let url = self.config.endpoint("/api/generate_plan");
        tracing::info!(%url, subjects = request.subjects().len(), "requesting plan");

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<GenerationResponse>(&body) {
            Ok(parsed) if status.is_success() || parsed.error_message().is_some() => Ok(parsed),
            Ok(_) => Err(TransportError::HttpStatus(status)),
            Err(_) if !status.is_success() => Err(TransportError::HttpStatus(status)),
            Err(err) => Err(TransportError::Decode(err)),
        }
    }

    async fn update_session(
        &self,
        request: &StatusUpdateRequest,
    ) -> Result<StatusUpdateResponse, TransportError> {
        let url = self.config.endpoint("/api/update_session");
        tracing::debug!(%url, subject = %request.subject, status = %request.status, "reporting session status");

        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn list_plans(&self) -> Result<Vec<RemotePlanRecord>, TransportError> {
        let url = self.config.endpoint("/api/plans");
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
