//! Typed calls to the medication backend.
//!
//! The backend runs on a free tier and sleeps when idle, so both endpoints go
//! through the retry engine with budgets sized for a cold start.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{
    ColdStartClient, ColdStartError, FetchResult, FetchStatus, RequestConfig, ReqwestTransport,
    Result, RetryOptions, Transport,
};

pub const MAX_MEDICINE_NAME_LEN: usize = 100;

/// Drug information returned by `POST /medicine/info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicineInfo {
    pub use_case: String,
    pub composition: String,
    pub side_effects: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    /// Review shares keyed by rating (`excellent`, `average`, `poor`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Body of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub status: HealthStatus,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Serialize)]
struct MedicineRequest<'a> {
    name: &'a str,
}

/// Budget for drug lookups: a full cold start.
pub fn medicine_info_options() -> RetryOptions {
    RetryOptions::default()
        .with_max_retry_time_ms(60_000)
        .with_initial_retry_delay_ms(1_000)
        .with_max_retry_delay_ms(5_000)
}

/// Budget for health probes: short, so a sleeping backend reports quickly.
pub fn health_options() -> RetryOptions {
    RetryOptions::default()
        .with_max_retry_time_ms(10_000)
        .with_initial_retry_delay_ms(500)
}

/// Options for one endpoint: the client's own timing when it was configured,
/// otherwise `preset`'s. Hooks and the cancellation token always come from
/// the client.
fn endpoint_options(client: &RetryOptions, preset: RetryOptions) -> RetryOptions {
    if !client.has_default_timing() {
        return client.clone();
    }
    RetryOptions {
        on_retry: client.on_retry.clone(),
        on_backend_waking: client.on_backend_waking.clone(),
        cancel: client.cancel.clone(),
        ..preset
    }
}

/// Client for the medication backend.
#[derive(Clone, Debug)]
pub struct BackendClient<Tr: Transport = ReqwestTransport> {
    client: ColdStartClient<Tr>,
    medicine_info_options: RetryOptions,
    health_options: RetryOptions,
}

impl BackendClient<ReqwestTransport> {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::from_client(ColdStartClient::new(base_url))
    }

    /// Reads `BACKEND_URL`, see [`ColdStartClient::from_env`].
    pub fn from_env() -> Result<Self> {
        ColdStartClient::from_env().map(Self::from_client)
    }
}

impl<Tr: Transport> BackendClient<Tr> {
    /// Wraps `client`.
    ///
    /// When the client still carries default timing, the endpoints use
    /// [`medicine_info_options`] and [`health_options`]; timing configured on
    /// the client (for example through `COLDSTART_*` variables) wins over them.
    pub fn from_client(client: ColdStartClient<Tr>) -> Self {
        let medicine_info_options = endpoint_options(client.options(), medicine_info_options());
        let health_options = endpoint_options(client.options(), health_options());
        Self {
            client,
            medicine_info_options,
            health_options,
        }
    }

    pub fn with_medicine_info_options(mut self, options: RetryOptions) -> Self {
        self.medicine_info_options = options;
        self
    }

    pub fn with_health_options(mut self, options: RetryOptions) -> Self {
        self.health_options = options;
        self
    }

    pub fn client(&self) -> &ColdStartClient<Tr> {
        &self.client
    }

    /// Looks up a medicine by name.
    ///
    /// The name is sent as given. Blank names and names longer than
    /// [`MAX_MEDICINE_NAME_LEN`] characters are rejected without a request.
    pub async fn medicine_info(&self, name: &str) -> Result<FetchResult<MedicineInfo>> {
        let request = Self::medicine_request(name)?;
        let result = self
            .client
            .fetch_with("/medicine/info", &request, &self.medicine_info_options)
            .await;
        Ok(result.decode())
    }

    /// Probes `GET /health`.
    pub async fn health(&self) -> FetchResult<HealthCheckResponse> {
        self.client
            .fetch_with("/health", &RequestConfig::get(), &self.health_options)
            .await
            .decode()
    }

    fn medicine_request(name: &str) -> Result<RequestConfig> {
        if name.trim().is_empty() {
            return Err(ColdStartError::InvalidInput(
                "Missing or invalid 'name' field".to_owned(),
            ));
        }
        if name.chars().count() > MAX_MEDICINE_NAME_LEN {
            return Err(ColdStartError::InvalidInput(format!(
                "medicine name exceeds {MAX_MEDICINE_NAME_LEN} characters"
            )));
        }
        RequestConfig::json(&MedicineRequest { name })
    }
}

/// Maps a retried backend call onto the reply a gateway should send.
///
/// - `success` → `200` with the data
/// - `timeout` → `503`, the backend is probably still waking up
/// - `unreachable` → `502`
pub fn gateway_reply<T: Serialize>(result: &FetchResult<T>) -> (StatusCode, JsonValue) {
    match result.status {
        FetchStatus::Success => match serde_json::to_value(&result.data) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
        },
        FetchStatus::Timeout => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "error": "Backend is waking up or unreachable. Please retry in a few seconds.",
                "details": result.error,
                "attempts": result.attempts,
                "totalTime": result.total_time_ms(),
            }),
        ),
        FetchStatus::Unreachable => (
            StatusCode::BAD_GATEWAY,
            json!({
                "error": "Backend is unreachable",
                "details": result.error,
                "attempts": result.attempts,
            }),
        ),
    }
}

/// Maps a health probe onto a gateway reply: `200` with the backend's body,
/// or `503` with `{ "status": "unreachable", "error": ... }` for any failure.
pub fn health_gateway_reply<T: Serialize>(result: &FetchResult<T>) -> (StatusCode, JsonValue) {
    if result.is_success() {
        return gateway_reply(result);
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        json!({
            "status": "unreachable",
            "error": result.error,
        }),
    )
}
