use std::time::Duration;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::{ColdStartError, Result, CANCELLED_MESSAGE};

/// Final classification of a retried call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    Success,
    Timeout,
    Unreachable,
}

/// Response body, parsed according to its `Content-Type`.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// `application/json`
    Json(serde_json::Value),
    /// `text/*`
    Text(String),
    /// Anything else, left as raw bytes.
    Binary(Bytes),
}

impl Payload {
    /// Decodes the payload into `T`.
    ///
    /// JSON payloads are converted directly; text payloads are parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Payload::Json(value) => serde_json::from_value(value.clone())
                .map_err(|err| ColdStartError::Decode(format!("unexpected JSON shape: {err}"))),
            Payload::Text(text) => serde_json::from_str(text)
                .map_err(|err| ColdStartError::Decode(format!("text body is not JSON: {err}"))),
            Payload::Binary(_) => Err(ColdStartError::Decode(
                "binary body cannot be decoded as JSON".to_owned(),
            )),
        }
    }

    /// Body of a `text/*` response; `None` for JSON and binary payloads.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Outcome of one call to the retry engine.
///
/// `data` is present only when `status` is [`FetchStatus::Success`];
/// `error` is present otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchResult<T = Payload> {
    pub status: FetchStatus,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Number of attempts made, always at least one.
    pub attempts: u32,
    pub total_time: Duration,
}

impl<T> FetchResult<T> {
    pub(crate) fn success(data: T, attempts: u32, total_time: Duration) -> Self {
        Self {
            status: FetchStatus::Success,
            data: Some(data),
            error: None,
            attempts,
            total_time,
        }
    }

    pub(crate) fn failure(
        status: FetchStatus,
        error: impl Into<String>,
        attempts: u32,
        total_time: Duration,
    ) -> Self {
        Self {
            status,
            data: None,
            error: Some(error.into()),
            attempts,
            total_time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn total_time_ms(&self) -> u64 {
        u64::try_from(self.total_time.as_millis()).unwrap_or(u64::MAX)
    }

    /// Converts the data of a successful result; status, error and timing
    /// are carried over unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchResult<U> {
        FetchResult {
            status: self.status,
            data: self.data.map(f),
            error: self.error,
            attempts: self.attempts,
            total_time: self.total_time,
        }
    }

    /// Like [`FetchResult::map`], but a failing conversion turns a success
    /// into an `unreachable` result carrying the conversion error.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> FetchResult<U> {
        let Self {
            status,
            data,
            error,
            attempts,
            total_time,
        } = self;
        match data.map(f) {
            Some(Ok(data)) => FetchResult {
                status,
                data: Some(data),
                error,
                attempts,
                total_time,
            },
            Some(Err(err)) => {
                FetchResult::failure(FetchStatus::Unreachable, err.to_string(), attempts, total_time)
            }
            None => FetchResult {
                status,
                data: None,
                error,
                attempts,
                total_time,
            },
        }
    }

    /// Converts into a plain `Result`, dropping attempt metadata.
    pub fn into_result(self) -> Result<T> {
        let message = self
            .error
            .unwrap_or_else(|| "Request failed".to_owned());
        match (self.status, self.data) {
            (FetchStatus::Success, Some(data)) => Ok(data),
            (FetchStatus::Success, None) => Err(ColdStartError::Decode(
                "successful result carried no data".to_owned(),
            )),
            (FetchStatus::Timeout, _) => Err(ColdStartError::BudgetExhausted(message)),
            (FetchStatus::Unreachable, _) if message == CANCELLED_MESSAGE => {
                Err(ColdStartError::Cancelled)
            }
            (FetchStatus::Unreachable, _) => Err(ColdStartError::Unreachable(message)),
        }
    }
}

impl FetchResult<Payload> {
    /// Decodes a successful payload as JSON into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> FetchResult<T> {
        self.try_map(|payload| payload.json())
    }
}

/// Externally observable state of a [`crate::RequestController`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestState {
    #[default]
    Idle,
    Loading,
    WakingBackend,
    Error,
    Success,
}

impl RequestState {
    pub fn is_loading(self) -> bool {
        matches!(self, RequestState::Loading | RequestState::WakingBackend)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Loading => "loading",
            RequestState::WakingBackend => "waking-backend",
            RequestState::Error => "error",
            RequestState::Success => "success",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;

    use super::{FetchResult, FetchStatus, Payload, RequestState};
    use crate::ColdStartError;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flag {
        ok: bool,
    }

    #[test]
    fn decode_json_payload_into_struct() {
        let result = FetchResult::success(Payload::Json(json!({"ok": true})), 1, Duration::ZERO);
        let decoded = result.decode::<Flag>();
        assert_eq!(decoded.status, FetchStatus::Success);
        assert_eq!(decoded.data, Some(Flag { ok: true }));
    }

    #[test]
    fn decode_shape_mismatch_becomes_unreachable() {
        let result = FetchResult::success(Payload::Text("plain".to_owned()), 2, Duration::ZERO);
        let decoded = result.decode::<Flag>();
        assert_eq!(decoded.status, FetchStatus::Unreachable);
        assert_eq!(decoded.attempts, 2);
        assert!(decoded.data.is_none());
        assert!(decoded.error.is_some());
    }

    #[test]
    fn as_text_only_exposes_text_bodies() {
        assert_eq!(Payload::Text("pong".to_owned()).as_text(), Some("pong"));
        assert_eq!(Payload::Json(json!("pong")).as_text(), None);
        assert_eq!(Payload::Binary(bytes::Bytes::from_static(b"pong")).as_text(), None);
    }

    #[test]
    fn map_converts_data_and_keeps_metadata() {
        let ok = FetchResult::success(21u32, 3, Duration::from_millis(2_500));
        let doubled = ok.map(|n| n * 2);
        assert_eq!(doubled.data, Some(42));
        assert_eq!(doubled.status, FetchStatus::Success);
        assert_eq!(doubled.attempts, 3);
        assert_eq!(doubled.total_time_ms(), 2_500);

        let failed: FetchResult<u32> =
            FetchResult::failure(FetchStatus::Timeout, "Server error: 503", 5, Duration::ZERO);
        let mapped = failed.map(|n| n.to_string());
        assert_eq!(mapped.data, None);
        assert_eq!(mapped.status, FetchStatus::Timeout);
        assert_eq!(mapped.error.as_deref(), Some("Server error: 503"));
    }

    #[test]
    fn into_result_maps_status_to_error_variant() {
        let timeout: FetchResult<()> =
            FetchResult::failure(FetchStatus::Timeout, "Server error: 503", 4, Duration::ZERO);
        assert!(matches!(
            timeout.into_result(),
            Err(ColdStartError::BudgetExhausted(message)) if message == "Server error: 503"
        ));

        let unreachable: FetchResult<()> =
            FetchResult::failure(FetchStatus::Unreachable, "404: missing", 1, Duration::ZERO);
        assert!(matches!(
            unreachable.into_result(),
            Err(ColdStartError::Unreachable(_))
        ));

        let cancelled: FetchResult<()> = FetchResult::failure(
            FetchStatus::Unreachable,
            "Request was cancelled",
            1,
            Duration::ZERO,
        );
        assert!(matches!(cancelled.into_result(), Err(ColdStartError::Cancelled)));
    }

    #[test]
    fn loading_covers_waking_backend() {
        assert!(RequestState::Loading.is_loading());
        assert!(RequestState::WakingBackend.is_loading());
        assert!(!RequestState::Idle.is_loading());
        assert!(!RequestState::Error.is_loading());
        assert!(!RequestState::Success.is_loading());
        assert_eq!(RequestState::WakingBackend.as_str(), "waking-backend");
        assert_eq!(
            serde_json::to_value(RequestState::WakingBackend).expect("serializable"),
            json!("waking-backend")
        );
    }
}
