//! Pure classification and delay-growth rules used by the retry engine.

use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;

use crate::{ColdStartError, Payload, Result};

/// Growth factor applied to the retry delay after every wait.
pub const BACKOFF_FACTOR: f64 = 1.5;

/// What the engine should do with a response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Parse the body and return it.
    Success,
    /// Probable cold start: wait and try again.
    Retry,
    /// Client error: give up immediately.
    Reject,
}

pub fn classify_status(status: StatusCode) -> Disposition {
    if status.is_success() {
        Disposition::Success
    } else if status.is_server_error() {
        Disposition::Retry
    } else {
        // 4xx, plus any 1xx/3xx the transport did not resolve itself.
        Disposition::Reject
    }
}

/// Returns the delay that follows `current`, clamped to `max`.
pub fn next_delay(current: Duration, max: Duration) -> Duration {
    current.mul_f64(BACKOFF_FACTOR).min(max)
}

/// Parses a response body by content type.
///
/// `application/json` becomes [`Payload::Json`], any `text` type becomes
/// [`Payload::Text`], everything else stays [`Payload::Binary`].
pub fn decode_payload(content_type: Option<&str>, body: Bytes) -> Result<Payload> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if content_type.contains("application/json") {
        return serde_json::from_slice(&body)
            .map(Payload::Json)
            .map_err(|err| ColdStartError::Decode(format!("invalid JSON body: {err}")));
    }

    if content_type.contains("text") {
        return String::from_utf8(body.to_vec())
            .map(Payload::Text)
            .map_err(|err| ColdStartError::Decode(format!("text body is not UTF-8: {err}")));
    }

    Ok(Payload::Binary(body))
}

/// Formats a rejected response as `"<status>: <body-or-reason>"`.
pub fn rejection_message(status: StatusCode, body: &[u8]) -> String {
    let body = String::from_utf8_lossy(body);
    if body.trim().is_empty() {
        format!(
            "{}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        )
    } else {
        format!("{}: {}", status.as_u16(), body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{classify_status, decode_payload, next_delay, rejection_message, Disposition};
    use crate::{ColdStartError, Payload};

    #[test]
    fn classifies_status_ranges() {
        assert_eq!(classify_status(StatusCode::OK), Disposition::Success);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), Disposition::Success);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), Disposition::Retry);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), Disposition::Retry);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Disposition::Reject);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), Disposition::Reject);
        assert_eq!(classify_status(StatusCode::NOT_MODIFIED), Disposition::Reject);
    }

    #[test]
    fn delay_grows_by_half_and_caps() {
        let max = Duration::from_millis(5_000);
        let mut delay = Duration::from_millis(1_000);
        let mut seen = Vec::new();
        for _ in 0..5 {
            delay = next_delay(delay, max);
            seen.push(delay.as_millis());
        }
        assert_eq!(seen, vec![1_500, 2_250, 3_375, 5_000, 5_000]);
    }

    #[test]
    fn delay_equal_to_cap_stays_at_cap() {
        let cap = Duration::from_millis(800);
        assert_eq!(next_delay(cap, cap), cap);
    }

    #[test]
    fn decodes_by_content_type() {
        let json_body = decode_payload(
            Some("application/json; charset=utf-8"),
            Bytes::from_static(br#"{"ok":true}"#),
        )
        .expect("json must decode");
        assert_eq!(json_body, Payload::Json(json!({"ok": true})));

        let text_body = decode_payload(Some("text/plain"), Bytes::from_static(b"pong"))
            .expect("text must decode");
        assert_eq!(text_body, Payload::Text("pong".to_owned()));

        let raw = decode_payload(Some("image/png"), Bytes::from_static(&[0x89, 0x50]))
            .expect("binary passes through");
        assert_eq!(raw, Payload::Binary(Bytes::from_static(&[0x89, 0x50])));

        let untyped = decode_payload(None, Bytes::from_static(b"??")).expect("no type is binary");
        assert!(matches!(untyped, Payload::Binary(_)));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = decode_payload(Some("application/json"), Bytes::from_static(b"{oops"))
            .expect_err("must fail");
        assert!(matches!(err, ColdStartError::Decode(_)));
    }

    #[test]
    fn rejection_prefers_body_then_reason() {
        assert_eq!(
            rejection_message(StatusCode::NOT_FOUND, b"no such medicine"),
            "404: no such medicine"
        );
        assert_eq!(rejection_message(StatusCode::NOT_FOUND, b""), "404: Not Found");
    }
}
