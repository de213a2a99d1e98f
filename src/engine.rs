//! The retry engine: one logical HTTP call, retried until it succeeds, is
//! rejected, is cancelled or runs out of time.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

use crate::{
    backoff::{classify_status, decode_payload, next_delay, rejection_message, Disposition},
    ColdStartError, FetchResult, FetchStatus, Payload, RequestConfig, ReqwestTransport,
    RetryOptions, Transport,
};

pub const CANCELLED_MESSAGE: &str = "Request was cancelled";
pub const BUDGET_EXHAUSTED_MESSAGE: &str = "Backend did not respond within timeout period";

enum Attempt {
    Done(Payload),
    Transient(String),
    Rejected(String),
    Cancelled,
}

/// Runs `request` against `target` through a fresh [`ReqwestTransport`].
///
/// Every call builds a new `reqwest::Client`, so connections are not pooled
/// across calls. Use [`crate::ColdStartClient`] for repeated requests.
pub async fn fetch_with_cold_start(
    target: &str,
    request: &RequestConfig,
    options: &RetryOptions,
) -> FetchResult {
    run(&ReqwestTransport::new(), target, request, options).await
}

/// Performs one logical call with time-budgeted retries.
///
/// - 2xx: body parsed by content type, returned as `success`.
/// - 5xx, transport failures and per-attempt timeouts: treated as a cold
///   start. `on_backend_waking` fires on the first one, then the engine waits
///   the current delay, grows it by 1.5 (capped), fires `on_retry` and tries
///   again.
/// - 4xx: returned immediately as `unreachable`.
/// - Cancellation: returned immediately as `unreachable`.
///
/// The budget is checked between attempts only, so the last attempt may
/// overrun `max_retry_time_ms` by up to one attempt timeout. When the budget
/// runs out the result is `timeout` carrying the last transient error.
pub async fn run<Tr>(
    transport: &Tr,
    target: &str,
    request: &RequestConfig,
    options: &RetryOptions,
) -> FetchResult
where
    Tr: Transport + ?Sized,
{
    let start = Instant::now();
    let budget = options.max_retry_time();
    let max_delay = options.max_retry_delay();
    let mut attempt = 0u32;
    let mut retry_delay = options.initial_retry_delay();
    let mut backend_waking_fired = false;
    let mut last_error: Option<String> = None;

    loop {
        attempt += 1;

        if options.is_cancelled() {
            return cancelled(attempt, start);
        }

        let error = match attempt_once(transport, target, request, options).await {
            Attempt::Done(payload) => {
                return FetchResult::success(payload, attempt, start.elapsed());
            }
            Attempt::Rejected(message) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(url = target, attempt, error = %message, "request rejected");
                return FetchResult::failure(
                    FetchStatus::Unreachable,
                    message,
                    attempt,
                    start.elapsed(),
                );
            }
            Attempt::Cancelled => return cancelled(attempt, start),
            Attempt::Transient(message) => message,
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(url = target, attempt, error = %error, "transient failure");
        last_error = Some(error);

        if !backend_waking_fired {
            backend_waking_fired = true;
            #[cfg(feature = "tracing")]
            tracing::debug!(url = target, "backend appears to be waking up");
            if let Some(on_backend_waking) = &options.on_backend_waking {
                on_backend_waking();
            }
        }

        if !wait_before_retry(retry_delay, options.cancel.as_ref()).await {
            return cancelled(attempt, start);
        }
        retry_delay = next_delay(retry_delay, max_delay);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            url = target,
            attempt,
            next_delay_ms = retry_delay.as_millis() as u64,
            "retrying request"
        );
        if let Some(on_retry) = &options.on_retry {
            on_retry(attempt, retry_delay);
        }

        if start.elapsed() >= budget {
            break;
        }
    }

    FetchResult::failure(
        FetchStatus::Timeout,
        last_error.unwrap_or_else(|| BUDGET_EXHAUSTED_MESSAGE.to_owned()),
        attempt,
        start.elapsed(),
    )
}

async fn attempt_once<Tr>(
    transport: &Tr,
    target: &str,
    request: &RequestConfig,
    options: &RetryOptions,
) -> Attempt
where
    Tr: Transport + ?Sized,
{
    let exchange = timeout(options.attempt_timeout(), transport.send(target, request));
    let outcome = match &options.cancel {
        Some(token) => tokio::select! {
            outcome = exchange => outcome,
            () = token.cancelled() => return Attempt::Cancelled,
        },
        None => exchange.await,
    };

    let response = match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            if options.is_cancelled() {
                return Attempt::Cancelled;
            }
            return Attempt::Transient(err.to_string());
        }
        Err(_) => {
            let err = ColdStartError::Timeout {
                timeout_ms: options.attempt_timeout_ms,
            };
            return Attempt::Transient(err.to_string());
        }
    };

    match classify_status(response.status) {
        Disposition::Success => {
            match decode_payload(response.content_type.as_deref(), response.body) {
                Ok(payload) => Attempt::Done(payload),
                Err(err) => Attempt::Transient(err.to_string()),
            }
        }
        Disposition::Retry => {
            Attempt::Transient(format!("Server error: {}", response.status.as_u16()))
        }
        Disposition::Reject => Attempt::Rejected(rejection_message(response.status, &response.body)),
    }
}

/// Sleeps for `delay`. Returns `false` when cancelled first.
async fn wait_before_retry(delay: Duration, cancel: Option<&CancellationToken>) -> bool {
    match cancel {
        Some(token) => tokio::select! {
            () = sleep(delay) => true,
            () = token.cancelled() => false,
        },
        None => {
            sleep(delay).await;
            true
        }
    }
}

fn cancelled(attempt: u32, start: Instant) -> FetchResult {
    #[cfg(feature = "tracing")]
    tracing::debug!(attempt, "request cancelled");
    FetchResult::failure(
        FetchStatus::Unreachable,
        CANCELLED_MESSAGE,
        attempt,
        start.elapsed(),
    )
}
