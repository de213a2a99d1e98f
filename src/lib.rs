//! `coldstart-http` is an async HTTP client for backends that sleep when idle.
//!
//! A call is retried with capped exponential backoff until it succeeds, the
//! backend rejects it, the caller cancels it, or a wall-clock budget runs out:
//! - [`run`] / [`fetch_with_cold_start`]: the stateless retry engine
//! - [`RequestController`]: observable `idle → loading → waking-backend →
//!   success | error` state for one request site
//! - [`ColdStartClient`] and [`BackendClient`]: base-URL clients on top

pub mod backend;
pub mod backoff;
mod client;
mod controller;
mod engine;
mod error;
mod options;
mod request;
mod transport;
mod types;

pub use backend::{
    gateway_reply, health_gateway_reply, BackendClient, HealthCheckResponse, HealthStatus,
    MedicineInfo,
};
pub use client::{join_url, ColdStartClient, DEFAULT_BACKEND_URL};
pub use controller::{RequestController, RequestSnapshot};
pub use engine::{fetch_with_cold_start, run, BUDGET_EXHAUSTED_MESSAGE, CANCELLED_MESSAGE};
pub use error::ColdStartError;
pub use options::{OnBackendWaking, OnRetry, RetryOptions};
pub use request::RequestConfig;
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::{FetchResult, FetchStatus, Payload, RequestState};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ColdStartError>;
