use std::{fmt, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{ColdStartError, Result};

/// Callback fired after each backoff wait with the attempt number that just
/// failed and the delay that will precede the attempt after next.
pub type OnRetry = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Callback fired once per call when the backend looks like it is waking up.
pub type OnBackendWaking = Arc<dyn Fn() + Send + Sync>;

/// Configures the retry budget, backoff bounds and per-call hooks.
#[derive(Clone)]
pub struct RetryOptions {
    /// Total wall-clock budget for retrying, in milliseconds.
    pub max_retry_time_ms: u64,
    /// Delay before the first retry, in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Upper bound for the delay between retries, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Timeout applied to each individual attempt, in milliseconds.
    pub attempt_timeout_ms: u64,
    pub on_retry: Option<OnRetry>,
    pub on_backend_waking: Option<OnBackendWaking>,
    /// Cancels the call when triggered; checked cooperatively.
    pub cancel: Option<CancellationToken>,
}

pub const DEFAULT_MAX_RETRY_TIME_MS: u64 = 60_000;
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 10_000;

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retry_time_ms: DEFAULT_MAX_RETRY_TIME_MS,
            initial_retry_delay_ms: DEFAULT_INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: DEFAULT_MAX_RETRY_DELAY_MS,
            attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
            on_retry: None,
            on_backend_waking: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_retry_time_ms", &self.max_retry_time_ms)
            .field("initial_retry_delay_ms", &self.initial_retry_delay_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("attempt_timeout_ms", &self.attempt_timeout_ms)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<callback>"))
            .field(
                "on_backend_waking",
                &self.on_backend_waking.as_ref().map(|_| "<callback>"),
            )
            .field("cancel", &self.cancel)
            .finish()
    }
}

impl RetryOptions {
    /// Reads timing overrides from the environment.
    ///
    /// Recognised variables (all optional, milliseconds):
    /// - `COLDSTART_MAX_RETRY_TIME_MS`
    /// - `COLDSTART_INITIAL_RETRY_DELAY_MS`
    /// - `COLDSTART_MAX_RETRY_DELAY_MS`
    /// - `COLDSTART_ATTEMPT_TIMEOUT_MS`
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let options = Self {
            max_retry_time_ms: env_ms("COLDSTART_MAX_RETRY_TIME_MS", defaults.max_retry_time_ms)?,
            initial_retry_delay_ms: env_ms(
                "COLDSTART_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay_ms,
            )?,
            max_retry_delay_ms: env_ms(
                "COLDSTART_MAX_RETRY_DELAY_MS",
                defaults.max_retry_delay_ms,
            )?,
            attempt_timeout_ms: env_ms(
                "COLDSTART_ATTEMPT_TIMEOUT_MS",
                defaults.attempt_timeout_ms,
            )?,
            ..defaults
        };
        options.validate()?;
        Ok(options)
    }

    pub fn with_max_retry_time_ms(mut self, ms: u64) -> Self {
        self.max_retry_time_ms = ms;
        self
    }

    pub fn with_initial_retry_delay_ms(mut self, ms: u64) -> Self {
        self.initial_retry_delay_ms = ms;
        self
    }

    pub fn with_max_retry_delay_ms(mut self, ms: u64) -> Self {
        self.max_retry_delay_ms = ms;
        self
    }

    pub fn with_attempt_timeout_ms(mut self, ms: u64) -> Self {
        self.attempt_timeout_ms = ms;
        self
    }

    pub fn with_on_retry(mut self, callback: impl Fn(u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn with_on_backend_waking(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_backend_waking = Some(Arc::new(callback));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.max_retry_time_ms == 0 {
            return Err(ColdStartError::InvalidOptions(
                "max_retry_time_ms must be greater than zero".to_owned(),
            ));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(ColdStartError::InvalidOptions(
                "attempt_timeout_ms must be greater than zero".to_owned(),
            ));
        }
        if self.initial_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ColdStartError::InvalidOptions(format!(
                "initial_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.initial_retry_delay_ms, self.max_retry_delay_ms
            )));
        }
        Ok(())
    }

    /// True when no timing field differs from [`RetryOptions::default`].
    pub(crate) fn has_default_timing(&self) -> bool {
        self.max_retry_time_ms == DEFAULT_MAX_RETRY_TIME_MS
            && self.initial_retry_delay_ms == DEFAULT_INITIAL_RETRY_DELAY_MS
            && self.max_retry_delay_ms == DEFAULT_MAX_RETRY_DELAY_MS
            && self.attempt_timeout_ms == DEFAULT_ATTEMPT_TIMEOUT_MS
    }

    pub(crate) fn max_retry_time(&self) -> Duration {
        Duration::from_millis(self.max_retry_time_ms)
    }

    pub(crate) fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    pub(crate) fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub(crate) fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

fn env_ms(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(default),
        Ok(raw) => raw.trim().parse::<u64>().map_err(|err| {
            ColdStartError::Config(format!("{name} must be a number of milliseconds: {err}"))
        }),
        Err(_) => Ok(default),
    }
}
