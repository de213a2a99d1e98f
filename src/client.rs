use std::{fmt, sync::Arc};

use crate::{
    engine, ColdStartError, FetchResult, RequestConfig, RequestController, ReqwestTransport,
    Result, RetryOptions, Transport,
};

/// Backend used when `BACKEND_URL` is not set.
pub const DEFAULT_BACKEND_URL: &str = "https://kairo-backend.onrender.com";

/// Joins a base URL and a path, tolerating slashes on either side.
///
/// Absolute `http(s)://` paths are returned unchanged.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_owned();
    }
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_owned()
    } else {
        format!("{base}/{path}")
    }
}

/// HTTP client for a backend that may be asleep.
///
/// Every call goes through the retry engine with the client's
/// [`RetryOptions`]. Cloning is cheap; clones share the transport.
pub struct ColdStartClient<Tr: Transport = ReqwestTransport> {
    transport: Arc<Tr>,
    base_url: String,
    options: RetryOptions,
}

impl<Tr: Transport> Clone for ColdStartClient<Tr> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            base_url: self.base_url.clone(),
            options: self.options.clone(),
        }
    }
}

impl<Tr: Transport> fmt::Debug for ColdStartClient<Tr> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColdStartClient")
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl ColdStartClient<ReqwestTransport> {
    /// Creates a client for `base_url` using a default `reqwest` client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_transport(base_url, ReqwestTransport::new())
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `BACKEND_URL` — backend base URL, defaults to [`DEFAULT_BACKEND_URL`]
    /// - the `COLDSTART_*` timing variables, see [`RetryOptions::from_env`]
    ///
    /// # Example
    ///
    /// ```no_run
    /// use coldstart_http::ColdStartClient;
    ///
    /// let client = ColdStartClient::from_env().expect("invalid COLDSTART_* env vars");
    /// ```
    pub fn from_env() -> Result<Self> {
        let base_url = match std::env::var("BACKEND_URL") {
            Ok(url) if url.trim().is_empty() => {
                return Err(ColdStartError::Config(
                    "BACKEND_URL is set but empty".to_owned(),
                ))
            }
            Ok(url) => url.trim().to_owned(),
            Err(_) => DEFAULT_BACKEND_URL.to_owned(),
        };
        Ok(Self::new(base_url).with_options(RetryOptions::from_env()?))
    }
}

impl<Tr: Transport> ColdStartClient<Tr> {
    /// Creates a client over a custom [`Transport`].
    pub fn with_transport(base_url: impl Into<String>, transport: Tr) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url: base_url.into(),
            options: RetryOptions::default(),
        }
    }

    /// Replaces the retry options used by every call.
    pub fn with_options(mut self, options: RetryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    /// Sends `request` to `path` with the client's retry options.
    pub async fn fetch(&self, path: &str, request: &RequestConfig) -> FetchResult {
        self.fetch_with(path, request, &self.options).await
    }

    /// Sends `request` to `path` with explicit retry options.
    pub async fn fetch_with(
        &self,
        path: &str,
        request: &RequestConfig,
        options: &RetryOptions,
    ) -> FetchResult {
        engine::run(self.transport.as_ref(), &self.url(path), request, options).await
    }

    /// Creates a [`RequestController`] sharing this client's transport and
    /// options.
    pub fn controller(&self) -> RequestController<Arc<Tr>> {
        RequestController::new(Arc::clone(&self.transport), self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{join_url, ColdStartClient};
    use crate::RetryOptions;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://api/", "/health"), "https://api/health");
        assert_eq!(join_url("https://api", "medicine/info"), "https://api/medicine/info");
        assert_eq!(join_url("https://api/", ""), "https://api");
    }

    #[test]
    fn join_url_keeps_absolute_targets() {
        assert_eq!(
            join_url("https://api", "http://other/health"),
            "http://other/health"
        );
    }

    #[test]
    fn with_options_replaces_defaults() {
        let client = ColdStartClient::new("https://api")
            .with_options(RetryOptions::default().with_max_retry_time_ms(10_000));
        assert_eq!(client.options().max_retry_time_ms, 10_000);
        assert_eq!(client.url("/health"), "https://api/health");
    }

    #[test]
    fn debug_includes_base_url() {
        let client = ColdStartClient::new("https://api");
        let debug = format!("{client:?}");
        assert!(debug.contains("https://api"));
    }
}
