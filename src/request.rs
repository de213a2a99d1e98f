use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Method,
};
use serde::Serialize;

use crate::{ColdStartError, Result};

/// Method, headers and body of a request. Opaque to the retry engine.
#[derive(Clone, Debug)]
pub struct RequestConfig {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    /// Builds a `POST` carrying `payload` as a JSON body.
    pub fn json<P: Serialize + ?Sized>(payload: &P) -> Result<Self> {
        let body = serde_json::to_vec(payload)
            .map_err(|err| ColdStartError::InvalidInput(format!("unserializable body: {err}")))?;
        Ok(Self::post()
            .with_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .with_body(body))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use reqwest::{header, Method};
    use serde_json::json;

    use super::RequestConfig;

    #[test]
    fn json_sets_method_header_and_body() {
        let request = RequestConfig::json(&json!({"name": "Aspirin"})).expect("must serialize");
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.headers.get(header::CONTENT_TYPE).map(|v| v.as_bytes()),
            Some(&b"application/json"[..])
        );
        assert_eq!(request.body.as_deref(), Some(&br#"{"name":"Aspirin"}"#[..]));
    }

    #[test]
    fn default_is_bodyless_get() {
        let request = RequestConfig::default();
        assert_eq!(request.method, Method::GET);
        assert!(request.body.is_none());
        assert!(request.headers.is_empty());
    }
}
