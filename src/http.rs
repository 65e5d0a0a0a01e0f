//! Network access for the default `get`/`post`/`put` methods: JSON
//! out, JSON in.

use futures_util::{future::LocalBoxFuture, FutureExt};
use itertools::Itertools;
use pct_str::{PctString, Encoder};
use serde_json::Value as JsonValue;

use crate::{error::NetworkError, expr::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Sent as `application/json`.
    pub body: Option<JsonValue>,
}

pub trait Transport {
    /// Perform the request and parse the response body as JSON.
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<JsonValue, NetworkError>>;
}

/// Encodes everything except the RFC 3986 unreserved characters, so
/// that the result can be used as a query key or value.
struct QueryComponent;

impl Encoder for QueryComponent {
    fn encode(&self, c: char) -> bool {
        ! (c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    }
}

pub fn url_encode(s: &str) -> String {
    PctString::encode(s.chars(), QueryComponent).to_string()
}

/// `location` with `params` (an object, or null for none) appended as
/// a query string. String values are used as they are, other values
/// as JSON.
pub fn with_query(location: &str, params: &JsonValue) -> Result<String, NetworkError> {
    let map = match params {
        JsonValue::Null => return Ok(location.into()),
        JsonValue::Object(map) => map,
        other => return Err(NetworkError::Arguments {
            method: HttpMethod::Get.as_str(),
            location: location.into(),
            message: format!("query parameters must be an object, got {}",
                             crate::error::json_type_name(other)),
        })
    };
    if map.is_empty() {
        return Ok(location.into())
    }
    let query = map.iter()
        .map(|(k, v)| format!("{}={}",
                              url_encode(k),
                              url_encode(&Value::Json(v.clone()).render())))
        .join("&");
    let separator = if location.contains('?') { '&' } else { '?' };
    Ok(format!("{location}{separator}{query}"))
}

/// Sends requests with `reqwest`. Needs to run inside a tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestTransport { client }
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<JsonValue, NetworkError>> {
        let HttpRequest { method, url, body } = request;
        let mut builder = self.client.request(
            match method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
                HttpMethod::Put => reqwest::Method::PUT,
            },
            url.as_str());
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        let method = method.as_str();
        async move {
            let response = builder.send().await.map_err(
                |e| NetworkError::Request { method, url: url.clone(), message: e.to_string() })?;
            let status = response.status();
            if ! status.is_success() {
                return Err(NetworkError::Status { method, url, status: status.as_u16() })
            }
            response.json::<JsonValue>().await.map_err(
                |e| NetworkError::Decode { method, url, message: e.to_string() })
        }.boxed_local()
    }
}
