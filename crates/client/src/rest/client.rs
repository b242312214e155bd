//! Thin wrapper around `reqwest` for the engine's JSON API.

use crate::wire;
use ovirt_common::{ClientConfig, Error, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Engine fault detail for requests rejected because of a concurrent operation.
const RELATED_OPERATION_IN_PROGRESS: &str = "related operation is currently in progress";

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("Version", HeaderValue::from_static("4"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure);

        if let Some(path) = &config.ca_file {
            let pem = std::fs::read(path).map_err(|e| {
                Error::Config(format!("failed to read CA file {}: {}", path.display(), e))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("invalid CA file {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!(path, "GET");
        self.send_json(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!(path, ?query, "GET");
        self.send_json(self.request(reqwest::Method::GET, path).query(query))
            .await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(path, "POST");
        tracing::trace!(body = %serde_json::to_string(body)?, "Request body");
        self.send_json(self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    /// POST whose response body is ignored, used for actions.
    pub async fn post_discard<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!(path, "POST");
        self.send(self.request(reqwest::Method::POST, path).json(body))
            .await
            .map(|_| ())
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(path, "PUT");
        tracing::trace!(body = %serde_json::to_string(body)?, "Request body");
        self.send_json(self.request(reqwest::Method::PUT, path).json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "DELETE");
        self.send(self.request(reqwest::Method::DELETE, path))
            .await
            .map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(map_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send(request).await?;
        tracing::trace!(%body, "Response body");
        serde_json::from_str(&body)
            .map_err(|e| Error::bug_with_source("failed to parse engine response", e))
    }
}

pub(crate) fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_builder() {
        return Error::bug_with_source("failed to build request", err);
    }
    Error::Connection(err.to_string())
}

/// Translate a failed HTTP response into an error of the matching kind.
pub(crate) fn map_status(status: StatusCode, body: &str) -> Error {
    let fault: wire::Fault = serde_json::from_str(body).unwrap_or_default();
    let message = match (fault.reason.as_deref(), fault.detail.as_deref()) {
        (Some(reason), Some(detail)) => format!("{status}: {reason}: {detail}"),
        (Some(text), None) | (None, Some(text)) => format!("{status}: {text}"),
        (None, None) if body.trim().is_empty() => status.to_string(),
        (None, None) => format!("{status}: {}", body.trim()),
    };

    match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::PermissionDenied(message),
        StatusCode::CONFLICT => Error::Conflict(message),
        StatusCode::BAD_REQUEST
            if message.to_lowercase().contains(RELATED_OPERATION_IN_PROGRESS) =>
        {
            Error::Conflict(message)
        }
        StatusCode::BAD_REQUEST => Error::BadArgument(message),
        s if s.is_server_error() => Error::Connection(message),
        _ => Error::bug(format!("unexpected engine response {message}")),
    }
}
