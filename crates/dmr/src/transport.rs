//! The HTTP seam of the dispatcher.
//!
//! [`Transport`] moves already shaped requests and hands back the raw status
//! and body. It does not interpret either; classification happens in the
//! dispatcher. [`HttpTransport`] is the `reqwest` implementation.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{ConfigError, DispatchError};

/// A shaped DMR request.
#[derive(Debug, Clone)]
pub struct DmrRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// Base64 encoded operation for POST, `None` for GET.
    pub body: Option<String>,
}

/// Binary attachment of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Multipart field name carrying the file.
    pub field_name: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(field_name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a file from disk. The file name part of `path` becomes the
    /// multipart file name.
    pub async fn from_path(field_name: impl Into<String>, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(field_name, file_name, bytes))
    }
}

/// A shaped multipart upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub file: UploadFile,
    /// The operation rendered as compact JSON, sent in the `operation` field.
    pub operation: String,
}

/// Status and body exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a DMR request. Errors mean no response was received at all.
    async fn send(&self, request: DmrRequest) -> Result<RawResponse, DispatchError>;

    /// Sends a multipart upload.
    async fn upload(&self, request: UploadRequest) -> Result<RawResponse, DispatchError>;
}

/// Credentials sent with every request.
#[derive(Clone)]
struct Credentials {
    username: String,
    password: Option<String>,
}

/// `reqwest` backed transport.
///
/// Requests carry basic auth credentials when configured, and the cookie store
/// keeps session cookies handed out by the management interface.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ConfigError::Client {
                reason: error.to_string(),
            })?;

        let credentials = config.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: config.password.clone(),
        });
        Ok(Self { http, credentials })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credentials {
            Some(credentials) => builder.basic_auth(&credentials.username, credentials.password.as_ref()),
            None => builder,
        }
    }

    async fn finish(&self, builder: reqwest::RequestBuilder, method: &Method, url: &str) -> Result<RawResponse, DispatchError> {
        let start = Instant::now();
        let response = builder.send().await.map_err(|error| {
            warn!(%method, %url, %error, duration_ms = start.elapsed().as_millis(), "management request failed");
            DispatchError::transport(format!("Network error: {error}"))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| {
            warn!(%method, %url, status, %error, duration_ms = start.elapsed().as_millis(), "management response body unreadable");
            DispatchError::transport(format!("Network error: {error}"))
        })?;
        debug!(
            %method,
            %url,
            status,
            body_len = body.len(),
            duration_ms = start.elapsed().as_millis(),
            "management request completed"
        );
        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: DmrRequest) -> Result<RawResponse, DispatchError> {
        debug!(method = %request.method, url = %request.url, "sending management request");
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let builder = self.authorize(builder);
        self.finish(builder, &request.method, &request.url).await
    }

    async fn upload(&self, request: UploadRequest) -> Result<RawResponse, DispatchError> {
        debug!(
            url = %request.url,
            field = %request.file.field_name,
            bytes = request.file.bytes.len(),
            "sending management upload"
        );
        let UploadFile {
            field_name,
            file_name,
            bytes,
        } = request.file;
        let form = Form::new()
            .part(field_name, Part::bytes(bytes).file_name(file_name))
            .text("operation", request.operation);

        let builder = self.authorize(self.http.post(&request.url).multipart(form));
        self.finish(builder, &Method::POST, &request.url).await
    }
}
