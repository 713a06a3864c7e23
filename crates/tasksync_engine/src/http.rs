//! HTTP transport for the self-hosted backend.
//!
//! The self-hosted backend exposes one resource, `<base>/api/data`:
//! `GET` returns the stored snapshot (404 when there is none) and `PUT`
//! replaces it, answering `{"version": n}`. The actual HTTP client is
//! abstracted via [`HttpClient`] so the transport can run over reqwest, a
//! loopback into an in-process server, or a test double.

use crate::config::RetryConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{BackendKind, PushReceipt, RemoteTransport, StaticToken, TokenProvider};
use parking_lot::RwLock;
use std::time::Duration;
use tasksync_model::Snapshot;

/// Path of the snapshot resource on a self-hosted server.
pub const DATA_PATH: &str = "/api/data";

/// HTTP method used by the transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
        }
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why an HTTP exchange produced no response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The request exceeded its timeout.
    Timeout,
    /// The connection could not be made or broke.
    Connection(String),
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, HttpFailure>;

    /// Sends a PUT request with a JSON body.
    fn put(&self, url: &str, bearer: Option<&str>, body: Vec<u8>) -> Result<HttpResponse, HttpFailure>;

    /// Sends a POST request with a form-encoded body.
    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, HttpFailure>;
}

/// HTTP-based transport for the self-hosted backend.
pub struct HttpTransport<C: HttpClient, P: TokenProvider = StaticToken> {
    /// Base URL of the server (e.g., "https://tasks.example.com").
    base_url: String,
    client: C,
    tokens: P,
    retry: RetryConfig,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C, StaticToken> {
    /// Creates an unauthenticated transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self::with_tokens(base_url, client, StaticToken::anonymous())
    }
}

impl<C: HttpClient, P: TokenProvider> HttpTransport<C, P> {
    /// Creates a transport that sends bearer tokens from `tokens`.
    pub fn with_tokens(base_url: impl Into<String>, client: C, tokens: P) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client,
            tokens,
            retry: RetryConfig::no_retry(),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the in-call retry policy for retryable failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn data_url(&self) -> String {
        format!("{}{}", self.base_url, DATA_PATH)
    }

    fn with_retries<T>(&self, mut op: impl FnMut() -> SyncResult<T>) -> SyncResult<T> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            let delay = self.retry.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            match op() {
                Ok(value) => {
                    *self.last_error.write() = None;
                    return Ok(value);
                }
                Err(e) => {
                    *self.last_error.write() = Some(e.to_string());
                    attempt += 1;
                    if !e.is_retryable() || attempt >= attempts {
                        return Err(e);
                    }
                    tracing::debug!(attempt, error = %e, "retrying request");
                }
            }
        }
    }
}

impl<C: HttpClient, P: TokenProvider> RemoteTransport for HttpTransport<C, P> {
    fn kind(&self) -> BackendKind {
        BackendKind::SelfHosted
    }

    fn fetch_remote(&self) -> SyncResult<Option<Snapshot>> {
        let url = self.data_url();
        self.with_retries(|| {
            let token = self.tokens.access_token()?;
            let response = self
                .client
                .get(&url, token.as_deref())
                .map_err(failure_to_error)?;

            if response.status == 404 {
                return Ok(None);
            }
            check_status(&response)?;
            decode_snapshot(&response.body)
        })
    }

    fn push_remote(&self, snapshot: &Snapshot) -> SyncResult<PushReceipt> {
        let url = self.data_url();
        let body = snapshot.to_json()?;
        self.with_retries(|| {
            let token = self.tokens.access_token()?;
            let response = self
                .client
                .put(&url, token.as_deref(), body.clone())
                .map_err(failure_to_error)?;

            check_status(&response)?;
            serde_json::from_slice::<PushReceipt>(&response.body).map_err(|e| {
                SyncError::malformed(format!("push response lacks a version: {e}"))
            })
        })
    }
}

/// Decodes a fetched body. An empty body or JSON `null` means "no snapshot".
pub(crate) fn decode_snapshot(body: &[u8]) -> SyncResult<Option<Snapshot>> {
    let trimmed = body.trim_ascii();
    if trimmed.is_empty() || trimmed == b"null" {
        return Ok(None);
    }
    Snapshot::from_json(trimmed)
        .map(Some)
        .map_err(|e| SyncError::malformed(e.to_string()))
}

pub(crate) fn failure_to_error(failure: HttpFailure) -> SyncError {
    match failure {
        HttpFailure::Timeout => SyncError::Timeout,
        HttpFailure::Connection(message) => SyncError::transport_retryable(message),
    }
}

pub(crate) fn check_status(response: &HttpResponse) -> SyncResult<()> {
    if response.is_success() {
        return Ok(());
    }
    let detail = String::from_utf8_lossy(&response.body).into_owned();
    match response.status {
        401 | 403 => Err(SyncError::AuthenticationFailed(format!(
            "status {}: {}",
            response.status, detail
        ))),
        500..=599 => Err(SyncError::ServerError(format!(
            "status {}: {}",
            response.status, detail
        ))),
        status => Err(SyncError::transport_fatal(format!(
            "unexpected status {status}: {detail}"
        ))),
    }
}

/// An [`HttpClient`] backed by blocking reqwest.
///
/// Must not be used from inside an async context; the driver runs transport
/// calls on the blocking pool.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }

    fn execute(&self, request: reqwest::blocking::RequestBuilder) -> Result<HttpResponse, HttpFailure> {
        let response = request.send().map_err(reqwest_failure)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(reqwest_failure)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}

fn reqwest_failure(err: reqwest::Error) -> HttpFailure {
    if err.is_timeout() {
        HttpFailure::Timeout
    } else {
        HttpFailure::Connection(err.to_string())
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, HttpFailure> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute(request)
    }

    fn put(&self, url: &str, bearer: Option<&str>, body: Vec<u8>) -> Result<HttpResponse, HttpFailure> {
        let mut request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        self.execute(request)
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, HttpFailure> {
        self.execute(self.client.post(url).form(fields))
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer {
    /// Handles a request and returns the response.
    fn handle(&self, method: Method, path: &str, bearer: Option<&str>, body: &[u8]) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to an in-process
/// server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer + Send + Sync> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    fn path_of(url: &str) -> &str {
        // Strip "scheme://host" and keep the path.
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        without_scheme
            .find('/')
            .map_or("/", |i| &without_scheme[i..])
    }
}

impl<S: LoopbackServer + Send + Sync> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str, bearer: Option<&str>) -> Result<HttpResponse, HttpFailure> {
        Ok(self.server.handle(Method::Get, Self::path_of(url), bearer, &[]))
    }

    fn put(&self, url: &str, bearer: Option<&str>, body: Vec<u8>) -> Result<HttpResponse, HttpFailure> {
        Ok(self.server.handle(Method::Put, Self::path_of(url), bearer, &body))
    }

    fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, HttpFailure> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Ok(self
            .server
            .handle(Method::Post, Self::path_of(url), None, body.as_bytes()))
    }
}
