//! HTTP transport implementation.
//!
//! [`HttpRemote`] speaks the remote's JSON/bytes protocol on top of any
//! [`HttpClient`]. [`ReqwestClient`] is the production client;
//! [`LoopbackClient`] routes requests straight into an in-process server
//! for tests.

use crate::error::{SyncError, SyncResult};
use crate::transport::{ModelDownload, RemoteModelClient, RemoteModelDescriptor, RemoteProfileClient};
use reqwest::Url;
use std::fmt;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::debug;
use waw_sync_protocol::{ContentHash, ProfilePayload, MODEL_LATEST_PATH, MODEL_SHA256_HEADER, PROFILE_PATH};

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers with lowercase names.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response without headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response whose body has not been read yet.
pub struct HttpStream {
    /// Status code.
    pub status: u16,
    /// Headers with lowercase names.
    pub headers: Vec<(String, String)>,
    /// Body stream.
    pub body: Box<dyn Read + Send>,
}

impl HttpStream {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        is_success(self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

impl fmt::Debug for HttpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStream")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl From<HttpResponse> for HttpStream {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: Box::new(Cursor::new(response.body)),
        }
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// HTTP client abstraction.
///
/// Implementations return `Err` only when no response was received;
/// non-2xx statuses come back as responses.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body.
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<HttpResponse>;

    /// Sends a GET and returns the unread body.
    fn get_stream(&self, url: &str) -> SyncResult<HttpStream>;

    /// Sends a DELETE.
    fn delete(&self, url: &str) -> SyncResult<HttpResponse>;
}

/// Blocking `reqwest` client with a whole-request timeout.
///
/// The timeout covers connecting, sending and reading the response body.
/// Like any `reqwest::blocking` client it must not be created, used or
/// dropped on an async executor thread.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client whose requests fail after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a non-retryable transport error if the TLS backend cannot be
    /// initialized.
    pub fn new(timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("waw-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }
}

fn map_reqwest(err: reqwest::Error) -> SyncError {
    if err.is_timeout() {
        SyncError::Timeout
    } else if err.is_builder() {
        SyncError::transport_fatal(err.to_string())
    } else {
        SyncError::transport_retryable(err.to_string())
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

fn buffer(response: reqwest::blocking::Response) -> SyncResult<HttpResponse> {
    let status = response.status().as_u16();
    let headers = collect_headers(response.headers());
    let body = response.bytes().map_err(map_reqwest)?.to_vec();
    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

impl HttpClient for ReqwestClient {
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<HttpResponse> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(map_reqwest)?;
        buffer(response)
    }

    fn get_stream(&self, url: &str) -> SyncResult<HttpStream> {
        let response = self.client.get(url).send().map_err(map_reqwest)?;
        Ok(HttpStream {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
            body: Box::new(response),
        })
    }

    fn delete(&self, url: &str) -> SyncResult<HttpResponse> {
        let response = self.client.delete(url).send().map_err(map_reqwest)?;
        buffer(response)
    }
}

/// The remote profile and model services over HTTP.
///
/// - `POST {base}/profile` with a JSON [`ProfilePayload`]
/// - `DELETE {base}/profile/{id}`
/// - `GET {base}/model/latest`, hash in the `X-Model-SHA256` header
#[derive(Debug)]
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a remote rooted at `base_url` (e.g., "https://sync.example.com").
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/profile/{id}` with `id` percent-encoded as one path segment.
    fn profile_url(&self, id: &str) -> SyncResult<Url> {
        let mut url = Url::parse(&self.url(PROFILE_PATH))
            .map_err(|e| SyncError::transport_fatal(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SyncError::transport_fatal("base url cannot hold a path"))?
            .push(id);
        Ok(url)
    }
}

impl<C: HttpClient> RemoteProfileClient for HttpRemote<C> {
    fn push_profile(&self, payload: &ProfilePayload) -> SyncResult<()> {
        let body = payload.encode()?;
        let response = self.client.post_json(&self.url(PROFILE_PATH), body)?;
        if !response.is_success() {
            return Err(SyncError::rejection(response.status, &response.body));
        }
        debug!(id = %payload.id, status = response.status, "profile accepted by remote");
        Ok(())
    }

    fn delete_profile(&self, id: &str) -> SyncResult<bool> {
        let response = self.client.delete(self.profile_url(id)?.as_str())?;
        match response.status {
            404 => Ok(false),
            status if is_success(status) => Ok(true),
            status => Err(SyncError::rejection(status, &response.body)),
        }
    }
}

impl<C: HttpClient> RemoteModelClient for HttpRemote<C> {
    fn fetch_latest(&self) -> SyncResult<ModelDownload> {
        let stream = self.client.get_stream(&self.url(MODEL_LATEST_PATH))?;
        if !stream.is_success() {
            let mut excerpt = Vec::new();
            // Best effort: the status alone is enough to report the rejection.
            let _ = stream.body.take(512).read_to_end(&mut excerpt);
            return Err(SyncError::rejection(stream.status, &excerpt));
        }

        let sha256 = stream
            .header(MODEL_SHA256_HEADER)
            .map(ContentHash::parse)
            .transpose()?;
        Ok(ModelDownload {
            descriptor: RemoteModelDescriptor { sha256 },
            body: stream.body,
        })
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request for `path` (no scheme or host) and returns the
    /// response.
    fn handle(&self, method: &str, path: &str, body: &[u8]) -> HttpResponse;
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
#[derive(Debug)]
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the wrapped server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

/// Strips scheme and authority from `url`.
fn request_path(url: &str) -> &str {
    match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            rest.find('/').map_or("/", |j| &rest[j..])
        }
        None => url,
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn post_json(&self, url: &str, body: Vec<u8>) -> SyncResult<HttpResponse> {
        Ok(self.server.handle("POST", request_path(url), &body))
    }

    fn get_stream(&self, url: &str) -> SyncResult<HttpStream> {
        Ok(self.server.handle("GET", request_path(url), &[]).into())
    }

    fn delete(&self, url: &str) -> SyncResult<HttpResponse> {
        Ok(self.server.handle("DELETE", request_path(url), &[]))
    }
}
