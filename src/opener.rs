//! Per-device HTTP request opener
//!
//! An [`Opener`] is configured once for a device's `host:port` and issues
//! single-shot requests against it. Every request carries a browser-like
//! `User-Agent`, some box firmwares refuse anything else. When the device has
//! a password, basic auth credentials are attached to requests for its
//! authority only.
use std::{fmt, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;
use ureq::Agent;
use url::{Host, Url};

use crate::error::{Error, Result};

#[cfg(test)]
use std::sync::{Arc, Mutex};

pub const USER_AGENT: &str = "Mozilla/5.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent.
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> UreqTransport {
        // Status codes are reported through HttpResponse, not as errors.
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        UreqTransport { agent }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut response = match request.method {
            Method::Get => {
                let mut builder = self.agent.get(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()?
            }
            Method::Post => {
                let mut builder = self.agent.post(request.url.as_str());
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.send(request.body.clone().unwrap_or_default())?
            }
        };

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string()?;

        Ok(HttpResponse { status, body })
    }
}

/// Basic auth credentials valid for a single `host:port`.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    host: String,
    port: u16,
    // `None` when `host` is not a valid URL host, nothing is covered then.
    scope: Option<Host<String>>,
    username: String,
    password: String,
}

impl BasicAuth {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> BasicAuth {
        let scope = Url::parse(&format!("http://{}/", bracketed(host)))
            .ok()
            .and_then(|url| url.host().map(|host| host.to_owned()));

        BasicAuth {
            host: host.to_string(),
            port,
            scope,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` the credentials are valid for
    pub fn scope(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether credentials should be sent along with a request to `url`
    pub fn covers(&self, url: &str) -> bool {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match (&self.scope, url.host()) {
            (Some(scope), Some(host)) => {
                host.to_owned() == *scope && url.port_or_known_default() == Some(self.port)
            }
            _ => false,
        }
    }

    pub fn header_value(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.password);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// IPv6 literals need brackets inside a URL.
fn bracketed(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

pub struct Opener {
    base_url: String,
    auth: Option<BasicAuth>,
    transport: Box<dyn Transport>,
}

impl Opener {
    pub fn new(host: &str, port: u16, timeout: Duration, auth: Option<BasicAuth>) -> Opener {
        Self::with_transport(host, port, auth, Box::new(UreqTransport::new(timeout)))
    }

    pub fn with_transport(
        host: &str,
        port: u16,
        auth: Option<BasicAuth>,
        transport: Box<dyn Transport>,
    ) -> Opener {
        let base_url = format!("http://{}:{}", bracketed(host), port);

        Opener {
            base_url,
            auth,
            transport,
        }
    }

    pub fn auth(&self) -> Option<&BasicAuth> {
        self.auth.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path` on this device. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Send a request with the opener's headers applied and return the raw response.
    pub fn open(&self, mut request: HttpRequest) -> Result<HttpResponse> {
        if request.header("User-Agent").is_none() {
            request.set_header("User-Agent", USER_AGENT.to_string());
        }
        if let Some(auth) = self.auth.as_ref().filter(|auth| auth.covers(&request.url)) {
            request.set_header("Authorization", auth.header_value());
        }

        debug!("{} {}", request.method, request.url);
        self.transport.send(&request)
    }

    pub fn get(&self, path: &str) -> Result<String> {
        self.read(HttpRequest::get(self.url(path)))
    }

    pub fn post(&self, path: &str, body: &str) -> Result<String> {
        self.read(HttpRequest::post(self.url(path), body))
    }

    fn read(&self, request: HttpRequest) -> Result<String> {
        let url = request.url.clone();
        let response = self.open(request)?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(Error::Status {
                url,
                status: response.status,
            })
        }
    }
}

impl fmt::Debug for Opener {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Opener")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .finish()
    }
}

#[cfg(test)]
#[derive(Clone)]
pub struct TransportMock {
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    response: Arc<Mutex<Option<Result<HttpResponse>>>>,
}

#[cfg(test)]
impl TransportMock {
    pub fn new() -> TransportMock {
        TransportMock {
            requests: Arc::new(Mutex::new(Vec::new())),
            response: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_send_return_value(&self, resp: Result<HttpResponse>) {
        *self.response.lock().unwrap() = Some(resp);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Transport for TransportMock {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.lock().unwrap().take().unwrap_or(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }))
    }
}
