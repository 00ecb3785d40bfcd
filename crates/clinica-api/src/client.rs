// Request executor
//
// Wraps `reqwest::Client` with the clinic backend's conventions: bearer
// auth from the session store, the branch header, the gateway retry
// policy, failure classification and envelope normalization. Endpoint
// helpers (auth, resources) live in sibling modules as inherent methods.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, status_message};
use crate::monitor::ConnectionMonitor;
use crate::normalize::normalize;
use crate::request::Request;
use crate::retry::{RetryPolicy, Sleeper};
use crate::session::{SessionInvalidated, SessionStore};
use crate::transport::TransportConfig;

/// Fixed API root below the server URL.
const API_PREFIX: &str = "/api";

/// Tenant header carrying the principal's branch.
pub const BRANCH_HEADER: &str = "x-sucursal-id";

/// Body fields that may carry a human-readable error, in lookup order.
const MESSAGE_FIELDS: &[&str] = &["message", "error", "mensaje"];

const UNREADABLE_401_BODY: &str = "unable to read the 401 response body";

/// Everything needed to build an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `https://clinic.local`. `/api` is appended.
    pub base_url: Url,
    pub transport: TransportConfig,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Async client for the clinic backend.
///
/// Every call goes through [`execute`](Self::execute). Successful payloads
/// come back normalized (see [`normalize`]); failures come back as a
/// classified [`Error`] after the session store and connection monitor
/// have been updated.
pub struct ApiClient {
    http: reqwest::Client,
    api_root: String,
    session: Arc<SessionStore>,
    monitor: Arc<ConnectionMonitor>,
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from config with fresh in-memory session scopes.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        Ok(Self::with_client(http, &config.base_url).with_retry_policy(config.retry.clone()))
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: &Url) -> Self {
        Self {
            http,
            api_root: api_root(base_url),
            session: Arc::new(SessionStore::in_memory()),
            monitor: Arc::new(ConnectionMonitor::new()),
            policy: RetryPolicy::default(),
            sleeper: Sleeper::default(),
        }
    }

    pub fn with_session(mut self, session: Arc<SessionStore>) -> Self {
        self.session = session;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<ConnectionMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn monitor(&self) -> &Arc<ConnectionMonitor> {
        &self.monitor
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Whether the backend answered the most recent request.
    pub fn is_connected(&self) -> bool {
        self.monitor.is_reachable()
    }

    pub fn subscribe_connection(&self) -> broadcast::Receiver<bool> {
        self.monitor.subscribe()
    }

    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionInvalidated> {
        self.session.subscribe()
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Full URL for an API-relative path.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{path}", self.api_root))?)
    }

    // ── Headers ──────────────────────────────────────────────────────

    /// Content type, bearer token and branch header for the current session.
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = self.session.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token.trim())) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "stored token is not a valid header value"),
            }
        }

        if let Some(branch) = self.session.principal().and_then(|p| p.branch_id()) {
            match HeaderValue::from_str(&branch) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(BRANCH_HEADER), value);
                }
                Err(e) => warn!(error = %e, "branch id is not a valid header value"),
            }
        }

        headers
    }

    // ── Execution ────────────────────────────────────────────────────

    /// Run a request through the retry loop and return the canonical payload.
    ///
    /// A 2xx reply without a JSON body yields `Value::Null`.
    pub async fn execute(&self, request: &Request) -> Result<Value, Error> {
        let url = self.url(&request.path)?;
        let headers = self.headers();
        let max_attempts = self.policy.attempts_for(request.idempotent);

        debug!(
            method = %request.method,
            path = %request.path,
            has_auth = headers.contains_key(AUTHORIZATION),
            max_attempts,
            "request"
        );

        let mut attempt = 1;
        loop {
            match self.attempt(request, &url, &headers).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        path = %request.path,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// [`execute`](Self::execute), then deserialize the canonical payload.
    pub async fn execute_as<T: DeserializeOwned>(&self, request: &Request) -> Result<T, Error> {
        let value = self.execute(request).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Parse {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// One network round trip plus classification.
    async fn attempt(
        &self,
        request: &Request,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<Value, Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await.map_err(|e| self.network_failure(e))?;
        let status = resp.status().as_u16();

        if let Some(err) = self.gateway_failure(status) {
            return Err(err);
        }

        // The backend process answered, even if the call itself failed.
        self.monitor.mark_reachable();

        let success = resp.status().is_success();
        let body = read_json(resp).await;

        if status == 401 {
            let detail = body.as_ref().map_or_else(
                || UNREADABLE_401_BODY.to_owned(),
                auth_failure_detail,
            );
            warn!(path = %request.path, %detail, "session rejected by backend");
            self.session.invalidate(&detail);
            return Err(Error::Authentication { message: detail });
        }

        match (success, body) {
            (true, Some(body)) => Ok(normalize(body)),
            (true, None) => Ok(Value::Null),
            (false, None) => Err(Error::from_status(status, status_message(status), None)),
            (false, Some(body)) => {
                let message = error_message(&body).unwrap_or_else(|| status_message(status));
                Err(Error::from_status(status, message, Some(body)))
            }
        }
    }

    /// Classify a send failure and flag the backend unreachable.
    pub(crate) fn network_failure(&self, source: reqwest::Error) -> Error {
        warn!(error = %source, "no response from backend");
        self.monitor.mark_unreachable();
        Error::Network {
            message: "could not reach the server; check that it is running".into(),
            source,
        }
    }

    /// Gateway error for a retryable status; flags the backend unreachable.
    pub(crate) fn gateway_failure(&self, status: u16) -> Option<Error> {
        if !self.policy.is_retryable_status(status) {
            return None;
        }
        let message = status_message(status);
        warn!(status, %message, "gateway failure");
        self.monitor.mark_unreachable();
        Some(Error::Gateway { status, message })
    }

    // ── Verb shorthands ──────────────────────────────────────────────

    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        self.execute(&Request::get(path)).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, Error> {
        self.execute(&Request::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, Error> {
        self.execute(&Request::put(path).json(body)).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<Value, Error> {
        self.execute(&Request::patch(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, Error> {
        self.execute(&Request::delete(path)).await
    }
}

fn api_root(base_url: &Url) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    if base.ends_with(API_PREFIX) {
        base.to_owned()
    } else {
        format!("{base}{API_PREFIX}")
    }
}

/// Body as JSON, or `None` if it is missing, unreadable or not JSON.
pub(crate) async fn read_json(resp: reqwest::Response) -> Option<Value> {
    let text = match resp.text().await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "failed to read response body");
            return None;
        }
    };
    serde_json::from_str(&text).ok()
}

fn non_empty_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// First server-supplied message among the conventional fields.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    if let Some(s) = body.as_str().filter(|s| !s.trim().is_empty()) {
        return Some(s.to_owned());
    }
    MESSAGE_FIELDS.iter().find_map(|field| {
        non_empty_str(body, field)
            .or_else(|| body.get(*field).and_then(|nested| non_empty_str(nested, "message")))
            .map(str::to_owned)
    })
}

/// Diagnostic for a 401: server message if any, else the whole body.
fn auth_failure_detail(body: &Value) -> String {
    non_empty_str(body, "message")
        .or_else(|| non_empty_str(body, "mensaje"))
        .or_else(|| body.as_str().filter(|s| !s.trim().is_empty()))
        .map_or_else(|| body.to_string(), str::to_owned)
}
