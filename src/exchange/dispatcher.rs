use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::exchange::error::ExchangeError;
use crate::exchange::signer::{Credentials, Signer};
use crate::metrics;
use crate::rate_limiter::TokenBucket;

pub const HEADER_API_KEY: &str = "APIKey";
pub const HEADER_NONCE: &str = "Nonce";
pub const HEADER_AUTHENT: &str = "Authent";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Empty parameter set for endpoints that take none.
pub const NO_PARAMS: &[(&str, &str)] = &[];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

/// What goes into the `Authent` message for a given call shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedPayload {
    Unsigned,
    /// Query parameters are not part of the message; the body slot is "".
    EmptyBody,
    /// The exact form-encoded transport body.
    FormBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    pub signed: SignedPayload,
    pub params_in_query: bool,
    pub content_type: Option<&'static str>,
}

/// The venue's request conventions.
///
/// Private GETs sign over an empty body even when a query string is sent and
/// still announce `application/json`; both are venue requirements.
pub fn auth_policy(method: HttpMethod, private: bool) -> AuthPolicy {
    match (method, private) {
        (HttpMethod::Get, false) => AuthPolicy {
            signed: SignedPayload::Unsigned,
            params_in_query: true,
            content_type: None,
        },
        (HttpMethod::Get, true) => AuthPolicy {
            signed: SignedPayload::EmptyBody,
            params_in_query: true,
            content_type: Some(CONTENT_TYPE_JSON),
        },
        (HttpMethod::Post, false) => AuthPolicy {
            signed: SignedPayload::Unsigned,
            params_in_query: false,
            content_type: Some(CONTENT_TYPE_FORM),
        },
        (HttpMethod::Post, true) => AuthPolicy {
            signed: SignedPayload::FormBody,
            params_in_query: false,
            content_type: Some(CONTENT_TYPE_FORM),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// The HTTP layer underneath the dispatcher.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, String>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<TransportResponse, String> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        Ok(TransportResponse { status, body })
    }
}

pub struct RequestDispatcher {
    base_url: String,
    credentials: Option<Credentials>,
    signer: Option<Signer>,
    transport: Arc<dyn HttpTransport>,
    limiter: Option<TokenBucket>,
}

impl RequestDispatcher {
    /// Dispatcher for public endpoints only.
    pub fn public(base_url: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            signer: None,
            transport,
            limiter: None,
        }
    }

    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ExchangeError> {
        let signer = Signer::new(&credentials.secret)?;
        Ok(Self::with_signer(base_url, credentials, signer, transport))
    }

    pub fn with_signer(
        base_url: impl Into<String>,
        credentials: Credentials,
        signer: Signer,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: Some(credentials),
            signer: Some(signer),
            transport,
            limiter: None,
        }
    }

    pub fn with_rate_limit(mut self, limiter: TokenBucket) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the transport request for one call. Consumes a nonce when private.
    pub fn prepare<P: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &P,
        private: bool,
    ) -> Result<PreparedRequest, ExchangeError> {
        let endpoint = format!("{} {}", method, path);
        let encoded = serde_urlencoded::to_string(params).map_err(|e| {
            ExchangeError::transport(&endpoint, format!("could not encode parameters: {}", e))
        })?;

        let policy = auth_policy(method, private);
        let mut url = format!("{}{}", self.base_url, path);
        let mut body = None;
        if policy.params_in_query {
            if !encoded.is_empty() {
                url.push('?');
                url.push_str(&encoded);
            }
        } else {
            body = Some(encoded);
        }

        let mut headers = Vec::with_capacity(4);
        if policy.signed != SignedPayload::Unsigned {
            let (credentials, signer) = match (&self.credentials, &self.signer) {
                (Some(c), Some(s)) => (c, s),
                _ => {
                    return Err(ExchangeError::Configuration(format!(
                        "{} requires API credentials",
                        endpoint
                    )));
                }
            };
            let nonce = signer.next_nonce();
            let message_body = match policy.signed {
                SignedPayload::FormBody => body.as_deref().unwrap_or_default(),
                _ => "",
            };
            let authent = signer.sign(path, &nonce, message_body);
            headers.push((HEADER_API_KEY, credentials.key.clone()));
            headers.push((HEADER_NONCE, nonce));
            headers.push((HEADER_AUTHENT, authent));
        }
        if let Some(content_type) = policy.content_type {
            headers.push((HEADER_CONTENT_TYPE, content_type.to_string()));
        }

        Ok(PreparedRequest {
            method,
            url,
            headers,
            body,
        })
    }

    /// Perform one call. No retries: any failure is returned as `ExchangeError::Transport`.
    pub async fn call<P: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &P,
        private: bool,
    ) -> Result<Value, ExchangeError> {
        let endpoint = format!("{} {}", method, path);
        // Wait first so the nonce is taken at send time.
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        let request = self.prepare(method, path, params, private)?;

        debug!(endpoint = %endpoint, private, "dispatching exchange request");
        let result = self.send(&endpoint, request).await;
        if let Err(e) = &result {
            warn!(endpoint = %endpoint, error = %e, "exchange request failed");
            metrics::inc_exchange_failures(&endpoint);
        }
        result
    }

    async fn send(&self, endpoint: &str, request: PreparedRequest) -> Result<Value, ExchangeError> {
        let response = self
            .transport
            .execute(request)
            .await
            .map_err(|e| ExchangeError::transport(endpoint, e))?;

        if !(200..300).contains(&response.status) {
            return Err(ExchangeError::transport(
                endpoint,
                format!("HTTP {}: {}", response.status, response.body),
            ));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            ExchangeError::transport(endpoint, format!("malformed response body: {}", e))
        })
    }
}
