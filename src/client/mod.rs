//! PingOne HTTP client.
//!
//! [`ApiClient`] is transport only: it resolves per-service base URLs, attaches
//! the bearer token and `User-Agent`, and turns non-success responses into
//! [`ApiError::Status`] with the parsed PingOne error envelope. Bodies are
//! (de)serialised by the caller's types.

pub mod classify;
pub mod error;
pub mod retry;
pub mod token;

use std::{sync::Arc, time::Duration};

use reqwest::{Method, header};
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

pub use classify::{Classified, check_environment_exists_on_permissions_error, classify_failure};
pub use error::{ApiError, ErrorKind, P1Error, P1ErrorDetail, P1InnerError};
pub use retry::{
    Retryable, credential_type_retryable, default_create_read_retryable, default_retryable,
    is_propagation_error, role_assignment_retryable, with_retry,
};
pub use token::TokenSource;

use crate::{
    PRODUCT_NAME, PRODUCT_VERSION,
    config::{ConfigError, ProviderConfig, ResolvedRegion, RetryConfig},
};

/// PingOne service families, each served from its own host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Auth,
    Management,
    AgreementManagement,
}

impl Service {
    fn host_prefix(&self) -> &'static str {
        match self {
            Service::Auth => "auth",
            Service::Management => "api",
            Service::AgreementManagement => "agreementmgmt",
        }
    }
}

/// Base URL for `host`: bare hosts get `https://`, absolute URLs are used as-is.
fn host_base(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// `User-Agent` header value: `<product>/<version>[ <append>]`.
pub fn user_agent(append: Option<&str>) -> String {
    match append.map(str::trim).filter(|a| !a.is_empty()) {
        Some(append) => format!("{}/{} {}", PRODUCT_NAME, PRODUCT_VERSION, append),
        None => format!("{}/{}", PRODUCT_NAME, PRODUCT_VERSION),
    }
}

/// Resolved base URLs for every PingOne service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth: String,
    pub management: String,
    pub agreement_management: String,
}

impl Endpoints {
    /// Endpoints for the given region suffix, with optional host overrides.
    ///
    /// The management override also replaces the agreement-management host, as
    /// both are served behind the same gateway when a custom domain is used.
    pub fn new(suffix: &str, api_override: Option<&str>, auth_override: Option<&str>) -> Self {
        let default_host = |service: Service| format!("{}.pingone.{}", service.host_prefix(), suffix);

        let auth = host_base(auth_override.unwrap_or(&default_host(Service::Auth)));
        let (management, agreement_management) = match api_override {
            Some(host) => {
                let base = host_base(host);
                (format!("{}/v1", base), format!("{}/v1", base))
            }
            None => (
                format!("{}/v1", host_base(&default_host(Service::Management))),
                format!("{}/v1", host_base(&default_host(Service::AgreementManagement))),
            ),
        };

        Self {
            auth,
            management,
            agreement_management,
        }
    }

    pub fn base_url(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth,
            Service::Management => &self.management,
            Service::AgreementManagement => &self.agreement_management,
        }
    }
}

/// Shared PingOne client. Cheap to clone; immutable after construction apart
/// from the token cache.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    endpoints: Arc<Endpoints>,
    retry: RetryConfig,
}

impl ApiClient {
    /// Build a client from validated configuration and a resolved region.
    pub fn from_config(config: &ProviderConfig, region: &ResolvedRegion) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent(config.append_user_agent.as_deref()))
            .connect_timeout(Duration::from_secs(30));

        if let Some(proxy) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| {
                ConfigError::Validation(format!("proxy_url '{}' is not usable: {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| ConfigError::Validation(format!("failed to build HTTP client: {}", e)))?;

        let endpoints = Endpoints::new(
            region.suffix,
            config.api_hostname_override.as_deref(),
            config.auth_hostname_override.as_deref(),
        );
        let tokens = TokenSource::from_credentials(http.clone(), &endpoints.auth, &config.credentials()?);

        Ok(Self::new(http, tokens, endpoints, config.retry.clone()))
    }

    pub fn new(
        http: reqwest::Client,
        tokens: TokenSource,
        endpoints: Endpoints,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            tokens: Arc::new(tokens),
            endpoints: Arc::new(endpoints),
            retry,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn url(&self, service: Service, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoints.base_url(service),
            path.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        method: Method,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let bearer = self.tokens.bearer_header().await?;
        let url = self.url(service, path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(header::AUTHORIZATION, &*bearer)
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        tracing::debug!(
            method = %method,
            url = %url,
            status = status.as_u16(),
            "PingOne API response"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<P1Error>(&body)
            .ok()
            .filter(|e| !e.id.is_empty() || !e.code.is_empty());
        Err(ApiError::Status {
            status,
            body,
            error,
        })
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, service: Service, path: &str) -> Result<T, ApiError> {
        Self::decode(self.send(Method::GET, service, path, &[], None).await?).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        Self::decode(self.send(Method::GET, service, path, query, None).await?).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Self::decode(self.send(Method::POST, service, path, &[], Some(&body)).await?).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        service: Service,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Self::decode(self.send(Method::PUT, service, path, &[], Some(&body)).await?).await
    }

    pub async fn delete(&self, service: Service, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, service, path, &[], None).await?;
        Ok(())
    }

    /// Run `make_request` under the client's retry policy.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        timeout: Option<Duration>,
        is_retryable: Retryable,
        make_request: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let timeout = timeout.unwrap_or_else(|| self.retry.default_timeout());
        with_retry(&self.retry, timeout, cancel, operation, is_retryable, make_request).await
    }
}
