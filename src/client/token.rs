//! Bearer token acquisition and caching.
//!
//! Worker applications authenticate with the OAuth2 client-credentials grant
//! against `https://auth.pingone.<suffix>/<environment_id>/as/token`. The
//! token is cached as a pre-formatted `Bearer ...` header value and refreshed
//! shortly before it expires.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use serde::Deserialize;
use tokio::sync::RwLock;

use super::error::ApiError;
use crate::config::Credentials;

/// Refresh tokens this long before the server-reported expiry.
const TOKEN_REFRESH_BUFFER_SECS: u64 = 300;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    bearer_header: Arc<str>,
    /// Expiry with `TOKEN_REFRESH_BUFFER_SECS` already subtracted.
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

struct ClientCredentialsGrant {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: RwLock<Option<CachedToken>>,
}

enum Source {
    Static(Arc<str>),
    ClientCredentials(ClientCredentialsGrant),
}

/// Supplies `Authorization` header values for management API calls.
pub struct TokenSource {
    source: Source,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Source::Static(_) => f.debug_struct("TokenSource").field("type", &"Static").finish(),
            Source::ClientCredentials(grant) => f
                .debug_struct("TokenSource")
                .field("type", &"ClientCredentials")
                .field("token_url", &grant.token_url)
                .field("client_id", &grant.client_id)
                .finish(),
        }
    }
}

impl TokenSource {
    /// A token source that always returns the given access token.
    pub fn from_access_token(token: &str) -> Self {
        Self {
            source: Source::Static(format!("Bearer {}", token).into()),
        }
    }

    /// A token source that runs the client-credentials grant against `auth_base`.
    pub fn from_client_credentials(
        http: reqwest::Client,
        auth_base: &str,
        environment_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Self {
        Self {
            source: Source::ClientCredentials(ClientCredentialsGrant {
                http,
                token_url: format!("{}/{}/as/token", auth_base.trim_end_matches('/'), environment_id),
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
                cached: RwLock::new(None),
            }),
        }
    }

    pub fn from_credentials(http: reqwest::Client, auth_base: &str, credentials: &Credentials) -> Self {
        match credentials {
            Credentials::AccessToken(token) => Self::from_access_token(token),
            Credentials::ClientCredentials {
                client_id,
                client_secret,
                environment_id,
            } => Self::from_client_credentials(http, auth_base, environment_id, client_id, client_secret),
        }
    }

    /// Returns a valid `Bearer {token}` header value, fetching a new token if needed.
    ///
    /// Concurrent callers share one refresh: the first to take the write lock
    /// fetches, the rest find the fresh token on the double-check.
    pub async fn bearer_header(&self) -> Result<Arc<str>, ApiError> {
        match &self.source {
            Source::Static(header) => Ok(header.clone()),
            Source::ClientCredentials(grant) => grant.bearer_header().await,
        }
    }

    /// Clears the cached token, forcing a refresh on the next call.
    pub async fn clear_cache(&self) {
        if let Source::ClientCredentials(grant) = &self.source {
            *grant.cached.write().await = None;
        }
    }
}

impl ClientCredentialsGrant {
    async fn bearer_header(&self) -> Result<Arc<str>, ApiError> {
        let ClientCredentialsGrant {
            http,
            token_url,
            client_id,
            client_secret,
            cached,
        } = self;

        // Fast path
        {
            let cache = cached.read().await;
            if let Some(ref token) = *cache
                && !token.is_expired()
            {
                return Ok(token.bearer_header.clone());
            }
        }

        let mut cache = cached.write().await;

        // Another caller may have refreshed while we waited for the write lock
        if let Some(ref token) = *cache
            && !token.is_expired()
        {
            return Ok(token.bearer_header.clone());
        }

        let response = http
            .post(token_url.as_str())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ApiError::AuthFailed(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::AuthFailed(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::AuthFailed(format!("invalid token response: {}", e)))?;

        if let Some(token_type) = token.token_type.as_deref()
            && !token_type.eq_ignore_ascii_case("bearer")
        {
            return Err(ApiError::AuthFailed(format!(
                "unsupported token type '{}'",
                token_type
            )));
        }

        let expires_in_secs = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = Instant::now()
            + Duration::from_secs(expires_in_secs)
                .saturating_sub(Duration::from_secs(TOKEN_REFRESH_BUFFER_SECS));

        let bearer_header: Arc<str> = format!("Bearer {}", token.access_token).into();
        *cache = Some(CachedToken {
            bearer_header: bearer_header.clone(),
            expires_at,
        });

        tracing::debug!(
            client_id = %client_id,
            expires_in_secs = expires_in_secs,
            "Acquired new PingOne access token"
        );

        Ok(bearer_header)
    }
}
