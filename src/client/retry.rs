//! Deadline-bounded retry for PingOne API calls.
//!
//! PingOne is eventually consistent across its services: a freshly created
//! role assignment, issuer profile or environment may not be visible to the
//! node serving the next request. Those failures carry recognisable messages
//! and are retried with capped exponential backoff until the operation's
//! deadline; anything else is returned to the caller on first failure.

use std::{future::Future, sync::LazyLock, time::Duration};

use regex::Regex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{
    ApiError, PATTERN_ACTOR_NOT_AUTHORIZED, PATTERN_BROADER_SCOPE, PATTERN_ISSUER_PROFILE_MISSING,
};
use crate::config::RetryConfig;

/// Decides whether a failed attempt should be retried.
pub type Retryable = fn(&ApiError) -> bool;

static ACTOR_NOT_AUTHORIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PATTERN_ACTOR_NOT_AUTHORIZED).unwrap());
static BROADER_SCOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PATTERN_BROADER_SCOPE).unwrap());
static ISSUER_PROFILE_MISSING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PATTERN_ISSUER_PROFILE_MISSING).unwrap());

fn message_matches(error: &ApiError, re: &Regex) -> bool {
    error.p1_error().is_some_and(|e| re.is_match(&e.message))
}

fn first_detail_matches(error: &ApiError, re: &Regex) -> bool {
    error
        .p1_error()
        .and_then(|e| e.first_detail())
        .is_some_and(|d| re.is_match(&d.message))
}

/// Never retries beyond the built-in propagation patterns.
pub fn default_retryable(_error: &ApiError) -> bool {
    false
}

/// Create and read calls: the worker's role assignments may still be propagating.
pub fn default_create_read_retryable(error: &ApiError) -> bool {
    let matched = message_matches(error, &ACTOR_NOT_AUTHORIZED);
    if matched {
        warn!("Insufficient PingOne privileges detected");
    }
    matched
}

/// Role assignments: the granting actor's own scope may still be propagating.
pub fn role_assignment_retryable(error: &ApiError) -> bool {
    first_detail_matches(error, &BROADER_SCOPE) || default_create_read_retryable(error)
}

/// Credential types: the issuer profile may not have finished provisioning.
pub fn credential_type_retryable(error: &ApiError) -> bool {
    if first_detail_matches(error, &ISSUER_PROFILE_MISSING) {
        warn!("Issuer profile (prerequisite) has not finished provisioning, retrying");
        return true;
    }
    default_create_read_retryable(error)
}

/// Matches any of the known propagation patterns.
pub fn is_propagation_error(error: &ApiError) -> bool {
    message_matches(error, &ACTOR_NOT_AUTHORIZED)
        || first_detail_matches(error, &BROADER_SCOPE)
        || first_detail_matches(error, &ISSUER_PROFILE_MISSING)
}

/// Execute `operation` until it succeeds, fails terminally, the deadline
/// passes, or `cancel` fires.
///
/// Attempts run serially. A new attempt is only started when the backoff
/// delay ends before the deadline, so total time is bounded by `timeout` plus
/// the latency of the last attempt.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    timeout: Duration,
    cancel: &CancellationToken,
    operation: &str,
    is_retryable: Retryable,
    mut make_request: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            result = make_request() => result,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(
                        operation = operation,
                        attempt = attempt + 1,
                        "Request succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(ApiError::Cancelled) => return Err(ApiError::Cancelled),
            Err(error) => error,
        };

        if !(is_propagation_error(&error) || is_retryable(&error)) {
            if attempt > 0 {
                warn!(
                    operation = operation,
                    error = %error,
                    attempts = attempt + 1,
                    "Request failed after retry"
                );
            }
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt);
        if Instant::now() + delay > deadline {
            warn!(
                operation = operation,
                error = %error,
                attempts = attempt + 1,
                timeout_secs = timeout.as_secs(),
                "Retry deadline reached"
            );
            return Err(ApiError::DeadlineExceeded {
                timeout,
                source: Box::new(error),
            });
        }

        warn!(
            operation = operation,
            error = %error,
            attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "Retryable error, will retry after delay"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
