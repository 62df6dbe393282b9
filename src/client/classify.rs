//! Failure classification with parent-environment probing.
//!
//! A 404 on a child resource is ambiguous: the resource may have been deleted,
//! or its whole environment may be gone. Permission errors are ambiguous in
//! the same way, since PingOne answers 400/401/403 for calls into an
//! environment that no longer exists. Both cases are resolved by reading the
//! environment itself.

use reqwest::StatusCode;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{ApiClient, ApiError, ErrorKind, Service, retry::default_retryable};

/// Resolution of a failed call.
#[derive(Debug)]
pub enum Classified {
    /// The resource does not exist but its environment does.
    NotFound(ApiError),
    /// The resource's environment does not exist.
    ParentGone(ApiError),
    /// Anything else, including failures of the environment probe.
    Failed(ApiError),
}

impl Classified {
    /// Whether the resource should be treated as absent.
    pub fn is_gone(&self) -> bool {
        matches!(self, Classified::NotFound(_) | Classified::ParentGone(_))
    }

    pub fn into_error(self) -> ApiError {
        match self {
            Classified::NotFound(e) | Classified::ParentGone(e) | Classified::Failed(e) => e,
        }
    }
}

enum Probe {
    Exists,
    Gone(ApiError),
    Failed(ApiError),
}

async fn probe_environment(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
) -> Probe {
    let path = format!("environments/{}", environment_id);
    let result = client
        .execute(cancel, "ReadOneEnvironment", None, default_retryable, || {
            client.get::<Value>(Service::Management, &path)
        })
        .await;

    match result {
        Ok(_) => Probe::Exists,
        Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Probe::Gone(e),
        Err(e) => Probe::Failed(e),
    }
}

fn is_permissions_status(error: &ApiError) -> bool {
    matches!(
        error.status(),
        Some(StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    )
}

/// Classify a failed call on a resource that lives in `environment_id`.
///
/// - 404 (or `NOT_FOUND`): the environment is probed; a 404 there is
///   [`Classified::ParentGone`], success is [`Classified::NotFound`] and any
///   other probe failure is terminal.
/// - 400/401/403: the environment is probed; a 404 there is
///   [`Classified::ParentGone`], otherwise the original error stands.
/// - Everything else is [`Classified::Failed`] without probing.
pub async fn classify_failure(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
    error: ApiError,
) -> Classified {
    if error.kind() == ErrorKind::NotFound {
        return match probe_environment(client, cancel, environment_id).await {
            Probe::Exists => Classified::NotFound(error),
            Probe::Gone(_) => {
                tracing::warn!(
                    environment_id = environment_id,
                    "Resource read returned 404 and the parent environment no longer exists"
                );
                Classified::ParentGone(error)
            }
            Probe::Failed(probe_error) => Classified::Failed(probe_error),
        };
    }

    if is_permissions_status(&error) {
        return match check_environment_exists_on_permissions_error(client, cancel, environment_id, error).await {
            e if e.status() == Some(StatusCode::NOT_FOUND) => Classified::ParentGone(e),
            e => Classified::Failed(e),
        };
    }

    Classified::Failed(error)
}

/// On a 400/401/403, read the environment; if it is gone, return the
/// environment's 404 in place of the original error.
pub async fn check_environment_exists_on_permissions_error(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
    error: ApiError,
) -> ApiError {
    if !is_permissions_status(&error) {
        return error;
    }

    match probe_environment(client, cancel, environment_id).await {
        Probe::Gone(not_found) => {
            tracing::warn!(
                environment_id = environment_id,
                status = error.status().map(|s| s.as_u16()),
                "API responded with 400, 401 or 403, and the environment doesn't exist. Overriding resource response."
            );
            not_found
        }
        Probe::Exists | Probe::Failed(_) => error,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::client::test_support::mock_client;

    const ENV: &str = "9c052a8a-14be-44e4-8f07-2662569994ce";

    fn status_error(status: u16, code: &str) -> ApiError {
        ApiError::Status {
            status: StatusCode::from_u16(status).unwrap(),
            body: String::new(),
            error: Some(crate::client::P1Error {
                id: "x".into(),
                code: code.into(),
                message: code.into(),
                details: vec![],
            }),
        }
    }

    async fn server_with_environment(status: u16) -> MockServer {
        let server = MockServer::start().await;
        let body = if status == 200 {
            json!({"id": ENV, "type": "SANDBOX"})
        } else {
            json!({"id": "y", "code": "NOT_FOUND", "message": "Unable to find environment"})
        };
        Mock::given(method("GET"))
            .and(path(format!("/v1/environments/{}", ENV)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_not_found_with_live_environment() {
        let server = server_with_environment(200).await;
        let classified = classify_failure(
            &mock_client(&server.uri()),
            &CancellationToken::new(),
            ENV,
            status_error(404, "NOT_FOUND"),
        )
        .await;
        assert!(matches!(classified, Classified::NotFound(_)));
        assert!(classified.is_gone());
    }

    #[tokio::test]
    async fn test_not_found_with_missing_environment() {
        let server = server_with_environment(404).await;
        let classified = classify_failure(
            &mock_client(&server.uri()),
            &CancellationToken::new(),
            ENV,
            status_error(404, "NOT_FOUND"),
        )
        .await;
        assert!(matches!(classified, Classified::ParentGone(_)));
    }

    #[tokio::test]
    async fn test_environment_check_failure_is_terminal() {
        let server = server_with_environment(500).await;
        let classified = classify_failure(
            &mock_client(&server.uri()),
            &CancellationToken::new(),
            ENV,
            status_error(404, "NOT_FOUND"),
        )
        .await;
        let Classified::Failed(err) = classified else {
            panic!("expected Failed");
        };
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_permission_error_with_missing_environment() {
        let server = server_with_environment(404).await;
        let client = mock_client(&server.uri());

        let err = check_environment_exists_on_permissions_error(
            &client,
            &CancellationToken::new(),
            ENV,
            status_error(403, "ACCESS_FAILED"),
        )
        .await;
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_permission_error_with_live_environment() {
        let server = server_with_environment(200).await;
        let classified = classify_failure(
            &mock_client(&server.uri()),
            &CancellationToken::new(),
            ENV,
            status_error(401, "ACCESS_FAILED"),
        )
        .await;
        let Classified::Failed(err) = classified else {
            panic!("expected Failed");
        };
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn test_server_error_skips_environment_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let classified = classify_failure(
            &mock_client(&server.uri()),
            &CancellationToken::new(),
            ENV,
            status_error(500, "UNEXPECTED_ERROR"),
        )
        .await;
        assert!(matches!(classified, Classified::Failed(_)));
    }
}
