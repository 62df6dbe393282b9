//! Turns PingOne API results into diagnostics.
//!
//! Every API call made by a resource goes through [`parse_response`] (or
//! [`parse_read_response`] for reads and deletes): the call runs under the
//! retry engine, and a failure is passed through an ordered list of
//! [`CustomErrorHandler`]s. The first handler returning `Some` decides the
//! diagnostics; if none match, the error is rendered by
//! [`format_pingone_error`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{AttributePath, Diagnostics};
use crate::client::{
    ApiClient, ApiError, Classified, ErrorKind, P1Error, Retryable,
    check_environment_exists_on_permissions_error, classify_failure, default_retryable,
};

/// Inspects a failed call and optionally claims it.
pub type CustomErrorHandler = fn(&ApiError) -> Option<Diagnostics>;

const NOT_FOUND_SUMMARY: &str = "Requested resource not found";
const NOT_FOUND_DETAIL: &str = "The requested resource configuration cannot be found in the PingOne service.  If the requested resource is managed in Terraform's state, it may have been removed outside of Terraform.";

/// 404 or `NOT_FOUND`: warn instead of failing.
pub fn resource_not_found_warning(error: &ApiError) -> Option<Diagnostics> {
    if !error.is_not_found() {
        return None;
    }

    let mut diags = Diagnostics::new();
    match error.p1_error() {
        Some(p1) if p1.code == "NOT_FOUND" => diags.add_warning(
            NOT_FOUND_SUMMARY,
            format!("{}\nAPI error: {}", NOT_FOUND_DETAIL, p1.message),
        ),
        _ => diags.add_warning(NOT_FOUND_SUMMARY, NOT_FOUND_DETAIL),
    }
    Some(diags)
}

/// `INVALID_VALUE` on the `name` field.
pub fn invalid_value_name(error: &ApiError) -> Option<Diagnostics> {
    let detail = error.p1_error()?.first_detail()?;
    if detail.code != "INVALID_VALUE" || detail.target.as_deref() != Some("name") {
        return None;
    }

    let mut diags = Diagnostics::new();
    diags.add_error("Invalid Value", detail.message.clone());
    Some(diags)
}

/// `INVALID_VALUE` on any other field, bound to that attribute.
pub fn invalid_value_attribute(error: &ApiError) -> Option<Diagnostics> {
    let detail = error.p1_error()?.first_detail()?;
    let target = detail.target.as_deref()?;
    if detail.code != "INVALID_VALUE" || target == "scope" {
        return None;
    }

    let mut diags = Diagnostics::new();
    diags.add_attribute_error(
        AttributePath::parse(&to_snake_case(target)),
        "Invalid Value",
        detail.message.clone(),
    );
    Some(diags)
}

/// Role/scope combination rejected by the server.
pub fn conflicting_scope(error: &ApiError) -> Option<Diagnostics> {
    let detail = error.p1_error()?.first_detail()?;
    if detail.target.as_deref() != Some("scope") {
        return None;
    }

    let mut diags = Diagnostics::new();
    diags.add_attribute_error(
        AttributePath::root("scope"),
        "Incompatible role and scope combination",
        detail.message.clone(),
    );
    Some(diags)
}

/// Refusal raised before submitting against a `MANAGED` credential type.
pub fn forbidden_mode(error: &ApiError) -> Option<Diagnostics> {
    let ApiError::Refused(message, ErrorKind::ForbiddenMode) = error else {
        return None;
    };

    let mut diags = Diagnostics::new();
    diags.add_error("Invalid credential type management mode", message.clone());
    Some(diags)
}

/// `credentialTypeId` → `credential_type_id`, `automation.issue` kept dotted.
fn to_snake_case(target: &str) -> String {
    let mut out = String::with_capacity(target.len() + 4);
    for c in target.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Summary and detail text for a PingOne error envelope.
pub fn format_pingone_error(request_id: &str, error: &P1Error) -> (String, String) {
    let summary = format!("Error when calling `{}`: {}", request_id, error.message);
    let mut detail = format!(
        "PingOne Error Details:\nID:\t\t{}\nCode:\t\t{}\nMessage:\t{}",
        error.id, error.code, error.message
    );

    if !error.details.is_empty() {
        let rendered: Vec<String> = error
            .details
            .iter()
            .map(|d| {
                let mut out = String::new();
                let mut marker = "-";
                if !d.code.is_empty() {
                    out.push_str(&format!("  {} Code:\t{}\n", marker, d.code));
                    marker = " ";
                }
                if !d.message.is_empty() {
                    out.push_str(&format!("  {} Message:\t{}\n", marker, d.message));
                    marker = " ";
                }
                if let Some(target) = &d.target {
                    out.push_str(&format!("  {} Target:\t{}\n", marker, target));
                    marker = " ";
                }
                if let Some(inner) = &d.inner_error {
                    let data = serde_json::to_string(inner).unwrap_or_default();
                    out.push_str(&format!("  {} Data:\t{}\n", marker, data));
                }
                out
            })
            .collect();
        detail.push_str(&format!("\nDetails:\n{}", rendered.join("\n")));
    }

    (summary, detail)
}

/// Diagnostics for a failed call: first matching handler, else the default rendering.
pub fn error_diagnostics(
    request_id: &str,
    error: &ApiError,
    handlers: &[CustomErrorHandler],
) -> Diagnostics {
    if let Some(diags) = handlers.iter().find_map(|handler| handler(error)) {
        return diags;
    }

    let mut diags = Diagnostics::new();
    if let Some(p1) = error.p1_error().filter(|e| !e.id.is_empty()) {
        let (summary, detail) = format_pingone_error(request_id, p1);
        diags.add_error(summary, detail);
        return diags;
    }

    match error {
        ApiError::Status { status, body, .. } => {
            tracing::error!(
                request_id = request_id,
                status = status.as_u16(),
                body = %body,
                "Error when calling PingOne API"
            );
            diags.add_error(format!("Error when calling `{}`: {}", request_id, error), "");
        }
        ApiError::Transport(e) => {
            tracing::warn!(request_id = request_id, error = %e, "Detected HTTP error");
            diags.add_error(format!("Error when calling `{}`: {}", request_id, error), "");
        }
        _ => {
            tracing::warn!(request_id = request_id, error = ?error, "Detected unknown error");
            diags.add_error(
                format!("Error when calling `{}`: {}", request_id, error),
                format!("A generic error has occurred.\nError details: {:?}", error),
            );
        }
    }
    diags
}

/// How a single API call is run and reported.
#[derive(Clone, Copy)]
pub struct Request<'a> {
    /// Operation name used in logs and error summaries, e.g. `CreatePopulation`.
    pub request_id: &'a str,
    pub retryable: Retryable,
    pub handlers: &'a [CustomErrorHandler],
    /// Deadline override; the client's default applies when `None`.
    pub timeout: Option<Duration>,
    /// Environment to probe when the call fails with 400/401/403.
    pub environment_id: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub fn new(request_id: &'a str) -> Self {
        Self {
            request_id,
            retryable: default_retryable,
            handlers: &[],
            timeout: None,
            environment_id: None,
        }
    }

    pub fn retryable(mut self, retryable: Retryable) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn handlers(mut self, handlers: &'a [CustomErrorHandler]) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn environment(mut self, environment_id: &'a str) -> Self {
        self.environment_id = Some(environment_id);
        self
    }
}

/// Result of a parsed call. `value` is `None` whenever the call failed, even
/// when a handler downgraded the failure to warnings.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: Option<T>,
    pub diagnostics: Diagnostics,
}

impl<T> Outcome<T> {
    fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostics: Diagnostics::new(),
        }
    }

    fn failed(diagnostics: Diagnostics) -> Self {
        Self {
            value: None,
            diagnostics,
        }
    }

    /// The call failed without an error diagnostic: the resource is gone.
    pub fn is_removed(&self) -> bool {
        self.value.is_none() && !self.diagnostics.has_error()
    }
}

/// Run a call under the retry engine and convert any failure to diagnostics.
pub async fn parse_response<T, F, Fut>(
    client: &ApiClient,
    cancel: &CancellationToken,
    request: Request<'_>,
    make_request: F,
) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let result = client
        .execute(cancel, request.request_id, request.timeout, request.retryable, make_request)
        .await;

    match result {
        Ok(value) => Outcome::ok(value),
        Err(error) => {
            let error = match request.environment_id {
                Some(environment_id) => {
                    check_environment_exists_on_permissions_error(client, cancel, environment_id, error).await
                }
                None => error,
            };
            Outcome::failed(error_diagnostics(request.request_id, &error, request.handlers))
        }
    }
}

/// Like [`parse_response`], for reads and deletes of a resource inside
/// `environment_id`: a missing resource or a missing environment becomes a
/// warning and an empty value, signalling removal from state.
pub async fn parse_read_response<T, F, Fut>(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
    request: Request<'_>,
    make_request: F,
) -> Outcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let result = client
        .execute(cancel, request.request_id, request.timeout, request.retryable, make_request)
        .await;

    let error = match result {
        Ok(value) => return Outcome::ok(value),
        Err(error) => error,
    };

    match classify_failure(client, cancel, environment_id, error).await {
        Classified::NotFound(error) => {
            tracing::warn!(
                request_id = request.request_id,
                "Requested resource not found, removing from state"
            );
            let diags = resource_not_found_warning(&error).unwrap_or_else(|| {
                let mut diags = Diagnostics::new();
                diags.add_warning(NOT_FOUND_SUMMARY, NOT_FOUND_DETAIL);
                diags
            });
            Outcome::failed(diags)
        }
        Classified::ParentGone(_) => {
            tracing::warn!(
                request_id = request.request_id,
                environment_id = environment_id,
                "Parent environment not found, removing from state"
            );
            let mut diags = Diagnostics::new();
            diags.add_warning(
                NOT_FOUND_SUMMARY,
                format!(
                    "{}\nThe environment {} that contained this resource no longer exists.",
                    NOT_FOUND_DETAIL, environment_id
                ),
            );
            Outcome::failed(diags)
        }
        Classified::Failed(error) => {
            Outcome::failed(error_diagnostics(request.request_id, &error, request.handlers))
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use rstest::rstest;
    use serde_json::{Value, json};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::{client::test_support::mock_client, framework::Severity};

    const ENV: &str = "9c052a8a-14be-44e4-8f07-2662569994ce";
    const POP: &str = "0a1b2c3d-4e5f-4a6b-8c7d-9e0f1a2b3c4d";

    fn status_error(status: u16, body: Value) -> ApiError {
        ApiError::Status {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.to_string(),
            error: serde_json::from_value(body).ok(),
        }
    }

    fn invalid(target: &str) -> ApiError {
        status_error(
            400,
            json!({
                "id": "e1", "code": "INVALID_DATA",
                "message": "The request could not be completed. One or more validation errors were in the request.",
                "details": [{"code": "INVALID_VALUE", "target": target, "message": format!("{} is invalid", target)}]
            }),
        )
    }

    #[test]
    fn test_not_found_warning_with_envelope() {
        let err = status_error(404, json!({"id": "1", "code": "NOT_FOUND", "message": "Unable to find population"}));
        let diags = resource_not_found_warning(&err).unwrap();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.summary, "Requested resource not found");
        assert!(diag.detail.ends_with("\nAPI error: Unable to find population"));
    }

    #[test]
    fn test_not_found_warning_bare_404() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
            error: None,
        };
        let diags = resource_not_found_warning(&err).unwrap();
        assert_eq!(diags.iter().next().unwrap().detail, NOT_FOUND_DETAIL);
    }

    #[rstest]
    #[case::name_target("name", Some(None))]
    #[case::other_target("credentialTypeId", None)]
    fn test_invalid_value_name(#[case] target: &str, #[case] expected: Option<Option<AttributePath>>) {
        let result = invalid_value_name(&invalid(target));
        assert_eq!(
            result.map(|d| d.iter().next().unwrap().path.clone()),
            expected
        );
    }

    #[test]
    fn test_invalid_value_attribute_path() {
        let diags = invalid_value_attribute(&invalid("credentialTypeId")).unwrap();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.path, Some(AttributePath::root("credential_type_id")));
        assert_eq!(diag.detail, "credentialTypeId is invalid");

        assert!(invalid_value_attribute(&invalid("scope")).is_none());
    }

    #[test]
    fn test_conflicting_scope() {
        let diags = conflicting_scope(&invalid("scope")).unwrap();
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Incompatible role and scope combination");
        assert_eq!(diag.path, Some(AttributePath::root("scope")));
    }

    #[test]
    fn test_forbidden_mode() {
        let err = ApiError::Refused("managed".into(), ErrorKind::ForbiddenMode);
        assert!(forbidden_mode(&err).unwrap().has_error());
        assert!(forbidden_mode(&ApiError::Cancelled).is_none());
    }

    #[test]
    fn test_first_matching_handler_wins() {
        let handlers: &[CustomErrorHandler] = &[invalid_value_name, invalid_value_attribute];
        let diags = error_diagnostics("CreatePopulation", &invalid("name"), handlers);
        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Invalid Value");
        assert_eq!(diag.path, None);
    }

    #[test]
    fn test_format_pingone_error() {
        let p1: P1Error = serde_json::from_value(json!({
            "id": "6d1f2a3b",
            "code": "INVALID_DATA",
            "message": "Validation failed",
            "details": [{
                "code": "INVALID_VALUE",
                "target": "name",
                "message": "must be unique",
                "innerError": {"allowedPattern": "^[a-z]+$"}
            }]
        }))
        .unwrap();

        let (summary, detail) = format_pingone_error("CreatePopulation", &p1);
        assert_eq!(summary, "Error when calling `CreatePopulation`: Validation failed");
        assert_eq!(
            detail,
            "PingOne Error Details:\nID:\t\t6d1f2a3b\nCode:\t\tINVALID_DATA\nMessage:\tValidation failed\n\
             Details:\n  - Code:\tINVALID_VALUE\n    Message:\tmust be unique\n    Target:\tname\n    \
             Data:\t{\"allowedPattern\":\"^[a-z]+$\"}\n"
        );
    }

    #[test]
    fn test_default_rendering_without_envelope() {
        let diags = error_diagnostics("ReadOneEnvironment", &ApiError::Cancelled, &[]);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Error when calling `ReadOneEnvironment`: Request cancelled");
        assert!(diag.detail.starts_with("A generic error has occurred."));
    }

    async fn mount_population(server: &MockServer, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/environments/{}/populations/{}", ENV, POP)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_environment(server: &MockServer, status: u16) {
        let body = if status == 200 {
            json!({"id": ENV})
        } else {
            json!({"id": "z", "code": "NOT_FOUND", "message": "Unable to find environment"})
        };
        Mock::given(method("GET"))
            .and(path(format!("/v1/environments/{}", ENV)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn read(server: &MockServer) -> Outcome<Value> {
        let client = mock_client(&server.uri());
        let path = format!("environments/{}/populations/{}", ENV, POP);
        parse_read_response(
            &client,
            &CancellationToken::new(),
            ENV,
            Request::new("ReadOnePopulation").handlers(&[resource_not_found_warning]),
            || client.get::<Value>(crate::client::Service::Management, &path),
        )
        .await
    }

    #[rstest]
    #[case::environment_exists(200)]
    #[case::environment_gone(404)]
    #[tokio::test]
    async fn test_out_of_band_delete(#[case] environment_status: u16) {
        let server = MockServer::start().await;
        mount_population(
            &server,
            404,
            json!({"id": "y", "code": "NOT_FOUND", "message": "Unable to find population"}),
        )
        .await;
        mount_environment(&server, environment_status).await;

        let outcome = read(&server).await;
        assert!(outcome.is_removed());
        let diag = outcome.diagnostics.iter().next().unwrap();
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.summary, "Requested resource not found");
    }

    #[tokio::test]
    async fn test_read_success() {
        let server = MockServer::start().await;
        mount_population(&server, 200, json!({"id": POP, "name": "staff"})).await;

        let outcome = read(&server).await;
        assert_eq!(outcome.value.unwrap()["name"], "staff");
        assert!(outcome.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_read_server_error_is_terminal() {
        let server = MockServer::start().await;
        mount_population(
            &server,
            500,
            json!({"id": "q", "code": "UNEXPECTED_ERROR", "message": "Internal error"}),
        )
        .await;

        let outcome = read(&server).await;
        assert!(!outcome.is_removed());
        let diag = outcome.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "Error when calling `ReadOnePopulation`: Internal error");
        assert!(diag.detail.contains("ID:\t\tq"));
    }

    #[tokio::test]
    async fn test_permission_error_on_write_checks_environment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "id": "w", "code": "ACCESS_FAILED", "message": "Access denied"
            })))
            .mount(&server)
            .await;
        mount_environment(&server, 404).await;

        let client = mock_client(&server.uri());
        let path = format!("environments/{}/populations", ENV);
        let body = json!({"name": "x"});
        let outcome: Outcome<Value> = parse_response(
            &client,
            &CancellationToken::new(),
            Request::new("CreatePopulation").environment(ENV),
            || client.post(crate::client::Service::Management, &path, &body),
        )
        .await;

        let diag = outcome.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "Error when calling `CreatePopulation`: Unable to find environment");
    }
}
