//! `pingone_population`: a population of users inside an environment.
//!
//! Deleting a population that still holds users fails server-side. With
//! `global_options.population.contains_users_force_delete` enabled the users
//! are deleted first, but only in `SANDBOX` environments.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ApiClient, ApiError, Service, default_create_read_retryable},
    framework::{
        Attribute, CustomErrorHandler, CustomType, Diagnostics, ImportComponent, PlanModifier, Request,
        Schema, SchemaDescription, Validator, parse_read_response, parse_response,
        response::{invalid_value_attribute, invalid_value_name},
        schema::{attr_environment_id, attr_id},
        types::RESOURCE_ID_REGEX,
    },
    resource::{
        CreateRequest, DeleteRequest, DeleteResponse, ProviderData, ReadRequest, Resource, StateResponse,
        UpdateRequest, decode_snapshot, import_state_from_id, require_configured, state_response,
    },
    services::{ObjectRef, environment_path},
};

const WRITE_HANDLERS: &[CustomErrorHandler] = &[invalid_value_name, invalid_value_attribute];
const DELETE_HANDLERS: &[CustomErrorHandler] = &[population_delete_constraint_warning];

static LAST_POPULATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"must contain at least one population").unwrap());

/// State model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopulationModel {
    #[serde(default)]
    pub id: Option<String>,
    pub environment_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub password_policy_id: Option<String>,
    #[serde(default)]
    pub user_count: Option<i64>,
}

/// Management API representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Population {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_policy: Option<ObjectRef>,
    #[serde(default, skip_serializing)]
    pub user_count: Option<i64>,
}

impl PopulationModel {
    fn expand(&self) -> Population {
        Population {
            id: None,
            name: self.name.clone(),
            description: self.description.clone(),
            password_policy: self.password_policy_id.clone().map(|id| ObjectRef { id }),
            user_count: None,
        }
    }

    fn from_api(environment_id: &str, api: Population) -> Self {
        Self {
            id: api.id,
            environment_id: environment_id.to_string(),
            name: api.name,
            description: api.description.filter(|d| !d.is_empty()),
            password_policy_id: api.password_policy.map(|p| p.id),
            user_count: api.user_count,
        }
    }

    fn path(&self) -> String {
        environment_path(
            &self.environment_id,
            &format!("populations/{}", self.id.as_deref().unwrap_or_default()),
        )
    }
}

#[derive(Debug, Deserialize)]
struct Environment {
    #[serde(rename = "type")]
    environment_type: String,
}

#[derive(Debug, Default, Deserialize)]
struct UserPage {
    #[serde(default, rename = "_embedded")]
    embedded: EmbeddedUsers,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedUsers {
    #[serde(default)]
    users: Vec<ObjectRef>,
}

/// The environment's last population cannot be deleted; it is left in place
/// and dropped from state.
fn population_delete_constraint_warning(error: &ApiError) -> Option<Diagnostics> {
    let detail = error.p1_error()?.first_detail()?;
    if detail.code != "CONSTRAINT_VIOLATION" || !LAST_POPULATION.is_match(&detail.message) {
        return None;
    }

    let mut diags = Diagnostics::new();
    diags.add_warning(
        "Constraint violation",
        format!(
            "A constraint violation error was encountered: {}\n\nThe population has been removed from state, but has been left in place in the environment.",
            detail.message
        ),
    );
    Some(diags)
}

#[derive(Default)]
pub struct PopulationResource {
    data: Option<Arc<ProviderData>>,
}

impl PopulationResource {
    async fn try_create(&self, cancel: &CancellationToken, req: CreateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let plan: PopulationModel = decode_snapshot(&req.plan)?;
        let client = &data.client;

        let path = environment_path(&plan.environment_id, "populations");
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("CreatePopulation")
                .retryable(default_create_read_retryable)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.post::<_, Population>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            PopulationModel::from_api(&plan.environment_id, api)
        }))
    }

    async fn try_read(&self, cancel: &CancellationToken, req: ReadRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: PopulationModel = decode_snapshot(&req.state)?;
        let client = &data.client;

        let path = state.path();
        let outcome = parse_read_response(
            client,
            cancel,
            &state.environment_id,
            Request::new("ReadOnePopulation").retryable(default_create_read_retryable),
            || client.get::<Population>(Service::Management, &path),
        )
        .await;

        Ok(state_response(outcome, |api| {
            PopulationModel::from_api(&state.environment_id, api)
        }))
    }

    async fn try_update(&self, cancel: &CancellationToken, req: UpdateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let mut plan: PopulationModel = decode_snapshot(&req.plan)?;
        let state: PopulationModel = decode_snapshot(&req.state)?;
        plan.id = state.id;
        let client = &data.client;

        let path = plan.path();
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("UpdatePopulation")
                .retryable(default_create_read_retryable)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.put::<_, Population>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            PopulationModel::from_api(&plan.environment_id, api)
        }))
    }

    async fn try_delete(&self, cancel: &CancellationToken, req: DeleteRequest) -> Result<Diagnostics, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: PopulationModel = decode_snapshot(&req.state)?;
        let client = &data.client;
        let population_id = state.id.as_deref().unwrap_or_default();

        let mut diags = Diagnostics::new();
        if data.global_options.population_force_delete() {
            if !RESOURCE_ID_REGEX.is_match(population_id) {
                diags.add_error(
                    "Data protection notice",
                    format!(
                        "For data protection reasons, it could not be determined whether users exist in the population {} in environment {}. Any users in this population will not be deleted.",
                        population_id, state.environment_id
                    ),
                );
                return Ok(diags);
            }

            diags.append(delete_population_users(client, cancel, &state.environment_id, population_id).await);
            if diags.has_error() {
                return Ok(diags);
            }
        }

        let path = state.path();
        let outcome = parse_read_response(
            client,
            cancel,
            &state.environment_id,
            Request::new("DeletePopulation").handlers(DELETE_HANDLERS),
            || client.delete(Service::Management, &path),
        )
        .await;
        diags.append(outcome.diagnostics);

        Ok(diags)
    }
}

/// Read one page of the population's users.
///
/// A missing environment yields `None` without an error; the population
/// delete that follows reports it.
async fn read_population_users(
    client: &ApiClient,
    cancel: &CancellationToken,
    request_id: &str,
    environment_id: &str,
    population_id: &str,
    limit: Option<&str>,
) -> Result<Option<Vec<ObjectRef>>, Diagnostics> {
    let users_path = environment_path(environment_id, "users");
    let filter = format!("population.id eq \"{}\"", population_id);
    let mut query = vec![("filter", filter.as_str())];
    if let Some(limit) = limit {
        query.push(("limit", limit));
    }

    let page = parse_read_response(
        client,
        cancel,
        environment_id,
        Request::new(request_id).retryable(default_create_read_retryable),
        || client.get_with_query::<UserPage>(Service::Management, &users_path, &query),
    )
    .await;

    match page.value {
        Some(page) => Ok(Some(page.embedded.users)),
        None if page.diagnostics.has_error() => Err(page.diagnostics),
        None => Ok(None),
    }
}

/// Delete every user of a population in a `SANDBOX` environment. Other
/// environment types get a warning and keep their users. Nothing is read
/// beyond the user check when the population is already empty.
async fn delete_population_users(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
    population_id: &str,
) -> Diagnostics {
    let mut diags = Diagnostics::new();

    let assigned = read_population_users(
        client,
        cancel,
        "ReadAllUsers-HasUsersAssigned",
        environment_id,
        population_id,
        Some("1"),
    )
    .await;
    match assigned {
        Ok(Some(users)) if !users.is_empty() => {}
        Ok(_) => return diags,
        Err(errors) => return errors,
    }

    let env_path = format!("environments/{}", environment_id);
    let environment = parse_read_response(
        client,
        cancel,
        environment_id,
        Request::new("ReadOneEnvironment-DeletePopulation").retryable(default_create_read_retryable),
        || client.get::<Environment>(Service::Management, &env_path),
    )
    .await;
    let Some(environment) = environment.value else {
        if environment.diagnostics.has_error() {
            diags.append(environment.diagnostics);
        }
        return diags;
    };

    if environment.environment_type != "SANDBOX" {
        tracing::warn!(
            environment_id = environment_id,
            population_id = population_id,
            environment_type = %environment.environment_type,
            "Population force-delete skipped for non-sandbox environment"
        );
        diags.add_warning(
            "Data protection notice",
            format!(
                "For data protection reasons, the provider configuration `global_options.population.contains_users_force_delete` has no effect on environment ID {0} as it has a type set to `{2}`.  Users in this population will not be deleted.\nIf you wish to force delete population {1} in environment {0}, please review and remove user data manually.",
                environment_id, population_id, environment.environment_type
            ),
        );
        return diags;
    }

    loop {
        let page = read_population_users(client, cancel, "ReadAllUsers", environment_id, population_id, None).await;
        let users = match page {
            Ok(Some(users)) if !users.is_empty() => users,
            Ok(_) => return diags,
            Err(errors) => {
                diags.append(errors);
                return diags;
            }
        };

        tracing::debug!(
            population_id = population_id,
            users = users.len(),
            "Deleting population users"
        );

        for user in users {
            let user_path = environment_path(environment_id, &format!("users/{}", user.id));
            let deleted = parse_response(
                client,
                cancel,
                Request::new("DeleteUser-DeletePopulation").environment(environment_id),
                || client.delete(Service::Management, &user_path),
            )
            .await;
            diags.append(deleted.diagnostics);
            if diags.has_error() {
                return diags;
            }
        }
    }
}

#[async_trait]
impl Resource for PopulationResource {
    fn type_name_suffix(&self) -> &'static str {
        "population"
    }

    fn schema(&self) -> Schema {
        Schema::new(SchemaDescription::from_markdown(
            "Resource to create and manage a PingOne population in an environment.",
        ))
        .attribute("id", attr_id())
        .attribute("environment_id", attr_environment_id("population"))
        .attribute(
            "name",
            Attribute::string(SchemaDescription::from_markdown(
                "The name of the population.",
            ))
            .required()
            .validator(Validator::LengthAtLeast(1)),
        )
        .attribute(
            "description",
            Attribute::string(SchemaDescription::from_markdown(
                "A description to apply to the population.",
            ))
            .optional(),
        )
        .attribute(
            "password_policy_id",
            Attribute::string(SchemaDescription::from_markdown(
                "The ID of a password policy to assign to the population.  Must be a valid PingOne resource ID.",
            ))
            .optional()
            .custom_type(CustomType::ResourceId),
        )
        .attribute(
            "user_count",
            Attribute::int64(SchemaDescription::from_markdown(
                "The number of users that belong to the population.",
            ))
            .computed()
            .plan_modifier(PlanModifier::UseStateForUnknown),
        )
    }

    fn configure(&mut self, data: Arc<ProviderData>) {
        self.data = Some(data);
    }

    async fn create(&self, cancel: &CancellationToken, req: CreateRequest) -> StateResponse {
        self.try_create(cancel, req)
            .await
            .unwrap_or_else(StateResponse::from_diagnostics)
    }

    async fn read(&self, cancel: &CancellationToken, req: ReadRequest) -> StateResponse {
        self.try_read(cancel, req)
            .await
            .unwrap_or_else(StateResponse::from_diagnostics)
    }

    async fn update(&self, cancel: &CancellationToken, req: UpdateRequest) -> StateResponse {
        self.try_update(cancel, req)
            .await
            .unwrap_or_else(StateResponse::from_diagnostics)
    }

    async fn delete(&self, cancel: &CancellationToken, req: DeleteRequest) -> DeleteResponse {
        let diagnostics = match self.try_delete(cancel, req).await {
            Ok(diags) | Err(diags) => diags,
        };
        DeleteResponse { diagnostics }
    }

    fn import_state(&self, id: &str) -> StateResponse {
        import_state_from_id(
            id,
            &[
                ImportComponent::resource_id("environment_id"),
                ImportComponent::resource_id("population_id").primary(),
            ],
        )
    }
}
