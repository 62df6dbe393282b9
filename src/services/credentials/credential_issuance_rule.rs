//! `pingone_credential_issuance_rule`: who receives a credential type and how
//! issuance, revocation and updates are automated.
//!
//! A rule cannot be attached to a credential type in `MANAGED` mode; the
//! server would accept it and then never act on it, so create and update check
//! the type first and refuse.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::credential_type::{MANAGEMENT_MODE_MANAGED, read_credential_type};
use crate::{
    client::{ApiError, ErrorKind, Service, default_create_read_retryable},
    framework::{
        Attribute, CustomErrorHandler, CustomType, Diagnostics, ImportComponent, PlanModifier, Request,
        Schema, SchemaDescription, Validator, error_diagnostics, parse_read_response, parse_response,
        response::{forbidden_mode, invalid_value_attribute, invalid_value_name},
        schema::{attr_environment_id, attr_id, attr_link_id},
    },
    resource::{
        CreateRequest, DeleteRequest, DeleteResponse, ProviderData, ReadRequest, Resource, StateResponse,
        UpdateRequest, decode_snapshot, import_state_from_id, require_configured, state_response,
    },
    services::{ObjectRef, environment_path},
};

const WRITE_HANDLERS: &[CustomErrorHandler] = &[invalid_value_name, invalid_value_attribute];
const AUTOMATION_OPTIONS: [&str; 2] = ["PERIODIC", "ON_DEMAND"];
const STATUS_OPTIONS: [&str; 2] = ["ACTIVE", "DISABLED"];
const NOTIFICATION_METHODS: [&str; 2] = ["EMAIL", "SMS"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Automation {
    pub issue: String,
    pub revoke: String,
    pub update: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterModel {
    #[serde(default)]
    pub group_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    pub population_ids: Option<BTreeSet<String>>,
    #[serde(default)]
    pub scim: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationModel {
    #[serde(default)]
    pub methods: Option<BTreeSet<String>>,
    #[serde(default)]
    pub template: Option<NotificationTemplate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialIssuanceRuleModel {
    #[serde(default)]
    pub id: Option<String>,
    pub environment_id: String,
    pub credential_type_id: String,
    #[serde(default)]
    pub digital_wallet_application_id: Option<String>,
    #[serde(default)]
    pub automation: Option<Automation>,
    #[serde(default)]
    pub filter: Option<FilterModel>,
    #[serde(default)]
    pub notification: Option<NotificationModel>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    population_ids: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scim: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialIssuanceRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    digital_wallet_application: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    automation: Option<Automation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<ApiFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notification: Option<NotificationModel>,
    status: String,
}

impl CredentialIssuanceRuleModel {
    fn expand(&self) -> CredentialIssuanceRule {
        CredentialIssuanceRule {
            id: None,
            digital_wallet_application: self
                .digital_wallet_application_id
                .clone()
                .map(|id| ObjectRef { id }),
            automation: self.automation.clone(),
            filter: self.filter.as_ref().map(|f| ApiFilter {
                group_ids: f.group_ids.clone(),
                population_ids: f.population_ids.clone(),
                scim: f.scim.clone(),
            }),
            notification: self.notification.clone(),
            status: self.status.clone(),
        }
    }

    fn from_api(environment_id: &str, credential_type_id: &str, api: CredentialIssuanceRule) -> Self {
        Self {
            id: api.id,
            environment_id: environment_id.to_string(),
            credential_type_id: credential_type_id.to_string(),
            digital_wallet_application_id: api.digital_wallet_application.map(|a| a.id),
            automation: api.automation,
            filter: api.filter.map(|f| FilterModel {
                group_ids: f.group_ids.filter(|ids| !ids.is_empty()),
                population_ids: f.population_ids.filter(|ids| !ids.is_empty()),
                scim: f.scim.filter(|s| !s.is_empty()),
            }),
            notification: api.notification,
            status: api.status,
        }
    }

    fn rules_path(&self) -> String {
        environment_path(
            &self.environment_id,
            &format!("credentialTypes/{}/issuanceRules", self.credential_type_id),
        )
    }

    fn path(&self) -> String {
        format!("{}/{}", self.rules_path(), self.id.as_deref().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct CredentialIssuanceRuleResource {
    data: Option<Arc<ProviderData>>,
}

impl CredentialIssuanceRuleResource {
    /// Refuse to write a rule for a credential type in `MANAGED` mode.
    async fn check_management_mode(
        &self,
        data: &ProviderData,
        cancel: &CancellationToken,
        request_id: &str,
        model: &CredentialIssuanceRuleModel,
    ) -> Result<(), Diagnostics> {
        let credential_type = read_credential_type(
            &data.client,
            cancel,
            &model.environment_id,
            &model.credential_type_id,
        )
        .await;

        let Some(credential_type) = credential_type.value else {
            let mut diags = credential_type.diagnostics;
            if !diags.has_error() {
                diags.add_error(
                    "Credential type not found",
                    format!(
                        "The credential type {} referenced by the issuance rule does not exist in environment {}.",
                        model.credential_type_id, model.environment_id
                    ),
                );
            }
            return Err(diags);
        };

        if credential_type.is_managed() {
            tracing::warn!(
                credential_type_id = %model.credential_type_id,
                "Refusing to write an issuance rule for a MANAGED credential type"
            );
            let error = ApiError::Refused(
                format!(
                    "The credential type {} has a management mode of `{}`.  Issuance rules can only be defined for credential types with a management mode of `AUTOMATED`.",
                    model.credential_type_id, MANAGEMENT_MODE_MANAGED
                ),
                ErrorKind::ForbiddenMode,
            );
            return Err(error_diagnostics(request_id, &error, &[forbidden_mode]));
        }

        Ok(())
    }

    async fn try_create(&self, cancel: &CancellationToken, req: CreateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let plan: CredentialIssuanceRuleModel = decode_snapshot(&req.plan)?;
        self.check_management_mode(data, cancel, "CreateCredentialIssuanceRule", &plan)
            .await?;
        let client = &data.client;

        let path = plan.rules_path();
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("CreateCredentialIssuanceRule")
                .retryable(default_create_read_retryable)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.post::<_, CredentialIssuanceRule>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            CredentialIssuanceRuleModel::from_api(&plan.environment_id, &plan.credential_type_id, api)
        }))
    }

    async fn try_read(&self, cancel: &CancellationToken, req: ReadRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: CredentialIssuanceRuleModel = decode_snapshot(&req.state)?;
        let client = &data.client;

        let path = state.path();
        let outcome = parse_read_response(
            client,
            cancel,
            &state.environment_id,
            Request::new("ReadOneCredentialIssuanceRule").retryable(default_create_read_retryable),
            || client.get::<CredentialIssuanceRule>(Service::Management, &path),
        )
        .await;

        Ok(state_response(outcome, |api| {
            CredentialIssuanceRuleModel::from_api(&state.environment_id, &state.credential_type_id, api)
        }))
    }

    async fn try_update(&self, cancel: &CancellationToken, req: UpdateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let mut plan: CredentialIssuanceRuleModel = decode_snapshot(&req.plan)?;
        let state: CredentialIssuanceRuleModel = decode_snapshot(&req.state)?;
        plan.id = state.id;
        self.check_management_mode(data, cancel, "UpdateCredentialIssuanceRule", &plan)
            .await?;
        let client = &data.client;

        let path = plan.path();
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("UpdateCredentialIssuanceRule")
                .retryable(default_create_read_retryable)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.put::<_, CredentialIssuanceRule>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            CredentialIssuanceRuleModel::from_api(&plan.environment_id, &plan.credential_type_id, api)
        }))
    }

    async fn try_delete(&self, cancel: &CancellationToken, req: DeleteRequest) -> Result<Diagnostics, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: CredentialIssuanceRuleModel = decode_snapshot(&req.state)?;
        let client = &data.client;

        let path = state.path();
        let outcome = parse_read_response(
            client,
            cancel,
            &state.environment_id,
            Request::new("DeleteCredentialIssuanceRule"),
            || client.delete(Service::Management, &path),
        )
        .await;

        Ok(outcome.diagnostics)
    }
}

fn resource_id_set(description: &str) -> Attribute {
    Attribute::string_set(SchemaDescription::from_markdown(description))
        .optional()
        .custom_type(CustomType::ResourceId)
        .validator(Validator::SizeAtLeast(1))
        .plan_modifier(PlanModifier::RequiresReplaceIfPreviouslyNull)
}

fn automation_option(action: &str) -> Attribute {
    Attribute::string(
        SchemaDescription::from_markdown(format!(
            "The method the service uses to {} credentials with the credential issuance rule.",
            action
        ))
        .allowed_values(AUTOMATION_OPTIONS),
    )
    .required()
    .validator(Validator::OneOf(AUTOMATION_OPTIONS.to_vec()))
}

#[async_trait]
impl Resource for CredentialIssuanceRuleResource {
    fn type_name_suffix(&self) -> &'static str {
        "credential_issuance_rule"
    }

    fn schema(&self) -> Schema {
        let filter_children = ["group_ids", "population_ids", "scim"];

        Schema::new(SchemaDescription::from_markdown(
            "Resource to create and manage a credential issuance rule in PingOne.",
        ))
        .attribute("id", attr_id())
        .attribute("environment_id", attr_environment_id("credential issuance rule"))
        .attribute(
            "credential_type_id",
            attr_link_id(SchemaDescription::from_markdown(
                "Identifier (UUID) of the credential type with which this credential issuance rule is associated.",
            )),
        )
        .attribute(
            "digital_wallet_application_id",
            Attribute::string(SchemaDescription::from_markdown(
                "Identifier (UUID) of the customer's Digital Wallet App that will interact with the user's Digital Wallet.",
            ))
            .optional()
            .custom_type(CustomType::ResourceId),
        )
        .attribute(
            "automation",
            Attribute::object(SchemaDescription::from_markdown(
                "Contains a list of actions, as key names, and the update method for each action.",
            ))
            .required()
            .nested("issue", automation_option("issue"))
            .nested("revoke", automation_option("revoke"))
            .nested("update", automation_option("update")),
        )
        .attribute(
            "filter",
            Attribute::object(
                SchemaDescription::from_markdown(
                    "Contains one and only one filter that selects the users to whom the credential issuance rule applies.",
                )
                .exactly_one_of(&filter_children),
            )
            .optional()
            .validator(Validator::ExactlyOneOfChildren(filter_children.to_vec()))
            .nested(
                "group_ids",
                resource_id_set("Array of one or more identifiers (UUIDs) of groups, any of which a user must belong for the credential issuance rule to apply."),
            )
            .nested(
                "population_ids",
                resource_id_set("Array of one or more identifiers (UUIDs) of populations, any of which a user must belong for the credential issuance rule to apply."),
            )
            .nested(
                "scim",
                Attribute::string(SchemaDescription::from_markdown(
                    "A SCIM query that selects users to whom the credential issuance rule applies.",
                ))
                .optional()
                .validator(Validator::LengthAtLeast(1)),
            ),
        )
        .attribute(
            "notification",
            Attribute::object(SchemaDescription::from_markdown(
                "Contains notification information.  When this property is supplied, the information within is used to create a custom notification.",
            ))
            .optional()
            .nested(
                "methods",
                Attribute::string_set(
                    SchemaDescription::from_markdown("Array of methods for notifying the user.")
                        .allowed_values(NOTIFICATION_METHODS),
                )
                .optional()
                .validator(Validator::OneOf(NOTIFICATION_METHODS.to_vec())),
            )
            .nested(
                "template",
                Attribute::object(SchemaDescription::from_markdown(
                    "Contains template parameters.",
                ))
                .optional()
                .nested(
                    "locale",
                    Attribute::string(SchemaDescription::from_markdown(
                        "The ISO 2-character language code used for the notification.",
                    ))
                    .optional(),
                )
                .nested(
                    "variant",
                    Attribute::string(SchemaDescription::from_markdown(
                        "The unique user-defined name for the content variant that contains the message text used for the notification.",
                    ))
                    .optional(),
                ),
            ),
        )
        .attribute(
            "status",
            Attribute::string(
                SchemaDescription::from_markdown("Status of the credential issuance rule.")
                    .allowed_values(STATUS_OPTIONS),
            )
            .required()
            .validator(Validator::OneOf(STATUS_OPTIONS.to_vec())),
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
                ImportComponent::resource_id("credential_type_id"),
                ImportComponent::resource_id("credential_issuance_rule_id").primary(),
            ],
        )
    }
}
