//! `pingone_credential_type`: a verifiable credential definition.
//!
//! Creation depends on the environment's issuer profile, which is provisioned
//! asynchronously; create therefore runs under a longer deadline and retries
//! while the issuer profile is missing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ApiClient, Service, credential_type_retryable, default_create_read_retryable},
    config::CREDENTIAL_TYPE_CREATE_TIMEOUT,
    framework::{
        Attribute, CustomErrorHandler, Diagnostics, ImportComponent, Outcome, Request, Schema,
        SchemaDescription, Validator, parse_read_response, parse_response,
        response::{invalid_value_attribute, invalid_value_name},
        schema::{attr_environment_id, attr_id},
    },
    resource::{
        CreateRequest, DeleteRequest, DeleteResponse, ProviderData, ReadRequest, Resource, StateResponse,
        UpdateRequest, decode_snapshot, import_state_from_id, require_configured, state_response,
    },
    services::environment_path,
};

pub const MANAGEMENT_MODE_AUTOMATED: &str = "AUTOMATED";
pub const MANAGEMENT_MODE_MANAGED: &str = "MANAGED";

const WRITE_HANDLERS: &[CustomErrorHandler] = &[invalid_value_name, invalid_value_attribute];

fn default_management_mode() -> String {
    MANAGEMENT_MODE_AUTOMATED.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialTypeModel {
    #[serde(default)]
    pub id: Option<String>,
    pub environment_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub card_design_template: String,
    #[serde(default = "default_management_mode")]
    pub management_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    pub card_design_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management: Option<Management>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Management {
    pub mode: String,
}

impl CredentialType {
    pub fn is_managed(&self) -> bool {
        self.management
            .as_ref()
            .is_some_and(|m| m.mode == MANAGEMENT_MODE_MANAGED)
    }
}

impl CredentialTypeModel {
    fn expand(&self) -> CredentialType {
        CredentialType {
            id: None,
            title: self.title.clone(),
            description: self.description.clone(),
            card_type: self.card_type.clone(),
            card_design_template: self.card_design_template.clone(),
            management: Some(Management {
                mode: self.management_mode.clone(),
            }),
        }
    }

    fn from_api(environment_id: &str, api: CredentialType) -> Self {
        Self {
            id: api.id,
            environment_id: environment_id.to_string(),
            title: api.title,
            description: api.description,
            card_type: api.card_type,
            card_design_template: api.card_design_template,
            management_mode: api
                .management
                .map(|m| m.mode)
                .unwrap_or_else(default_management_mode),
        }
    }
}

/// Read a credential type; shared with issuance rules, which must check the
/// type's management mode before writing.
pub(crate) async fn read_credential_type(
    client: &ApiClient,
    cancel: &CancellationToken,
    environment_id: &str,
    credential_type_id: &str,
) -> Outcome<CredentialType> {
    let path = environment_path(environment_id, &format!("credentialTypes/{}", credential_type_id));
    parse_read_response(
        client,
        cancel,
        environment_id,
        Request::new("ReadOneCredentialType").retryable(default_create_read_retryable),
        || client.get::<CredentialType>(Service::Management, &path),
    )
    .await
}

#[derive(Default)]
pub struct CredentialTypeResource {
    data: Option<Arc<ProviderData>>,
}

impl CredentialTypeResource {
    async fn try_create(&self, cancel: &CancellationToken, req: CreateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let plan: CredentialTypeModel = decode_snapshot(&req.plan)?;
        let client = &data.client;

        let path = environment_path(&plan.environment_id, "credentialTypes");
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("CreateCredentialType")
                .retryable(credential_type_retryable)
                .timeout(CREDENTIAL_TYPE_CREATE_TIMEOUT)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.post::<_, CredentialType>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            CredentialTypeModel::from_api(&plan.environment_id, api)
        }))
    }

    async fn try_read(&self, cancel: &CancellationToken, req: ReadRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: CredentialTypeModel = decode_snapshot(&req.state)?;
        let id = state.id.as_deref().unwrap_or_default();

        let outcome = read_credential_type(&data.client, cancel, &state.environment_id, id).await;
        Ok(state_response(outcome, |api| {
            CredentialTypeModel::from_api(&state.environment_id, api)
        }))
    }

    async fn try_update(&self, cancel: &CancellationToken, req: UpdateRequest) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let mut plan: CredentialTypeModel = decode_snapshot(&req.plan)?;
        let state: CredentialTypeModel = decode_snapshot(&req.state)?;
        plan.id = state.id;
        let client = &data.client;

        let path = environment_path(
            &plan.environment_id,
            &format!("credentialTypes/{}", plan.id.as_deref().unwrap_or_default()),
        );
        let body = plan.expand();
        let outcome = parse_response(
            client,
            cancel,
            Request::new("UpdateCredentialType")
                .retryable(credential_type_retryable)
                .handlers(WRITE_HANDLERS)
                .environment(&plan.environment_id),
            || client.put::<_, CredentialType>(Service::Management, &path, &body),
        )
        .await;

        Ok(state_response(outcome, |api| {
            CredentialTypeModel::from_api(&plan.environment_id, api)
        }))
    }

    async fn try_delete(&self, cancel: &CancellationToken, req: DeleteRequest) -> Result<Diagnostics, Diagnostics> {
        let data = require_configured(&self.data)?;
        let state: CredentialTypeModel = decode_snapshot(&req.state)?;
        let client = &data.client;

        let path = environment_path(
            &state.environment_id,
            &format!("credentialTypes/{}", state.id.as_deref().unwrap_or_default()),
        );
        let outcome = parse_read_response(
            client,
            cancel,
            &state.environment_id,
            Request::new("DeleteCredentialType"),
            || client.delete(Service::Management, &path),
        )
        .await;

        Ok(outcome.diagnostics)
    }
}

#[async_trait]
impl Resource for CredentialTypeResource {
    fn type_name_suffix(&self) -> &'static str {
        "credential_type"
    }

    fn schema(&self) -> Schema {
        let mode_description = SchemaDescription::from_markdown(
            "Specifies the mode of credential data management.",
        )
        .allowed_values([MANAGEMENT_MODE_AUTOMATED, MANAGEMENT_MODE_MANAGED])
        .default_value(MANAGEMENT_MODE_AUTOMATED);

        Schema::new(SchemaDescription::from_markdown(
            "Resource to create and manage the credential types used by compatible wallet applications.",
        ))
        .attribute("id", attr_id())
        .attribute("environment_id", attr_environment_id("credential type"))
        .attribute(
            "title",
            Attribute::string(SchemaDescription::from_markdown(
                "Title of the credential.  Verification sites are expected to be able to request the issued credential from the compatible wallet app using the title.",
            ))
            .required()
            .validator(Validator::LengthAtLeast(1)),
        )
        .attribute(
            "description",
            Attribute::string(SchemaDescription::from_markdown(
                "A description of the credential type.",
            ))
            .optional(),
        )
        .attribute(
            "card_type",
            Attribute::string(SchemaDescription::from_markdown(
                "A descriptor of the credential type.  Can be non-identity types such as proof of employment or proof of insurance.",
            ))
            .optional(),
        )
        .attribute(
            "card_design_template",
            Attribute::string(SchemaDescription::from_markdown(
                "An SVG formatted image containing placeholders for the credentials fields that need to be displayed in the image.",
            ))
            .required()
            .validator(Validator::LengthAtLeast(1)),
        )
        .attribute(
            "management_mode",
            Attribute::string(mode_description)
                .optional()
                .default_value(json!(MANAGEMENT_MODE_AUTOMATED))
                .validator(Validator::OneOf(vec![MANAGEMENT_MODE_AUTOMATED, MANAGEMENT_MODE_MANAGED])),
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
                ImportComponent::resource_id("credential_type_id").primary(),
            ],
        )
    }
}
