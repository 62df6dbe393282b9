//! Host contract for resources and data sources.
//!
//! The host (a plan/apply orchestrator) owns schema registration, planning and
//! state storage. For each resource type it calls into a [`Resource`]
//! implementation with JSON snapshots of configuration, plan and state, and
//! receives new snapshots plus [`Diagnostics`]. Failures never cross this
//! boundary as `Err`: every user-facing problem is a diagnostic.
//!
//! Operations on distinct resource instances may run concurrently; each
//! instance only shares the read-only [`ProviderData`] built at configure time.

mod provider;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;
pub use provider::{Provider, ProviderData};
pub use registry::{DataSourceFactory, ResourceFactory, ResourceRegistry};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::{
    TYPE_NAME_PREFIX,
    framework::{
        Diagnostics, ImportComponent, Outcome, PlanInputs, PlanOutcome, Schema, parse_import_id,
    },
};

/// Planned (or configured) values for a create.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub plan: Value,
    pub config: Value,
}

#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub state: Value,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub state: Value,
    pub plan: Value,
    pub config: Value,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub state: Value,
}

/// New state for the resource plus any diagnostics.
///
/// `state: None` without an error diagnostic instructs the host to drop the
/// resource from state.
#[derive(Debug, Clone, Default)]
pub struct StateResponse {
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

impl StateResponse {
    pub fn with_state(state: Value) -> Self {
        Self {
            state: Some(state),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn from_diagnostics(diagnostics: Diagnostics) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    /// The resource was not found and should be removed from state.
    pub fn is_removed(&self) -> bool {
        self.state.is_none() && !self.diagnostics.has_error()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteResponse {
    pub diagnostics: Diagnostics,
}

/// Full type name for a registered suffix, e.g. `population` → `pingone_population`.
pub fn type_name(suffix: &str) -> String {
    format!("{}_{}", TYPE_NAME_PREFIX, suffix)
}

#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name without the provider prefix.
    fn type_name_suffix(&self) -> &'static str;

    fn metadata(&self) -> String {
        type_name(self.type_name_suffix())
    }

    fn schema(&self) -> Schema;

    /// Receive the shared provider data. Called once before any operation.
    fn configure(&mut self, data: Arc<ProviderData>);

    /// Validate configuration against the schema.
    fn validate_config(&self, config: &Value) -> Diagnostics {
        self.schema().validate(config)
    }

    /// Run the schema's plan modifiers.
    fn modify_plan(&self, inputs: PlanInputs<'_>) -> PlanOutcome {
        self.schema().modify_plan(inputs)
    }

    async fn create(&self, cancel: &CancellationToken, req: CreateRequest) -> StateResponse;

    async fn read(&self, cancel: &CancellationToken, req: ReadRequest) -> StateResponse;

    async fn update(&self, cancel: &CancellationToken, req: UpdateRequest) -> StateResponse;

    async fn delete(&self, cancel: &CancellationToken, req: DeleteRequest) -> DeleteResponse;

    /// Turn an import identifier into a partial state for a subsequent read.
    fn import_state(&self, id: &str) -> StateResponse;
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name_suffix(&self) -> &'static str;

    fn metadata(&self) -> String {
        type_name(self.type_name_suffix())
    }

    fn schema(&self) -> Schema;

    fn configure(&mut self, data: Arc<ProviderData>);

    fn validate_config(&self, config: &Value) -> Diagnostics {
        self.schema().validate(config)
    }

    async fn read(&self, cancel: &CancellationToken, config: Value) -> StateResponse;
}

/// The configured provider data, or an error diagnostic when `configure` was
/// never called.
pub fn require_configured(data: &Option<Arc<ProviderData>>) -> Result<&ProviderData, Diagnostics> {
    data.as_deref().ok_or_else(|| {
        let mut diags = Diagnostics::new();
        diags.add_error(
            "Client not initialized",
            "Expected the PingOne client, got nothing.  Please report this issue to the provider maintainers.",
        );
        diags
    })
}

/// Parse an import ID into state attributes: each component is stored under
/// its label, except the primary component which is stored under `id`.
pub fn import_state_from_id(id: &str, components: &[ImportComponent]) -> StateResponse {
    match parse_import_id(id, components) {
        Ok(parsed) => {
            let mut state = Map::new();
            for component in components {
                let key = if component.primary_id { "id" } else { component.label };
                if let Some(value) = parsed.get(component.label) {
                    state.insert(key.to_string(), Value::String(value.to_string()));
                }
            }
            StateResponse::with_state(Value::Object(state))
        }
        Err(e) => {
            let mut diags = Diagnostics::new();
            diags.add_error("Unexpected Import Identifier", e.to_string());
            StateResponse::from_diagnostics(diags)
        }
    }
}

/// Typed view of a JSON snapshot, with a diagnostic on mismatch.
pub fn decode_snapshot<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, Diagnostics> {
    serde_json::from_value(value.clone()).map_err(|e| {
        let mut diags = Diagnostics::new();
        diags.add_error("Unable to read resource data", e.to_string());
        diags
    })
}

/// JSON snapshot of a typed model.
pub fn encode_snapshot<T: serde::Serialize>(model: &T) -> Result<Value, Diagnostics> {
    serde_json::to_value(model).map_err(|e| {
        let mut diags = Diagnostics::new();
        diags.add_error("Unable to write resource data", e.to_string());
        diags
    })
}

/// State snapshot from a parsed API call, keeping the call's diagnostics.
/// A failed call yields no state.
pub fn state_response<T, M, F>(outcome: Outcome<T>, map: F) -> StateResponse
where
    M: serde::Serialize,
    F: FnOnce(T) -> M,
{
    let Outcome {
        value,
        mut diagnostics,
    } = outcome;
    let Some(value) = value else {
        return StateResponse::from_diagnostics(diagnostics);
    };

    match encode_snapshot(&map(value)) {
        Ok(state) => StateResponse {
            state: Some(state),
            diagnostics,
        },
        Err(diags) => {
            diagnostics.append(diags);
            StateResponse::from_diagnostics(diagnostics)
        }
    }
}
