//! Concrete PingOne resources and data sources.
//!
//! Each service module owns a resource type end to end: its schema, the
//! mapping between state snapshots and API payloads, and the CRUD flow through
//! the response pipeline.

pub mod credentials;
pub mod mfa;
pub mod sso;

pub use credentials::{CredentialIssuanceRuleResource, CredentialTypeResource};
pub use mfa::ApplicationPushCredentialResource;
pub use sso::{PopulationResource, PopulationsDataSource};

use crate::resource::{DataSource, DataSourceFactory, Resource, ResourceFactory};

fn boxed_resource<R: Resource + Default + 'static>() -> Box<dyn Resource> {
    Box::new(R::default())
}

fn boxed_data_source<D: DataSource + Default + 'static>() -> Box<dyn DataSource> {
    Box::new(D::default())
}

/// Factories for every built-in resource type.
pub fn resources() -> Vec<ResourceFactory> {
    vec![
        boxed_resource::<PopulationResource>,
        boxed_resource::<CredentialTypeResource>,
        boxed_resource::<CredentialIssuanceRuleResource>,
        boxed_resource::<ApplicationPushCredentialResource>,
    ]
}

/// Factories for every built-in data source type.
pub fn data_sources() -> Vec<DataSourceFactory> {
    vec![boxed_data_source::<PopulationsDataSource>]
}

/// Management API path below an environment.
pub(crate) fn environment_path(environment_id: &str, rest: &str) -> String {
    format!("environments/{}/{}", environment_id, rest)
}

/// `{ "id": ... }` reference used throughout the PingOne API.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct ObjectRef {
    pub id: String,
}
