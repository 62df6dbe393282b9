//! Resource and data source registry.
//!
//! Types are registered once at startup as factories keyed by their full type
//! name (`pingone_<suffix>`). Each lookup produces a fresh, unconfigured
//! instance.

use std::collections::BTreeMap;

use super::{DataSource, Resource};

pub type ResourceFactory = fn() -> Box<dyn Resource>;
pub type DataSourceFactory = fn() -> Box<dyn DataSource>;

#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<String, ResourceFactory>,
    data_sources: BTreeMap<String, DataSourceFactory>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every resource and data source this crate provides.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for factory in crate::services::resources() {
            registry.register_resource(factory);
        }
        for factory in crate::services::data_sources() {
            registry.register_data_source(factory);
        }
        registry
    }

    /// Register a resource under the name its instances report.
    pub fn register_resource(&mut self, factory: ResourceFactory) {
        let name = factory().metadata();
        if self.resources.insert(name.clone(), factory).is_some() {
            tracing::warn!(resource_type = %name, "Resource type registered twice, keeping the latest");
        }
    }

    pub fn register_data_source(&mut self, factory: DataSourceFactory) {
        let name = factory().metadata();
        if self.data_sources.insert(name.clone(), factory).is_some() {
            tracing::warn!(resource_type = %name, "Data source type registered twice, keeping the latest");
        }
    }

    /// New unconfigured instance of a resource type.
    pub fn resource(&self, type_name: &str) -> Option<Box<dyn Resource>> {
        self.resources.get(type_name).map(|factory| factory())
    }

    pub fn data_source(&self, type_name: &str) -> Option<Box<dyn DataSource>> {
        self.data_sources.get(type_name).map(|factory| factory())
    }

    /// Registered resource type names, sorted.
    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn data_source_types(&self) -> impl Iterator<Item = &str> {
        self.data_sources.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_types() {
        let registry = ResourceRegistry::with_builtin();
        let resources: Vec<&str> = registry.resource_types().collect();
        assert_eq!(
            resources,
            vec![
                "pingone_credential_issuance_rule",
                "pingone_credential_type",
                "pingone_mfa_application_push_credential",
                "pingone_population",
            ]
        );
        let data_sources: Vec<&str> = registry.data_source_types().collect();
        assert_eq!(data_sources, vec!["pingone_populations"]);
    }

    #[test]
    fn test_lookup_returns_fresh_instance() {
        let registry = ResourceRegistry::with_builtin();
        let resource = registry.resource("pingone_population").unwrap();
        assert_eq!(resource.metadata(), "pingone_population");
        assert!(registry.resource("pingone_unknown").is_none());
        assert!(registry.data_source("pingone_population").is_none());
    }
}
