//! Provider instance: turns a validated [`ProviderConfig`] into the shared
//! [`ProviderData`] handed to every resource.

use std::sync::Arc;

use super::{DataSource, Resource, ResourceRegistry};
use crate::{
    client::ApiClient,
    config::{GlobalOptions, LEGACY_REGION_DEPRECATION, ProviderConfig, resolve_region},
    framework::{AttributePath, Diagnostics},
};

const FORCE_DELETE_WARNING: &str = "The provider is configured to force-delete populations if they contain users.  This may result in the loss of user data.  Ensure this option is only used against environments where user data can be discarded.  The option has no effect on environments with a type of `PRODUCTION`.";

/// Read-only data shared by every configured resource.
#[derive(Debug, Clone)]
pub struct ProviderData {
    pub client: ApiClient,
    pub global_options: GlobalOptions,
}

pub struct Provider {
    registry: ResourceRegistry,
    data: Option<Arc<ProviderData>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new(ResourceRegistry::with_builtin())
    }
}

impl Provider {
    pub fn new(registry: ResourceRegistry) -> Self {
        Self {
            registry,
            data: None,
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn data(&self) -> Option<Arc<ProviderData>> {
        self.data.clone()
    }

    /// Resolve the region, build the client and collect configure-time
    /// advisories. On an error diagnostic the provider stays unconfigured.
    pub fn configure(&mut self, config: &ProviderConfig) -> Diagnostics {
        let mut diags = Diagnostics::new();

        if config.legacy_region_used() {
            tracing::warn!("The `region` option is deprecated, use `region_code`");
            diags.add_warning("Deprecated provider option", LEGACY_REGION_DEPRECATION);
        }

        let region = resolve_region(config.region_code());
        if let Some(warning) = &region.warning {
            tracing::warn!(region_code = config.region_code(), "Unrecognised region code");
            diags.add_warning("Unrecognised region code", warning.clone());
        }

        if config.global_options.population_force_delete() {
            tracing::warn!("Population force-delete is enabled");
            diags.add_attribute_warning(
                AttributePath::root("global_options")
                    .at_list_index(0)
                    .at_name("population")
                    .at_list_index(0)
                    .at_name("contains_users_force_delete"),
                "Data protection notice",
                FORCE_DELETE_WARNING,
            );
        }

        let client = match ApiClient::from_config(config, &region) {
            Ok(client) => client,
            Err(e) => {
                diags.add_error("Unable to create PingOne client", e.to_string());
                return diags;
            }
        };

        tracing::debug!(
            management = %client.endpoints().management,
            auth = %client.endpoints().auth,
            "Provider configured"
        );

        self.data = Some(Arc::new(ProviderData {
            client,
            global_options: config.global_options.clone(),
        }));
        diags
    }

    /// Configured instance of a resource type.
    pub fn resource(&self, type_name: &str) -> Option<Box<dyn Resource>> {
        let mut resource = self.registry.resource(type_name)?;
        if let Some(data) = &self.data {
            resource.configure(data.clone());
        }
        Some(resource)
    }

    pub fn data_source(&self, type_name: &str) -> Option<Box<dyn DataSource>> {
        let mut data_source = self.registry.data_source(type_name)?;
        if let Some(data) = &self.data {
            data_source.configure(data.clone());
        }
        Some(data_source)
    }
}
