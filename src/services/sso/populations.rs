//! `pingone_populations` data source: IDs of the populations matching a filter.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    client::{ApiClient, Service, default_create_read_retryable},
    framework::{
        Attribute, AttributePath, Diagnostics, Request, Schema, SchemaDescription, parse_response,
        schema::{attr_data_filter, attr_environment_id, attr_id, attr_scim_filter},
    },
    resource::{DataSource, ProviderData, StateResponse, decode_snapshot, encode_snapshot, require_configured},
    scim::{build_scim_filter, parse_data_filter},
    services::{ObjectRef, environment_path},
};

const FILTERABLE: &[&str] = &["id", "name"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PopulationsModel {
    #[serde(default)]
    pub id: Option<String>,
    pub environment_id: String,
    #[serde(default)]
    pub scim_filter: Option<String>,
    #[serde(default)]
    pub data_filter: Option<Value>,
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PopulationPage {
    #[serde(default, rename = "_embedded")]
    embedded: EmbeddedPopulations,
    #[serde(default, rename = "_links")]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddedPopulations {
    #[serde(default)]
    populations: Vec<ObjectRef>,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

/// Resolve the SCIM filter from whichever filter input is set.
fn resolve_filter(model: &PopulationsModel) -> Result<String, Diagnostics> {
    let mut diags = Diagnostics::new();
    match (&model.scim_filter, &model.data_filter) {
        (Some(filter), None) => Ok(filter.clone()),
        (None, Some(data_filter)) => parse_data_filter(data_filter, FILTERABLE)
            .map(|groups| build_scim_filter(&groups, &BTreeMap::new()))
            .map_err(|e| {
                diags.add_attribute_error(AttributePath::root("data_filter"), "Invalid data filter", e.to_string());
                diags
            }),
        _ => {
            diags.add_error(
                "Invalid filter configuration",
                "Exactly one of `scim_filter` or `data_filter` must be defined.",
            );
            Err(diags)
        }
    }
}

/// Path of the next page relative to the management base URL, if any. A link
/// to any other host is an error.
fn next_page_path(client: &ApiClient, links: &PageLinks) -> Result<Option<String>, Diagnostics> {
    let Some(link) = &links.next else {
        return Ok(None);
    };
    let base = client.endpoints().base_url(Service::Management);
    match link.href.strip_prefix(base) {
        Some(path) => Ok(Some(path.to_string())),
        None => {
            tracing::error!(href = %link.href, base = %base, "Pagination link outside the management API");
            let mut diags = Diagnostics::new();
            diags.add_error(
                "Unexpected pagination link",
                format!(
                    "The next page of results is at {}, which is not under the management API base URL {}. The population list could not be completed.",
                    link.href, base
                ),
            );
            Err(diags)
        }
    }
}

#[derive(Default)]
pub struct PopulationsDataSource {
    data: Option<Arc<ProviderData>>,
}

impl PopulationsDataSource {
    async fn try_read(&self, cancel: &CancellationToken, config: Value) -> Result<StateResponse, Diagnostics> {
        let data = require_configured(&self.data)?;
        let mut model: PopulationsModel = decode_snapshot(&config)?;
        let filter = resolve_filter(&model)?;
        let client = &data.client;

        tracing::debug!(environment_id = %model.environment_id, filter = %filter, "Listing populations");

        let mut ids = Vec::new();
        let mut diags = Diagnostics::new();
        let first_path = environment_path(&model.environment_id, "populations");
        let query = [("filter", filter.as_str())];

        let mut page = parse_response(
            client,
            cancel,
            Request::new("ReadAllPopulations")
                .retryable(default_create_read_retryable)
                .environment(&model.environment_id),
            || client.get_with_query::<PopulationPage>(Service::Management, &first_path, &query),
        )
        .await;

        loop {
            diags.append(page.diagnostics);
            let Some(current) = page.value else {
                return Err(diags);
            };
            ids.extend(current.embedded.populations.into_iter().map(|p| p.id));

            let next = match next_page_path(client, &current.links) {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(errors) => {
                    diags.append(errors);
                    return Err(diags);
                }
            };
            page = parse_response(
                client,
                cancel,
                Request::new("ReadAllPopulations")
                    .retryable(default_create_read_retryable)
                    .environment(&model.environment_id),
                || client.get::<PopulationPage>(Service::Management, &next),
            )
            .await;
        }

        model.id = Some(model.environment_id.clone());
        model.ids = ids;
        let mut resp = StateResponse::with_state(encode_snapshot(&model)?);
        resp.diagnostics = diags;
        Ok(resp)
    }
}

#[async_trait]
impl DataSource for PopulationsDataSource {
    fn type_name_suffix(&self) -> &'static str {
        "populations"
    }

    fn schema(&self) -> Schema {
        Schema::new(SchemaDescription::from_markdown(
            "Datasource to retrieve multiple PingOne populations.  Valid filtering attributes are `id` and `name`.",
        ))
        .attribute("id", attr_id())
        .attribute("environment_id", attr_environment_id("populations"))
        .attribute(
            "scim_filter",
            attr_scim_filter(
                SchemaDescription::from_markdown("A SCIM filter to apply to the population selection.  A SCIM filter offers the greatest flexibility in filtering populations."),
                FILTERABLE,
                &["data_filter"],
            ),
        )
        .attribute(
            "data_filter",
            attr_data_filter(
                SchemaDescription::from_markdown("Individual data filters to apply to the population selection."),
                FILTERABLE,
                &["scim_filter"],
            ),
        )
        .attribute(
            "ids",
            Attribute::string_list(SchemaDescription::from_markdown(
                "The list of resulting IDs of populations that have been successfully retrieved and filtered.",
            ))
            .computed(),
        )
        .exactly_one_of(&["scim_filter", "data_filter"])
    }

    fn configure(&mut self, data: Arc<ProviderData>) {
        self.data = Some(data);
    }

    async fn read(&self, cancel: &CancellationToken, config: Value) -> StateResponse {
        self.try_read(cancel, config)
            .await
            .unwrap_or_else(StateResponse::from_diagnostics)
    }
}
