//! Import identifier parsing.
//!
//! Import IDs are slash-separated tuples such as
//! `environment_id/credential_type_id/credential_issuance_rule_id`. Each
//! component is checked against its own pattern and the last component is
//! usually the resource's own ID.

use std::collections::BTreeMap;

use regex::Regex;

/// Unanchored resource ID pattern, for composing larger expressions.
pub const RESOURCE_ID_FRAGMENT: &str =
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";

#[derive(Debug, Clone)]
pub struct ImportComponent {
    pub label: &'static str,
    pub pattern: &'static str,
    /// The component holding the resource's own ID.
    pub primary_id: bool,
}

impl ImportComponent {
    /// Component that must be a PingOne resource ID.
    pub fn resource_id(label: &'static str) -> Self {
        Self {
            label,
            pattern: RESOURCE_ID_FRAGMENT,
            primary_id: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary_id = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportIdError {
    #[error("Cannot verify import ID regex: {0}")]
    Regex(String),

    #[error(
        "Invalid import ID specified (\"{id}\").  The ID should be in the format \"{format}\" and must match regex: {regex}"
    )]
    Mismatch {
        id: String,
        format: String,
        regex: String,
    },
}

/// Parsed import ID components keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportId {
    pub components: BTreeMap<&'static str, String>,
    /// Value of the primary component, if one was marked.
    pub primary: Option<String>,
}

impl ImportId {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.components.get(label).map(String::as_str)
    }
}

/// Match `id` against the components joined with `/`.
pub fn parse_import_id(id: &str, components: &[ImportComponent]) -> Result<ImportId, ImportIdError> {
    let labels: Vec<&str> = components.iter().map(|c| c.label).collect();
    let patterns: Vec<&str> = components.iter().map(|c| c.pattern).collect();
    let combined = format!("^{}$", patterns.join(r"\/"));

    let re = Regex::new(&combined).map_err(|e| ImportIdError::Regex(e.to_string()))?;

    let mismatch = || ImportIdError::Mismatch {
        id: id.to_string(),
        format: labels.join("/"),
        regex: combined.clone(),
    };

    if !re.is_match(id) {
        return Err(mismatch());
    }

    let values: Vec<&str> = id.splitn(components.len(), '/').collect();
    if values.len() != components.len() {
        return Err(mismatch());
    }

    let mut parsed = ImportId::default();
    for (component, value) in components.iter().zip(values) {
        if component.primary_id {
            parsed.primary = Some(value.to_string());
        }
        parsed.components.insert(component.label, value.to_string());
    }

    Ok(parsed)
}
