//! SCIM filter compilation.
//!
//! Data sources accept either a raw SCIM filter or a structured list of
//! `{name, values}` groups. Groups compile to a conjunction of disjunctions:
//!
//! ```text
//! ((name1 eq "v1") OR (name1 eq "v2")) AND ((name2 eq "v1"))
//! ```
//!
//! Values are inserted verbatim. Quoting and escaping are the caller's
//! concern; templates that need a different shape (for example a nested
//! attribute lookup) are supplied per attribute name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder replaced by each value in a template.
pub const VALUE_PLACEHOLDER: &str = "%s";

/// One attribute and the values it may take.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub name: String,
    pub values: Vec<String>,
}

impl FilterGroup {
    pub fn new<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("Attribute \"{name}\" cannot be used to filter.  Allowed attributes: {allowed}")]
    UnsupportedAttribute { name: String, allowed: String },

    #[error("Attribute \"{0}\" must have at least one value to filter on")]
    NoValues(String),

    #[error("Data filter is not a list of {{name, values}} objects: {0}")]
    Malformed(String),
}

fn render_group(group: &FilterGroup, templates: &BTreeMap<&str, &str>) -> String {
    let template = match templates.get(group.name.as_str()) {
        Some(template) => format!("({})", template),
        None => format!("({} eq \"{}\")", group.name, VALUE_PLACEHOLDER),
    };

    let atoms: Vec<String> = group
        .values
        .iter()
        .map(|value| template.replace(VALUE_PLACEHOLDER, value))
        .collect();

    format!("({})", atoms.join(" OR "))
}

/// Compile filter groups into a SCIM filter string. Empty input yields `""`.
pub fn build_scim_filter(groups: &[FilterGroup], templates: &BTreeMap<&str, &str>) -> String {
    groups
        .iter()
        .map(|group| render_group(group, templates))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Parse a `data_filter` attribute value and check each name against `allowed`.
pub fn parse_data_filter(
    value: &serde_json::Value,
    allowed: &[&str],
) -> Result<Vec<FilterGroup>, FilterError> {
    let groups: Vec<FilterGroup> =
        serde_json::from_value(value.clone()).map_err(|e| FilterError::Malformed(e.to_string()))?;

    for group in &groups {
        if !allowed.contains(&group.name.as_str()) {
            return Err(FilterError::UnsupportedAttribute {
                name: group.name.clone(),
                allowed: allowed.join(", "),
            });
        }
        if group.values.is_empty() {
            return Err(FilterError::NoValues(group.name.clone()));
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn groups() -> Vec<FilterGroup> {
        vec![
            FilterGroup::new("name1", ["v1", "v2", "VALUE3"]),
            FilterGroup::new("name2", ["v1", "v2"]),
        ]
    }

    #[test]
    fn test_multiple_groups() {
        assert_eq!(
            build_scim_filter(&groups(), &BTreeMap::new()),
            r#"((name1 eq "v1") OR (name1 eq "v2") OR (name1 eq "VALUE3")) AND ((name2 eq "v1") OR (name2 eq "v2"))"#
        );
    }

    #[test]
    fn test_custom_template() {
        let groups = vec![FilterGroup::new("name2.id", ["v1", "v2"])];
        let templates = BTreeMap::from([("name2.id", r#"name2[id eq "%s"]"#)]);
        assert_eq!(
            build_scim_filter(&groups, &templates),
            r#"((name2[id eq "v1"]) OR (name2[id eq "v2"]))"#
        );
    }

    #[test]
    fn test_template_only_applies_to_its_name() {
        let templates = BTreeMap::from([("name2", "name2 sw \"%s\"")]);
        let filter = build_scim_filter(&groups(), &templates);
        assert!(filter.starts_with(r#"((name1 eq "v1")"#));
        assert!(filter.ends_with(r#"AND ((name2 sw "v1") OR (name2 sw "v2"))"#));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(build_scim_filter(&[], &BTreeMap::new()), "");
    }

    #[test]
    fn test_block_structure() {
        let groups = vec![
            FilterGroup::new("a", ["1"]),
            FilterGroup::new("b", ["1", "2", "3"]),
            FilterGroup::new("c", ["1", "2"]),
        ];
        let filter = build_scim_filter(&groups, &BTreeMap::new());
        let blocks: Vec<&str> = filter.split(" AND ").collect();
        assert_eq!(blocks.len(), groups.len());
        for (block, group) in blocks.iter().zip(&groups) {
            assert_eq!(block.matches(" OR ").count() + 1, group.values.len());
            assert!(block.starts_with("((") && block.ends_with("))"));
        }
    }

    #[test]
    fn test_values_are_verbatim() {
        let groups = vec![FilterGroup::new("name", [r#"a"b"#])];
        assert_eq!(
            build_scim_filter(&groups, &BTreeMap::new()),
            r#"((name eq "a"b"))"#
        );
    }

    #[test]
    fn test_parse_data_filter() {
        let value = json!([
            {"name": "name", "values": ["Staff", "Contractors"]},
            {"name": "id", "values": ["9c052a8a-14be-44e4-8f07-2662569994ce"]}
        ]);
        let groups = parse_data_filter(&value, &["id", "name"]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].values, vec!["Staff", "Contractors"]);
    }

    #[test]
    fn test_parse_data_filter_rejects_unknown_attribute() {
        let value = json!([{"name": "title", "values": ["x"]}]);
        let err = parse_data_filter(&value, &["id", "name"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attribute \"title\" cannot be used to filter.  Allowed attributes: id, name"
        );
    }

    #[test]
    fn test_parse_data_filter_rejects_malformed() {
        assert!(matches!(
            parse_data_filter(&json!({"name": "id"}), &["id"]),
            Err(FilterError::Malformed(_))
        ));
        assert!(matches!(
            parse_data_filter(&json!([{"name": "id", "values": []}]), &["id"]),
            Err(FilterError::NoValues(_))
        ));
    }
}
