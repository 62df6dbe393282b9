use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::framework::{AttrValue, AttributePath, Diagnostics};

/// Pattern every PingOne resource identifier must match.
pub const RESOURCE_ID_PATTERN: &str =
    r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

pub static RESOURCE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RESOURCE_ID_PATTERN).unwrap());

/// A validated PingOne resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidResourceId> {
        let value = value.into();
        if RESOURCE_ID_REGEX.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidResourceId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceId {
    type Error = InvalidResourceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("The PingOne resource ID is malformed. Must match regex \"{}\"", RESOURCE_ID_PATTERN)]
pub struct InvalidResourceId(pub String);

/// Attribute-level validation. Null and unknown values are accepted.
pub fn validate_resource_id(value: &AttrValue, path: &AttributePath, diags: &mut Diagnostics) {
    let AttrValue::Known(json) = value else {
        return;
    };

    let valid = json.as_str().is_some_and(|s| RESOURCE_ID_REGEX.is_match(s));
    if !valid {
        let offending = json
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| json.to_string());
        diags.add_attribute_error(
            path.clone(),
            "PingOne Resource ID Type Validation Error",
            InvalidResourceId(offending).to_string(),
        );
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::valid("9c052a8a-14be-44e4-8f07-2662569994ce", true)]
    #[case::uppercase("9C052A8A-14BE-44E4-8F07-2662569994CE", false)]
    #[case::short("9c052a8a-14be-44e4-8f07-2662569994c", false)]
    #[case::no_dashes("9c052a8a14be44e48f072662569994ce", false)]
    #[case::empty("", false)]
    #[case::trailing_space("9c052a8a-14be-44e4-8f07-2662569994ce ", false)]
    fn test_parse(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(ResourceId::parse(input).is_ok(), ok);
    }

    #[test]
    fn test_null_and_unknown_are_valid() {
        let path = AttributePath::root("environment_id");
        let mut diags = Diagnostics::new();
        validate_resource_id(&AttrValue::Null, &path, &mut diags);
        validate_resource_id(&AttrValue::Unknown, &path, &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn test_malformed_value_names_path_and_regex() {
        let path = AttributePath::root("filter").at_name("population_ids");
        let mut diags = Diagnostics::new();
        validate_resource_id(&AttrValue::Known(json!("not-an-id")), &path, &mut diags);

        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "PingOne Resource ID Type Validation Error");
        assert_eq!(diag.path.as_ref().unwrap().to_string(), "filter.population_ids");
        assert!(diag.detail.contains(RESOURCE_ID_PATTERN));
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let ok: ResourceId = serde_json::from_value(json!("9c052a8a-14be-44e4-8f07-2662569994ce")).unwrap();
        assert_eq!(ok.as_str(), "9c052a8a-14be-44e4-8f07-2662569994ce");
        assert!(serde_json::from_value::<ResourceId>(json!("nope")).is_err());
    }
}
