//! JSON string values whose equality ignores server-obfuscated fields.
//!
//! PingOne redacts secrets in read responses by replacing string leaves with a
//! run of asterisks. A configured JSON document and the redacted copy the server
//! returns must compare equal, otherwise every plan would show drift.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::framework::{AttrValue, AttributePath, Diagnostics};

/// A string carrying a JSON document, compared with [`semantic_equals`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedObfuscatable(String);

impl NormalizedObfuscatable {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn semantically_equals(&self, other: &NormalizedObfuscatable) -> bool {
        semantic_equals(&self.0, &other.0)
    }
}

/// Non-empty and made only of `*`.
pub fn is_all_asterisks(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c == '*')
}

/// Whether `s` parses as JSON.
pub fn is_valid(s: &str) -> Result<(), serde_json::Error> {
    serde_json::from_str::<Value>(s).map(|_| ())
}

/// Structural JSON equality that treats a string leaf as matching whenever
/// either side is an asterisk run. Unparseable input on either side is unequal.
pub fn semantic_equals(a: &str, b: &str) -> bool {
    let (Ok(a), Ok(b)) = (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) else {
        return false;
    };
    values_match(&a, &b)
}

fn values_match(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::String(sx), Value::String(sy)) => {
            is_all_asterisks(sx) || is_all_asterisks(sy) || sx == sy
        }
        (Value::Object(ox), Value::Object(oy)) => {
            ox.len() == oy.len()
                && ox
                    .iter()
                    .all(|(k, vx)| oy.get(k).is_some_and(|vy| values_match(vx, vy)))
        }
        (Value::Array(ax), Value::Array(ay)) => {
            ax.len() == ay.len() && ax.iter().zip(ay).all(|(vx, vy)| values_match(vx, vy))
        }
        // 1 and 1.0 are the same JSON number
        (Value::Number(nx), Value::Number(ny)) => match (nx.as_f64(), ny.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => nx == ny,
        },
        _ => x == y,
    }
}

/// Attribute-level validation. Null and unknown values are accepted.
pub fn validate_normalized_obfuscatable(
    value: &AttrValue,
    path: &AttributePath,
    diags: &mut Diagnostics,
) {
    let Some(json) = value.as_json() else {
        return;
    };

    let Some(text) = json.as_str() else {
        diags.add_attribute_error(
            path.clone(),
            "JSON String Type Validation Error",
            "The value must be a string containing a JSON document.",
        );
        return;
    };

    if let Err(e) = is_valid(text) {
        diags.add_attribute_error(
            path.clone(),
            "JSON String Type Validation Error",
            format!("The value could not be unmarshalled as JSON: {}", e),
        );
    }
}
