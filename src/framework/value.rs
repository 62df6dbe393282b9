use serde_json::Value;

/// An attribute value as seen by the host during planning: it may be null,
/// not yet known (computed during apply), or a concrete JSON value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttrValue {
    #[default]
    Null,
    Unknown,
    Known(Value),
}

impl AttrValue {
    /// Wrap a JSON value; JSON `null` becomes [`AttrValue::Null`].
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => AttrValue::Null,
            Some(v) => AttrValue::Known(v.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AttrValue::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, AttrValue::Known(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AttrValue::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Child attribute of a known object. A null or unknown parent yields the
    /// same state for the child.
    pub fn child(&self, name: &str) -> AttrValue {
        match self {
            AttrValue::Null => AttrValue::Null,
            AttrValue::Unknown => AttrValue::Unknown,
            AttrValue::Known(v) => AttrValue::from_json(v.get(name)),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::from_json(Some(&value))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_null_is_null() {
        assert!(AttrValue::from(Value::Null).is_null());
        assert!(AttrValue::from_json(None).is_null());
        assert!(AttrValue::from(json!({"x": 1})).is_known());
    }

    #[test]
    fn test_child_propagates_state() {
        let parent = AttrValue::from(json!({"key": "abc", "missing": null}));
        assert_eq!(parent.child("key").as_str(), Some("abc"));
        assert!(parent.child("missing").is_null());
        assert!(parent.child("absent").is_null());
        assert!(AttrValue::Unknown.child("key").is_unknown());
        assert!(AttrValue::Null.child("key").is_null());
    }
}
