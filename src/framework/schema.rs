//! Resource schema model.
//!
//! Schemas describe the attributes a resource accepts, how they are validated
//! and which plan modifiers run against them. Values flow through as JSON
//! snapshots owned by the host.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};

use super::{
    AttrValue, AttributePath, Diagnostics, PlanModifier, PlanModifierRequest, SchemaDescription,
    types::{validate_normalized_obfuscatable, validate_resource_id},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Bool,
    Int64,
    StringSet,
    StringList,
    /// Single nested object.
    Object,
    /// List of nested objects.
    ObjectList,
}

impl AttributeKind {
    fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::String => "string",
            AttributeKind::Bool => "bool",
            AttributeKind::Int64 => "number",
            AttributeKind::StringSet => "set of string",
            AttributeKind::StringList => "list of string",
            AttributeKind::Object => "object",
            AttributeKind::ObjectList => "list of object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            AttributeKind::String => value.is_string(),
            AttributeKind::Bool => value.is_boolean(),
            AttributeKind::Int64 => value.is_i64(),
            AttributeKind::StringSet | AttributeKind::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            AttributeKind::Object => value.is_object(),
            AttributeKind::ObjectList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }
}

/// String value types with their own validation and equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomType {
    ResourceId,
    NormalizedObfuscatable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    /// Strings (or each string element) must have at least this many characters.
    LengthAtLeast(usize),
    /// Collections must have at least this many elements.
    SizeAtLeast(usize),
    /// Strings (or each string element) must be one of the listed values.
    OneOf(Vec<&'static str>),
    /// Lists must not repeat an element.
    UniqueValues,
    /// This attribute must not be set together with any of the named siblings.
    ConflictsWith(Vec<&'static str>),
    /// Exactly one of the named children of this object must be set.
    ExactlyOneOfChildren(Vec<&'static str>),
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub description: SchemaDescription,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    /// Custom type of the value, or of each element for collections.
    pub custom_type: Option<CustomType>,
    pub validators: Vec<Validator>,
    pub plan_modifiers: Vec<PlanModifier>,
    pub default: Option<Value>,
    /// Child attributes of `Object` and `ObjectList` kinds.
    pub attributes: BTreeMap<&'static str, Attribute>,
}

impl Attribute {
    pub fn new(kind: AttributeKind, description: SchemaDescription) -> Self {
        Self {
            kind,
            description,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            custom_type: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            default: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn string(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::String, description)
    }

    pub fn bool(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::Bool, description)
    }

    pub fn int64(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::Int64, description)
    }

    pub fn string_set(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::StringSet, description)
    }

    pub fn string_list(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::StringList, description)
    }

    pub fn object(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::Object, description)
    }

    pub fn object_list(description: SchemaDescription) -> Self {
        Self::new(AttributeKind::ObjectList, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn custom_type(mut self, custom_type: CustomType) -> Self {
        self.custom_type = Some(custom_type);
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn plan_modifier(mut self, modifier: PlanModifier) -> Self {
        self.plan_modifiers.push(modifier);
        self
    }

    /// Optional + computed attribute that falls back to `value` when unset.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self.computed = true;
        self
    }

    pub fn nested(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    fn describe(&self) -> Value {
        let mut out = json!({
            "type": self.kind.as_str(),
            "description": self.description.description,
            "markdown_description": self.description.markdown_description,
            "required": self.required,
            "optional": self.optional,
            "computed": self.computed,
            "sensitive": self.sensitive,
        });
        if let Some(default) = &self.default {
            out["default"] = default.clone();
        }
        if !self.plan_modifiers.is_empty() {
            out["plan_modifiers"] = self
                .plan_modifiers
                .iter()
                .map(|m| Value::String(format!("{:?}", m)))
                .collect();
        }
        if !self.attributes.is_empty() {
            out["attributes"] = describe_attributes(&self.attributes);
        }
        out
    }
}

fn describe_attributes(attributes: &BTreeMap<&'static str, Attribute>) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(name, attr)| (name.to_string(), attr.describe()))
            .collect(),
    )
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub description: SchemaDescription,
    pub version: i64,
    pub attributes: BTreeMap<&'static str, Attribute>,
    /// Groups of top-level attributes where exactly one must be set.
    pub exactly_one_of: Vec<Vec<&'static str>>,
}

/// Inputs for [`Schema::modify_plan`].
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    /// Prior state, `None` when creating.
    pub prior_state: Option<&'a Value>,
    /// Proposed new state, `None` when destroying.
    pub proposed: Option<&'a Value>,
    pub config: &'a Value,
    /// Dotted paths whose proposed value is not yet known.
    pub plan_unknown: &'a BTreeSet<String>,
    /// Dotted paths whose configured value is not yet known.
    pub config_unknown: &'a BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanOutcome {
    /// Planned state after modifiers ran.
    pub planned: Option<Value>,
    /// Paths still unknown after modifiers ran.
    pub unknown: BTreeSet<String>,
    pub requires_replace: Vec<AttributePath>,
}

impl Schema {
    pub fn new(description: SchemaDescription) -> Self {
        Self {
            description,
            ..Default::default()
        }
    }

    pub fn attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn exactly_one_of(mut self, names: &[&'static str]) -> Self {
        self.exactly_one_of.push(names.to_vec());
        self
    }

    /// JSON rendering for documentation and the CLI.
    pub fn describe(&self) -> Value {
        json!({
            "version": self.version,
            "description": self.description.description,
            "markdown_description": self.description.markdown_description,
            "attributes": describe_attributes(&self.attributes),
        })
    }

    /// Validate a configuration snapshot.
    pub fn validate(&self, config: &Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let empty = Map::new();
        let object = config.as_object().unwrap_or(&empty);
        validate_object(&self.attributes, object, None, &mut diags);

        for group in &self.exactly_one_of {
            check_exactly_one_of(group, object, None, &mut diags);
        }
        diags
    }

    /// Fill configured-null attributes that carry a default.
    pub fn apply_defaults(&self, config: &mut Value) {
        if let Some(object) = config.as_object_mut() {
            apply_defaults(&self.attributes, object);
        }
    }

    /// Run every attribute's plan modifiers.
    pub fn modify_plan(&self, inputs: PlanInputs<'_>) -> PlanOutcome {
        let mut outcome = PlanOutcome {
            planned: inputs.proposed.cloned(),
            unknown: inputs.plan_unknown.clone(),
            requires_replace: Vec::new(),
        };

        let ctx = PlanWalk {
            inputs,
            resource_exists: inputs.prior_state.is_some(),
            resource_planned: inputs.proposed.is_some(),
        };
        for (name, attr) in &self.attributes {
            ctx.modify(AttributePath::root(*name), &[*name], attr, &mut outcome);
        }
        outcome
    }
}

struct PlanWalk<'a> {
    inputs: PlanInputs<'a>,
    resource_exists: bool,
    resource_planned: bool,
}

impl PlanWalk<'_> {
    fn lookup(root: Option<&Value>, segments: &[&str]) -> Option<Value> {
        let mut cursor = root?;
        for segment in segments {
            cursor = cursor.get(*segment)?;
        }
        Some(cursor.clone())
    }

    fn value(root: Option<&Value>, segments: &[&str], unknown: &BTreeSet<String>) -> AttrValue {
        if unknown.contains(&segments.join(".")) {
            return AttrValue::Unknown;
        }
        AttrValue::from_json(Self::lookup(root, segments).as_ref())
    }

    fn modify(
        &self,
        path: AttributePath,
        segments: &[&str],
        attr: &Attribute,
        outcome: &mut PlanOutcome,
    ) {
        let dotted = segments.join(".");
        let state = Self::value(self.inputs.prior_state, segments, &BTreeSet::new());
        let config = Self::value(Some(self.inputs.config), segments, self.inputs.config_unknown);

        for modifier in &attr.plan_modifiers {
            let plan = Self::value(outcome.planned.as_ref(), segments, &outcome.unknown);
            let resp = modifier.modify(&PlanModifierRequest {
                path: &path,
                state: &state,
                plan: &plan,
                config: &config,
                resource_exists: self.resource_exists,
                resource_planned: self.resource_planned,
            });

            if resp.requires_replace && !outcome.requires_replace.contains(&path) {
                outcome.requires_replace.push(path.clone());
            }
            if let Some(new_value) = resp.plan_value
                && let Some(planned) = outcome.planned.as_mut()
            {
                set_at(planned, segments, new_value.as_json().cloned().unwrap_or(Value::Null));
                outcome.unknown.remove(&dotted);
            }
        }

        if attr.kind == AttributeKind::Object {
            for (name, child) in &attr.attributes {
                let mut child_segments = segments.to_vec();
                child_segments.push(*name);
                self.modify(path.clone().at_name(*name), &child_segments, child, outcome);
            }
        }
    }
}

fn set_at(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut cursor = root;
    for segment in parents {
        let Some(next) = cursor.get_mut(*segment) else {
            return;
        };
        cursor = next;
    }
    if let Some(object) = cursor.as_object_mut() {
        object.insert(last.to_string(), value);
    }
}

fn child_path(parent: Option<&AttributePath>, name: &str) -> AttributePath {
    match parent {
        Some(p) => p.clone().at_name(name),
        None => AttributePath::root(name),
    }
}

fn validate_object(
    attributes: &BTreeMap<&'static str, Attribute>,
    object: &Map<String, Value>,
    parent: Option<&AttributePath>,
    diags: &mut Diagnostics,
) {
    for key in object.keys() {
        if !attributes.contains_key(key.as_str()) {
            diags.add_attribute_error(
                child_path(parent, key),
                "Unsupported argument",
                format!("An argument named \"{}\" is not expected here.", key),
            );
        }
    }

    for (name, attr) in attributes {
        let path = child_path(parent, name);
        let value = object.get(*name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if attr.required {
                diags.add_attribute_error(
                    path.clone(),
                    "Missing Configuration for Required Attribute",
                    format!(
                        "Must set a configuration value for the {} attribute as the provider has marked it as required.",
                        path
                    ),
                );
            }
            continue;
        };

        if attr.is_read_only() {
            diags.add_attribute_error(
                path,
                "Invalid Configuration for Read-Only Attribute",
                "Cannot set value for this attribute as the provider has marked it as read-only. Remove the configuration line setting the value.",
            );
            continue;
        }

        if !attr.kind.accepts(value) {
            diags.add_attribute_error(
                path,
                "Incorrect attribute value type",
                format!("Inappropriate value for attribute: {} required.", attr.kind.as_str()),
            );
            continue;
        }

        validate_value(attr, value, object, &path, diags);
    }
}

fn validate_value(
    attr: &Attribute,
    value: &Value,
    siblings: &Map<String, Value>,
    path: &AttributePath,
    diags: &mut Diagnostics,
) {
    match attr.kind {
        AttributeKind::String => validate_string(attr, value, path, diags),
        AttributeKind::StringSet | AttributeKind::StringList => {
            let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
            for (i, item) in items.iter().enumerate() {
                validate_string(attr, item, &path.clone().at_list_index(i), diags);
            }
        }
        AttributeKind::Object => {
            if let Some(object) = value.as_object() {
                validate_object(&attr.attributes, object, Some(path), diags);
            }
        }
        AttributeKind::ObjectList => {
            let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
            for (i, item) in items.iter().enumerate() {
                if let Some(object) = item.as_object() {
                    let item_path = path.clone().at_list_index(i);
                    validate_object(&attr.attributes, object, Some(&item_path), diags);
                }
            }
        }
        AttributeKind::Bool | AttributeKind::Int64 => {}
    }

    for validator in &attr.validators {
        match validator {
            Validator::SizeAtLeast(min) => {
                let len = value.as_array().map(Vec::len).unwrap_or_default();
                if len < *min {
                    diags.add_attribute_error(
                        path.clone(),
                        "Invalid Attribute Value",
                        format!("Attribute {} list must contain at least {} elements, got: {}", path, min, len),
                    );
                }
            }
            Validator::UniqueValues => {
                let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
                let mut seen = BTreeSet::new();
                for item in items {
                    if !seen.insert(item.to_string()) {
                        diags.add_attribute_error(
                            path.clone(),
                            "Duplicate List Value",
                            format!("This attribute contains duplicate values of: {}", item),
                        );
                    }
                }
            }
            Validator::ConflictsWith(others) => {
                for other in others {
                    if siblings.get(*other).is_some_and(|v| !v.is_null()) {
                        diags.add_attribute_error(
                            path.clone(),
                            "Invalid Attribute Combination",
                            format!(
                                "Attribute \"{}\" cannot be specified when \"{}\" is specified",
                                other, path
                            ),
                        );
                    }
                }
            }
            Validator::ExactlyOneOfChildren(names) => {
                if let Some(object) = value.as_object() {
                    check_exactly_one_of(names, object, Some(path), diags);
                }
            }
            Validator::LengthAtLeast(_) | Validator::OneOf(_) => {}
        }
    }
}

fn validate_string(attr: &Attribute, value: &Value, path: &AttributePath, diags: &mut Diagnostics) {
    let Some(text) = value.as_str() else {
        return;
    };

    match attr.custom_type {
        Some(CustomType::ResourceId) => {
            validate_resource_id(&AttrValue::Known(value.clone()), path, diags)
        }
        Some(CustomType::NormalizedObfuscatable) => {
            validate_normalized_obfuscatable(&AttrValue::Known(value.clone()), path, diags)
        }
        None => {}
    }

    for validator in &attr.validators {
        match validator {
            Validator::LengthAtLeast(min) if text.chars().count() < *min => {
                diags.add_attribute_error(
                    path.clone(),
                    "Invalid Attribute Value Length",
                    format!(
                        "Attribute {} string length must be at least {}, got: {}",
                        path,
                        min,
                        text.chars().count()
                    ),
                );
            }
            Validator::OneOf(allowed) if !allowed.contains(&text) => {
                diags.add_attribute_error(
                    path.clone(),
                    "Invalid Attribute Value Match",
                    format!(
                        "Attribute {} value must be one of: [\"{}\"], got: \"{}\"",
                        path,
                        allowed.join("\" \""),
                        text
                    ),
                );
            }
            _ => {}
        }
    }
}

fn check_exactly_one_of(
    names: &[&'static str],
    object: &Map<String, Value>,
    parent: Option<&AttributePath>,
    diags: &mut Diagnostics,
) {
    let set: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| object.get(*n).is_some_and(|v| !v.is_null()))
        .collect();

    if set.len() == 1 {
        return;
    }

    let expressions = names
        .iter()
        .map(|n| child_path(parent, n).to_string())
        .collect::<Vec<_>>()
        .join(",");
    let detail = if set.is_empty() {
        format!("No attribute specified when one (and only one) of [{}] is required", expressions)
    } else {
        format!(
            "{} attributes specified when one (and only one) of [{}] is required",
            set.len(),
            expressions
        )
    };
    let path = parent.cloned().unwrap_or_else(|| child_path(None, names[0]));
    diags.add_attribute_error(path, "Invalid Attribute Combination", detail);
}

fn apply_defaults(attributes: &BTreeMap<&'static str, Attribute>, object: &mut Map<String, Value>) {
    for (name, attr) in attributes {
        let entry = object.entry(name.to_string()).or_insert(Value::Null);
        if entry.is_null() {
            if let Some(default) = &attr.default {
                *entry = default.clone();
            }
        } else if attr.kind == AttributeKind::Object
            && let Some(child) = entry.as_object_mut()
        {
            apply_defaults(&attr.attributes, child);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Common attributes
// ─────────────────────────────────────────────────────────────────────────────

/// Computed resource ID that keeps its value once known.
pub fn attr_id() -> Attribute {
    Attribute::string(SchemaDescription::from_markdown("The ID of this resource."))
        .computed()
        .custom_type(CustomType::ResourceId)
        .plan_modifier(PlanModifier::UseStateForUnknown)
}

/// Required, immutable reference to another PingOne resource.
pub fn attr_link_id(description: SchemaDescription) -> Attribute {
    let description = description
        .append_markdown("Must be a valid PingOne resource ID.")
        .requires_replace();

    Attribute::string(description)
        .required()
        .custom_type(CustomType::ResourceId)
        .plan_modifier(PlanModifier::RequiresReplace)
}

/// Required reference to the environment that owns the resource.
pub fn attr_environment_id(resource_name: &str) -> Attribute {
    attr_link_id(SchemaDescription::from_markdown(format!(
        "The ID of the environment to create and manage the {} in.",
        resource_name
    )))
}

/// Optional raw SCIM filter for data sources.
pub fn attr_scim_filter(
    description: SchemaDescription,
    acceptable: &[&str],
    mutually_exclusive: &[&str],
) -> Attribute {
    let mut description = description.clean(true);
    description.markdown_description = format!(
        "{}.  The SCIM filter can use the following attributes: `{}`.",
        description.markdown_description,
        acceptable.join("`, `")
    );
    description.description = format!(
        "{}.  The SCIM filter can use the following attributes: \"{}\".",
        description.description,
        acceptable.join("\", \"")
    );
    let description = description.exactly_one_of(mutually_exclusive);

    Attribute::string(description)
        .optional()
        .validator(Validator::LengthAtLeast(1))
}

/// Optional structured filter (`[{name, values}]`) for data sources.
pub fn attr_data_filter(
    description: SchemaDescription,
    acceptable: &[&'static str],
    mutually_exclusive: &[&str],
) -> Attribute {
    let mut description = description.clean(true);
    description.markdown_description = format!(
        "{}.  Allowed attributes to filter: `{}`",
        description.markdown_description,
        acceptable.join("`, `")
    );
    description.description = format!(
        "{}.  Allowed attributes to filter: \"{}\"",
        description.description,
        acceptable.join("\", \"")
    );
    let description = description.exactly_one_of(mutually_exclusive);

    let name = Attribute::string(SchemaDescription::from_markdown(format!(
        "The attribute name to filter on.  Must be one of the following values: `{}`.",
        acceptable.join("`, `")
    )))
    .required()
    .validator(Validator::LengthAtLeast(1))
    .validator(Validator::OneOf(acceptable.to_vec()));

    let values = Attribute::string_list(SchemaDescription::from_markdown(
        "The possible values (case sensitive) of the attribute defined in the `name` parameter to filter.",
    ))
    .required()
    .validator(Validator::SizeAtLeast(1))
    .validator(Validator::UniqueValues)
    .validator(Validator::LengthAtLeast(1));

    Attribute::object_list(description)
        .optional()
        .nested("name", name)
        .nested("values", values)
}
