//! Shared building blocks for resources and data sources.

mod description;
mod diagnostics;
pub mod import;
mod plan_modifier;
pub mod response;
pub mod schema;
pub mod types;
mod value;

pub use description::SchemaDescription;
pub use diagnostics::{AttributePath, Diagnostic, Diagnostics, PathStep, Severity};
pub use import::{ImportComponent, ImportId, ImportIdError, parse_import_id};
pub use plan_modifier::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
pub use response::{
    CustomErrorHandler, Outcome, Request, error_diagnostics, format_pingone_error, parse_read_response,
    parse_response,
};
pub use schema::{Attribute, AttributeKind, CustomType, PlanInputs, PlanOutcome, Schema, Validator};
pub use value::AttrValue;
