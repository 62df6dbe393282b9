//! Verifiable credentials resources.

mod credential_issuance_rule;
mod credential_type;

pub use credential_issuance_rule::{CredentialIssuanceRuleModel, CredentialIssuanceRuleResource};
pub use credential_type::{
    CredentialTypeModel, CredentialTypeResource, MANAGEMENT_MODE_AUTOMATED, MANAGEMENT_MODE_MANAGED,
};
