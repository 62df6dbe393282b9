//! MFA service resources.

mod application_push_credential;

pub use application_push_credential::{
    ApnsModel, ApplicationPushCredentialModel, ApplicationPushCredentialResource, FcmModel, HmsModel,
};
