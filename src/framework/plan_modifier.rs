//! Plan-time modifiers.
//!
//! The host calls these while planning to decide whether a change can be
//! applied in place or whether the resource must be destroyed and recreated.
//! Some PingOne objects (push credential blocks, mobile app settings, secret
//! holders) cannot be created or removed through an update call, so their
//! existence transitions force a replacement.

use super::{AttrValue, AttributePath};

/// Inputs for a single attribute's plan modification.
#[derive(Debug, Clone, Copy)]
pub struct PlanModifierRequest<'a> {
    pub path: &'a AttributePath,
    /// Attribute value in the prior state.
    pub state: &'a AttrValue,
    /// Attribute value in the proposed plan.
    pub plan: &'a AttrValue,
    /// Attribute value as written in configuration.
    pub config: &'a AttrValue,
    /// False when the resource is being created.
    pub resource_exists: bool,
    /// False when the resource is being destroyed.
    pub resource_planned: bool,
}

impl PlanModifierRequest<'_> {
    fn is_create_or_destroy(&self) -> bool {
        !self.resource_exists || !self.resource_planned
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanModifierResponse {
    pub requires_replace: bool,
    /// Replacement for the planned value, if the modifier changed it.
    pub plan_value: Option<AttrValue>,
}

impl PlanModifierResponse {
    fn replace(requires_replace: bool) -> Self {
        Self {
            requires_replace,
            plan_value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanModifier {
    /// Any change to the value forces replacement.
    RequiresReplace,
    /// Keep the prior state value when the plan would otherwise be unknown.
    UseStateForUnknown,
    /// Object attributes: replace when the object appears or disappears.
    RequiresReplaceIfExistenceChanges,
    /// Object attributes: replace when a previously set object is removed from configuration.
    RequiresReplaceIfNowNull,
    /// Set attributes: replace when a previously unset set is added to configuration.
    RequiresReplaceIfPreviouslyNull,
}

impl PlanModifier {
    pub fn description(&self) -> &'static str {
        match self {
            PlanModifier::RequiresReplace => {
                "If the value of this attribute changes, Terraform will destroy and recreate the resource."
            }
            PlanModifier::UseStateForUnknown => {
                "Once set, the value of this attribute in state will not change."
            }
            PlanModifier::RequiresReplaceIfExistenceChanges => {
                "If the existence of the object changes, Terraform will destroy and recreate the resource."
            }
            PlanModifier::RequiresReplaceIfNowNull => {
                "If the object is removed from configuration, Terraform will destroy and recreate the resource."
            }
            PlanModifier::RequiresReplaceIfPreviouslyNull => {
                "If the set was previously null and is now defined, Terraform will destroy and recreate the resource."
            }
        }
    }

    pub fn modify(&self, req: &PlanModifierRequest<'_>) -> PlanModifierResponse {
        match self {
            PlanModifier::RequiresReplace => {
                if req.is_create_or_destroy() {
                    return PlanModifierResponse::default();
                }
                PlanModifierResponse::replace(req.plan != req.state)
            }
            PlanModifier::UseStateForUnknown => {
                if !req.resource_exists || !req.plan.is_unknown() || !req.state.is_known() {
                    return PlanModifierResponse::default();
                }
                PlanModifierResponse {
                    requires_replace: false,
                    plan_value: Some(req.state.clone()),
                }
            }
            PlanModifier::RequiresReplaceIfExistenceChanges => {
                if req.is_create_or_destroy() {
                    return PlanModifierResponse::default();
                }
                let removed = !req.state.is_null() && !req.plan.is_known();
                let added = req.state.is_null() && !req.plan.is_null();
                PlanModifierResponse::replace(removed || added)
            }
            PlanModifier::RequiresReplaceIfNowNull => {
                if req.is_create_or_destroy() || req.config.is_unknown() {
                    return PlanModifierResponse::default();
                }
                PlanModifierResponse::replace(!req.state.is_null() && req.config.is_null())
            }
            PlanModifier::RequiresReplaceIfPreviouslyNull => {
                if req.is_create_or_destroy() || req.config.is_unknown() {
                    return PlanModifierResponse::default();
                }
                PlanModifierResponse::replace(req.state.is_null() && !req.config.is_null())
            }
        }
    }
}
