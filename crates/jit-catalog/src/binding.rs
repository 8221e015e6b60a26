//! # Policy Bindings
//!
//! Read-only view of the role bindings in a resource's effective policy.
//! A resource's effective policy is the policy attached to the resource
//! plus every policy attached to its ancestors, each represented as one
//! [`PolicyBindingSet`].

use std::collections::BTreeSet;

use jit_core::{ConditionExpression, Role};
use serde::{Deserialize, Serialize};

use crate::principal::PrincipalSet;

/// A role binding: members granted a role, optionally under a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// The bound role.
    pub role: Role,
    /// Member strings in `user:`/`group:` form (other kinds pass through).
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Condition under which the binding applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionExpression>,
}

impl Binding {
    /// Create an unconditional binding.
    pub fn new(role: Role, members: impl IntoIterator<Item = String>) -> Self {
        Self { role, members: members.into_iter().collect(), condition: None }
    }

    /// Attach a condition.
    pub fn with_condition(mut self, condition: ConditionExpression) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// The bindings of one policy in the ancestry of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBindingSet {
    /// Full name of the resource the policy is attached to.
    pub attached_resource: String,
    /// The policy's bindings.
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

/// Flatten bindings across all policies and keep those that apply to
/// `principals`.
pub fn applicable_bindings(policies: Vec<PolicyBindingSet>, principals: &PrincipalSet) -> Vec<Binding> {
    policies
        .into_iter()
        .flat_map(|policy| policy.bindings)
        .filter(|binding| principals.is_applicable(binding))
        .collect()
}
