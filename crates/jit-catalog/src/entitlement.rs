//! # Entitlements and Activations
//!
//! Value types produced by entitlement resolution. None of them are
//! persisted: they are derived from the policy on every call.
//!
//! ## Ordering
//!
//! `EligibleEntitlement` has a total order (resource, role, type) so that
//! sets of entitlements merge and render deterministically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use jit_core::{JitError, ResourceId, Role, Timestamp};
use serde::{Deserialize, Serialize, Serializer};

/// How an entitlement is activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationType {
    /// Self-service activation without review.
    Jit,
    /// Activation after approval by one or more reviewers.
    Mpa,
}

impl ActivationType {
    /// All activation types.
    pub const ALL: [ActivationType; 2] = [ActivationType::Jit, ActivationType::Mpa];

    /// Return the string representation of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jit => "JIT",
            Self::Mpa => "MPA",
        }
    }
}

impl fmt::Display for ActivationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivationType {
    type Err = JitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JIT" => Ok(Self::Jit),
            "MPA" => Ok(Self::Mpa),
            other => Err(JitError::InvalidArgument(format!("unknown activation type {other:?}"))),
        }
    }
}

/// A role on a specific resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRole {
    /// The resource the role applies to.
    pub resource: ResourceId,
    /// The role.
    pub role: Role,
}

impl ResourceRole {
    /// Create a resource role.
    pub fn new(resource: ResourceId, role: Role) -> Self {
        Self { resource, role }
    }
}

impl fmt::Display for ResourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.role, self.resource)
    }
}

/// A role a principal may activate, and how.
///
/// Identity is the resource role: two entitlements for the same resource
/// role with different activation types are the same entitlement offered
/// two ways.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EligibleEntitlement {
    /// The role on the resource that would be granted.
    pub resource_role: ResourceRole,
    /// Role that is bound on activation.
    pub granted_role: Role,
    /// How the entitlement is activated.
    pub activation_type: ActivationType,
}

impl EligibleEntitlement {
    /// Create an entitlement granting the resource role itself.
    pub fn new(resource_role: ResourceRole, activation_type: ActivationType) -> Self {
        Self {
            granted_role: resource_role.role.clone(),
            resource_role,
            activation_type,
        }
    }

    /// The entitlement's identity.
    pub fn id(&self) -> &ResourceRole {
        &self.resource_role
    }
}

/// A time-bounded activation, valid at `t` iff `start_time <= t <= end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Activation {
    start_time: Timestamp,
    end_time: Timestamp,
}

impl Activation {
    /// Create an activation window; `start_time` must not be after `end_time`.
    pub fn new(start_time: Timestamp, end_time: Timestamp) -> Result<Self, JitError> {
        if start_time > end_time {
            return Err(JitError::InvalidArgument(format!(
                "activation start {start_time} is after end {end_time}"
            )));
        }
        Ok(Self { start_time, end_time })
    }

    /// Start of the window.
    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// End of the window (inclusive).
    pub fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Whether the activation is valid at `now`. Both bounds are inclusive.
    pub fn is_valid(&self, now: Timestamp) -> bool {
        self.start_time <= now && now <= self.end_time
    }
}

/// Everything a principal can do, and has done, on a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitlementSet {
    /// Entitlements that can be activated, at most one per resource role.
    pub available: BTreeSet<EligibleEntitlement>,
    /// Activations valid now.
    #[serde(serialize_with = "serialize_activations")]
    pub current: BTreeMap<ResourceRole, Activation>,
    /// Activations no longer (or not yet) valid.
    #[serde(serialize_with = "serialize_activations")]
    pub expired: BTreeMap<ResourceRole, Activation>,
    /// Non-fatal problems encountered during resolution.
    pub warnings: BTreeSet<String>,
}

#[derive(Serialize)]
struct ActivationEntry<'a> {
    #[serde(flatten)]
    resource_role: &'a ResourceRole,
    #[serde(flatten)]
    activation: &'a Activation,
}

/// Activation maps serialize as lists, since JSON keys must be strings.
fn serialize_activations<S: Serializer>(
    activations: &BTreeMap<ResourceRole, Activation>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(
        activations
            .iter()
            .map(|(resource_role, activation)| ActivationEntry { resource_role, activation }),
    )
}

impl EntitlementSet {
    /// Assemble an entitlement set.
    ///
    /// `available` is every JIT entitlement plus each MPA entitlement whose
    /// resource role is not also JIT-eligible. Activations are partitioned
    /// into `current` and `expired` by validity at `now`. The two maps never
    /// share a key: a resource role with any valid activation is current
    /// only, otherwise it keeps its last expired activation.
    pub fn assemble(
        jit: impl IntoIterator<Item = EligibleEntitlement>,
        mpa: impl IntoIterator<Item = EligibleEntitlement>,
        activations: impl IntoIterator<Item = (ResourceRole, Activation)>,
        now: Timestamp,
    ) -> Self {
        let mut available: BTreeSet<EligibleEntitlement> = jit.into_iter().collect();
        let jit_roles: BTreeSet<ResourceRole> =
            available.iter().map(|e| e.resource_role.clone()).collect();
        available.extend(mpa.into_iter().filter(|e| !jit_roles.contains(&e.resource_role)));

        let mut current = BTreeMap::new();
        let mut expired = BTreeMap::new();
        for (resource_role, activation) in activations {
            if activation.is_valid(now) {
                expired.remove(&resource_role);
                current.insert(resource_role, activation);
            } else if !current.contains_key(&resource_role) {
                expired.insert(resource_role, activation);
            }
        }

        Self { available, current, expired, warnings: BTreeSet::new() }
    }

    /// The available entitlement for a resource role, if any.
    pub fn find_available(&self, resource_role: &ResourceRole) -> Option<&EligibleEntitlement> {
        self.available.iter().find(|e| &e.resource_role == resource_role)
    }
}
