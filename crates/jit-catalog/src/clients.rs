//! # Collaborator Interfaces
//!
//! The directory and policy services the catalog reads from. Production
//! deployments implement these against the cloud directory and asset
//! inventory APIs; tests use [`MockDirectory`] and [`MockPolicy`].
//!
//! The traits are synchronous. Async callers run them on the blocking
//! thread pool (see [`crate::resolver`]), so implementations may block on
//! network I/O.
//!
//! ## Failure contract
//!
//! - `AccessDenied` when the caller may not read the group or policy.
//!   For `list_direct_members` this is expected for groups owned by
//!   another organization.
//! - `Io` for transport failures.

use std::collections::{BTreeMap, BTreeSet};

use jit_core::{GroupId, JitError, ResourceId, UserId};

use crate::binding::PolicyBindingSet;

/// Group membership lookups.
pub trait DirectoryClient: Send + Sync {
    /// Groups the user is a direct member of.
    fn list_direct_groups(&self, user: &UserId) -> Result<Vec<GroupId>, JitError>;

    /// Direct user members of a group.
    fn list_direct_members(&self, group: &GroupId) -> Result<Vec<UserId>, JitError>;
}

/// Effective policy lookups.
pub trait PolicyClient: Send + Sync {
    /// Policies attached to `resource` and each of its ancestors, as seen
    /// from `scope` (e.g. `organizations/123`).
    fn get_effective_policies(
        &self,
        scope: &str,
        resource: &ResourceId,
    ) -> Result<Vec<PolicyBindingSet>, JitError>;
}

/// In-memory directory for tests.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    groups: BTreeMap<GroupId, Vec<UserId>>,
    external: BTreeSet<GroupId>,
    failure: Option<JitError>,
}

fn users(emails: &[&str]) -> Vec<UserId> {
    emails.iter().filter_map(|e| UserId::new(e).ok()).collect()
}

impl MockDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a group with the given members. Malformed emails are skipped.
    pub fn with_group(mut self, email: &str, members: &[&str]) -> Self {
        if let Ok(id) = GroupId::new(email) {
            self.groups.insert(id, users(members));
        }
        self
    }

    /// Add a group whose membership is visible from the user's side but
    /// whose member list is denied.
    pub fn with_external_group(mut self, email: &str, members: &[&str]) -> Self {
        if let Ok(id) = GroupId::new(email) {
            self.external.insert(id.clone());
            self.groups.insert(id, users(members));
        }
        self
    }

    /// Fail every call with `error`.
    pub fn failing_with(mut self, error: JitError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl DirectoryClient for MockDirectory {
    fn list_direct_groups(&self, user: &UserId) -> Result<Vec<GroupId>, JitError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(self
            .groups
            .iter()
            .filter(|(_, members)| members.contains(user))
            .map(|(group, _)| group.clone())
            .collect())
    }

    fn list_direct_members(&self, group: &GroupId) -> Result<Vec<UserId>, JitError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        if self.external.contains(group) {
            return Err(JitError::AccessDenied(format!("group {group} belongs to another organization")));
        }
        self.groups
            .get(group)
            .cloned()
            .ok_or_else(|| JitError::AccessDenied(format!("group {group} does not exist")))
    }
}

/// In-memory policy store for tests.
#[derive(Debug, Clone, Default)]
pub struct MockPolicy {
    policies: BTreeMap<ResourceId, Vec<PolicyBindingSet>>,
    failure: Option<JitError>,
}

impl MockPolicy {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy to the effective policies of `resource`.
    pub fn with_policy(mut self, resource: &ResourceId, policy: PolicyBindingSet) -> Self {
        self.policies.entry(resource.clone()).or_default().push(policy);
        self
    }

    /// Fail every call with `error`.
    pub fn failing_with(mut self, error: JitError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl PolicyClient for MockPolicy {
    fn get_effective_policies(
        &self,
        _scope: &str,
        resource: &ResourceId,
    ) -> Result<Vec<PolicyBindingSet>, JitError> {
        if let Some(e) = &self.failure {
            return Err(e.clone());
        }
        Ok(self.policies.get(resource).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> UserId {
        UserId::new(email).unwrap()
    }

    fn group(email: &str) -> GroupId {
        GroupId::new(email).unwrap()
    }

    #[test]
    fn mock_directory_reports_direct_groups() {
        let dir = MockDirectory::new()
            .with_group("a@example.com", &["alice@example.com"])
            .with_group("b@example.com", &["bob@example.com"]);
        let groups = dir.list_direct_groups(&user("alice@example.com")).unwrap();
        assert_eq!(groups, vec![group("a@example.com")]);
    }

    #[test]
    fn mock_directory_denies_external_groups() {
        let dir = MockDirectory::new().with_external_group("ext@other.com", &["alice@example.com"]);
        assert_eq!(dir.list_direct_groups(&user("alice@example.com")).unwrap().len(), 1);
        assert!(matches!(
            dir.list_direct_members(&group("ext@other.com")),
            Err(JitError::AccessDenied(_))
        ));
    }

    #[test]
    fn mock_policy_returns_empty_for_unknown_resource() {
        let policy = MockPolicy::new();
        let resource = ResourceId::new("p").unwrap();
        assert!(policy.get_effective_policies("organizations/0", &resource).unwrap().is_empty());
    }
}
