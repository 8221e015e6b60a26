//! # Principal Resolution
//!
//! Expands a user into the set of member strings a binding may name to
//! grant that user access: the user itself plus each group it is a direct
//! member of. Nested groups are not expanded.

use std::collections::BTreeSet;
use std::sync::Arc;

use jit_core::{GroupId, JitError, UserId};

use crate::binding::Binding;
use crate::clients::DirectoryClient;

/// Lower-cased member strings identifying a user and its direct groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalSet {
    members: BTreeSet<String>,
}

impl PrincipalSet {
    /// Build the set for a user and its groups.
    pub fn new(user: &UserId, groups: &[GroupId]) -> Self {
        let mut members: BTreeSet<String> = groups.iter().map(GroupId::to_member).collect();
        members.insert(user.to_member());
        Self { members }
    }

    /// Whether any member of `binding` is in this set, ignoring case.
    pub fn is_applicable(&self, binding: &Binding) -> bool {
        binding
            .members
            .iter()
            .any(|member| self.members.contains(&member.trim().to_lowercase()))
    }

    /// Member strings in the set.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }
}

/// Resolves users to principal sets through a directory.
#[derive(Clone)]
pub struct PrincipalResolver {
    directory: Arc<dyn DirectoryClient>,
}

impl PrincipalResolver {
    /// Create a resolver over `directory`.
    pub fn new(directory: Arc<dyn DirectoryClient>) -> Self {
        Self { directory }
    }

    /// Look up the user's direct groups and build its principal set.
    pub fn resolve(&self, user: &UserId) -> Result<PrincipalSet, JitError> {
        let groups = self.directory.list_direct_groups(user)?;
        Ok(PrincipalSet::new(user, &groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::MockDirectory;
    use jit_core::Role;

    #[test]
    fn includes_user_and_groups() {
        let user = UserId::new("Alice@Example.com").unwrap();
        let set = PrincipalSet::new(&user, &[GroupId::new("eng@example.com").unwrap()]);
        let members: Vec<_> = set.members().collect();
        assert_eq!(members, vec!["group:eng@example.com", "user:alice@example.com"]);
    }

    #[test]
    fn applicability_ignores_member_case() {
        let set = PrincipalSet::new(&UserId::new("alice@example.com").unwrap(), &[]);
        let binding = Binding::new(Role::new("roles/x").unwrap(), ["USER:Alice@EXAMPLE.com".to_string()]);
        assert!(set.is_applicable(&binding));

        let other = Binding::new(Role::new("roles/x").unwrap(), ["user:bob@example.com".to_string()]);
        assert!(!set.is_applicable(&other));
    }

    #[test]
    fn resolver_uses_direct_groups() {
        let directory = MockDirectory::new().with_group("eng@example.com", &["alice@example.com"]);
        let resolver = PrincipalResolver::new(Arc::new(directory));
        let set = resolver.resolve(&UserId::new("alice@example.com").unwrap()).unwrap();
        assert!(set.members().any(|m| m == "group:eng@example.com"));
    }

    #[test]
    fn resolver_propagates_directory_failures() {
        let directory = MockDirectory::new().failing_with(JitError::Io("directory down".into()));
        let resolver = PrincipalResolver::new(Arc::new(directory));
        let err = resolver.resolve(&UserId::new("alice@example.com").unwrap()).unwrap_err();
        assert_eq!(err, JitError::Io("directory down".into()));
    }
}
