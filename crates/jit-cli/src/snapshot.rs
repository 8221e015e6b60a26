//! # Policy Snapshot
//!
//! File-backed stand-in for the directory and policy services, so the
//! catalog can be exercised offline against an exported policy:
//!
//! ```yaml
//! groups:
//!   eng@example.com: [alice@example.com, bob@example.com]
//!   partners@other.com: [carol@other.com]
//! external_groups: [partners@other.com]   # member listing is denied
//! policies:
//!   project-1:                            # effective policies, resource first
//!     - attached_resource: projects/project-1
//!       bindings:
//!         - role: roles/compute.admin
//!           members: ["group:eng@example.com"]
//!           condition: has({}.jitAccessConstraint)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;

use jit_catalog::{DirectoryClient, PolicyBindingSet, PolicyClient};
use jit_core::{GroupId, JitError, ResourceId, UserId};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SnapshotFile {
    groups: BTreeMap<String, Vec<String>>,
    external_groups: BTreeSet<String>,
    policies: BTreeMap<String, Vec<PolicyBindingSet>>,
}

/// A loaded snapshot.
#[derive(Debug, Default)]
pub struct Snapshot {
    groups: BTreeMap<GroupId, Vec<UserId>>,
    external_groups: BTreeSet<GroupId>,
    policies: BTreeMap<ResourceId, Vec<PolicyBindingSet>>,
}

impl Snapshot {
    /// Read and validate a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid snapshot {}", path.display()))
    }

    /// Parse snapshot YAML.
    pub fn parse(content: &str) -> Result<Self> {
        let file: SnapshotFile = serde_yaml::from_str(content).context("failed to parse snapshot YAML")?;

        let mut groups = BTreeMap::new();
        for (group, members) in file.groups {
            let id = GroupId::new(&group)?;
            let members = members
                .iter()
                .map(|m| UserId::new(m))
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("invalid member of group {group}"))?;
            groups.insert(id, members);
        }

        let external_groups = file
            .external_groups
            .iter()
            .map(|g| GroupId::new(g))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let mut policies = BTreeMap::new();
        for (resource, sets) in file.policies {
            policies.insert(ResourceId::new(&resource)?, sets);
        }

        tracing::debug!(
            groups = groups.len(),
            external_groups = external_groups.len(),
            resources = policies.len(),
            "loaded snapshot"
        );
        Ok(Self { groups, external_groups, policies })
    }

    /// Directory view of the snapshot.
    pub fn directory(self: &Arc<Self>) -> Arc<dyn DirectoryClient> {
        Arc::new(SnapshotDirectory(Arc::clone(self)))
    }

    /// Policy view of the snapshot.
    pub fn policy(self: &Arc<Self>) -> Arc<dyn PolicyClient> {
        Arc::new(SnapshotPolicy(Arc::clone(self)))
    }
}

/// [`DirectoryClient`] over a snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotDirectory(pub Arc<Snapshot>);

impl DirectoryClient for SnapshotDirectory {
    fn list_direct_groups(&self, user: &UserId) -> Result<Vec<GroupId>, JitError> {
        Ok(self
            .0
            .groups
            .iter()
            .filter(|(_, members)| members.contains(user))
            .map(|(group, _)| group.clone())
            .collect())
    }

    fn list_direct_members(&self, group: &GroupId) -> Result<Vec<UserId>, JitError> {
        if self.0.external_groups.contains(group) {
            return Err(JitError::AccessDenied(format!("members of {group} are not visible")));
        }
        Ok(self.0.groups.get(group).cloned().unwrap_or_default())
    }
}

/// [`PolicyClient`] over a snapshot. The scope is ignored.
#[derive(Debug, Clone)]
pub struct SnapshotPolicy(pub Arc<Snapshot>);

impl PolicyClient for SnapshotPolicy {
    fn get_effective_policies(
        &self,
        _scope: &str,
        resource: &ResourceId,
    ) -> Result<Vec<PolicyBindingSet>, JitError> {
        self.0
            .policies
            .get(resource)
            .cloned()
            .ok_or_else(|| JitError::AccessDenied(format!("no policy for {resource} in snapshot")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
groups:
  eng@example.com: [alice@example.com, Bob@Example.com]
  partners@other.com: [carol@other.com]
external_groups: [partners@other.com]
policies:
  project-1:
    - attached_resource: projects/project-1
      bindings:
        - role: roles/compute.admin
          members: ["group:eng@example.com"]
          condition: has({}.jitAccessConstraint)
"#;

    #[test]
    fn parses_and_serves_groups() {
        let snapshot = Arc::new(Snapshot::parse(SNAPSHOT).unwrap());
        let directory = snapshot.directory();

        let bob = UserId::new("bob@example.com").unwrap();
        assert_eq!(directory.list_direct_groups(&bob).unwrap(), vec![GroupId::new("eng@example.com").unwrap()]);
        assert_eq!(directory.list_direct_members(&GroupId::new("eng@example.com").unwrap()).unwrap().len(), 2);
        assert!(matches!(
            directory.list_direct_members(&GroupId::new("partners@other.com").unwrap()),
            Err(JitError::AccessDenied(_))
        ));
    }

    #[test]
    fn serves_policies_by_resource() {
        let snapshot = Arc::new(Snapshot::parse(SNAPSHOT).unwrap());
        let policy = snapshot.policy();

        let sets = policy.get_effective_policies("", &ResourceId::new("project-1").unwrap()).unwrap();
        assert_eq!(sets[0].bindings[0].role.as_str(), "roles/compute.admin");
        assert!(policy.get_effective_policies("", &ResourceId::new("project-2").unwrap()).is_err());
    }

    #[test]
    fn rejects_invalid_members() {
        assert!(Snapshot::parse("groups:\n  eng@example.com: [not-an-email]\n").is_err());
        assert!(Snapshot::parse("unknown: 1\n").is_err());
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snapshot = Snapshot::parse("{}").unwrap();
        assert!(snapshot.groups.is_empty());
    }
}
