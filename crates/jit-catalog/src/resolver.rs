//! # Entitlement Resolution
//!
//! Discovers what a user may activate on a resource by reading the
//! resource's effective policy, and who holds a given entitlement.
//!
//! ## Concurrency
//!
//! Collaborator calls are synchronous and run on the blocking thread pool.
//! `find_entitlements` fetches the user's groups and the effective policy
//! concurrently; `find_entitlement_holders` expands each group through its
//! own task. The first failure aborts the call and the results of the
//! other branches are discarded. Nothing is cached between calls.

use std::collections::BTreeSet;
use std::sync::Arc;

use jit_core::{GroupId, JitError, PrincipalId, ResourceId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinSet};

use crate::binding::{applicable_bindings, PolicyBindingSet};
use crate::clients::{DirectoryClient, PolicyClient};
use crate::entitlement::{ActivationType, EntitlementSet, ResourceRole};
use crate::marker::EntitlementClassifier;
use crate::principal::PrincipalResolver;

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Scope for effective policy queries, e.g. `organizations/123`.
    pub scope: String,
}

impl ResolverOptions {
    /// Options querying policies within `scope`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into() }
    }
}

fn join_error(e: JoinError) -> JitError {
    JitError::Io(format!("lookup task failed: {e}"))
}

/// Run a blocking collaborator call on the blocking thread pool.
async fn blocking<T, F>(f: F) -> Result<T, JitError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, JitError> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(join_error)?
}

/// Finds entitlements and entitlement holders from effective policies.
#[derive(Clone)]
pub struct EntitlementResolver {
    directory: Arc<dyn DirectoryClient>,
    policy: Arc<dyn PolicyClient>,
    classifier: EntitlementClassifier,
    options: ResolverOptions,
}

impl EntitlementResolver {
    /// Create a resolver using the default markers.
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        policy: Arc<dyn PolicyClient>,
        options: ResolverOptions,
    ) -> Self {
        Self::with_classifier(directory, policy, EntitlementClassifier::default(), options)
    }

    /// Create a resolver using a custom classifier.
    pub fn with_classifier(
        directory: Arc<dyn DirectoryClient>,
        policy: Arc<dyn PolicyClient>,
        classifier: EntitlementClassifier,
        options: ResolverOptions,
    ) -> Self {
        Self { directory, policy, classifier, options }
    }

    /// The resolver's options.
    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    async fn effective_policies(&self, resource: &ResourceId) -> Result<Vec<PolicyBindingSet>, JitError> {
        let policy = Arc::clone(&self.policy);
        let scope = self.options.scope.clone();
        let resource = resource.clone();
        blocking(move || policy.get_effective_policies(&scope, &resource)).await
    }

    /// Entitlements and activations of `user` on `resource` as of now.
    pub async fn find_entitlements(
        &self,
        user: &UserId,
        resource: &ResourceId,
        types: &[ActivationType],
    ) -> Result<EntitlementSet, JitError> {
        self.find_entitlements_at(user, resource, types, Timestamp::now()).await
    }

    /// Entitlements and activations of `user` on `resource`, partitioning
    /// activations by validity at `now`.
    ///
    /// Only eligibility of the requested `types` is reported; activations
    /// are reported regardless of type.
    pub async fn find_entitlements_at(
        &self,
        user: &UserId,
        resource: &ResourceId,
        types: &[ActivationType],
        now: Timestamp,
    ) -> Result<EntitlementSet, JitError> {
        let principals = {
            let resolver = PrincipalResolver::new(Arc::clone(&self.directory));
            let user = user.clone();
            blocking(move || resolver.resolve(&user))
        };
        let (principals, policies) = tokio::try_join!(principals, self.effective_policies(resource))?;

        let bindings = applicable_bindings(policies, &principals);
        tracing::debug!(
            user = %user,
            resource = %resource,
            bindings = bindings.len(),
            "found applicable bindings"
        );

        let eligible = |activation_type| {
            if types.contains(&activation_type) {
                self.classifier.eligible(resource, &bindings, activation_type)
            } else {
                BTreeSet::new()
            }
        };

        let set = EntitlementSet::assemble(
            eligible(ActivationType::Jit),
            eligible(ActivationType::Mpa),
            self.classifier.activations(resource, &bindings),
            now,
        );

        tracing::info!(
            user = %user,
            resource = %resource,
            available = set.available.len(),
            current = set.current.len(),
            expired = set.expired.len(),
            "resolved entitlements"
        );
        Ok(set)
    }

    /// Users eligible to activate `resource_role` with `activation_type`,
    /// directly or through one level of group membership.
    ///
    /// Groups whose members cannot be listed (typically groups owned by
    /// another organization) contribute no users.
    pub async fn find_entitlement_holders(
        &self,
        resource_role: &ResourceRole,
        activation_type: ActivationType,
    ) -> Result<BTreeSet<UserId>, JitError> {
        let policies = self.effective_policies(&resource_role.resource).await?;

        let members: BTreeSet<PrincipalId> = policies
            .into_iter()
            .flat_map(|policy| policy.bindings)
            .filter(|binding| self.classifier.grants(resource_role, binding, activation_type))
            .flat_map(|binding| binding.members)
            .filter_map(|member| PrincipalId::from_member(&member))
            .collect();

        let mut holders = BTreeSet::new();
        let mut groups: Vec<GroupId> = Vec::new();
        for member in members {
            match member {
                PrincipalId::User(user) => {
                    holders.insert(user);
                }
                PrincipalId::Group(group) => groups.push(group),
            }
        }

        let mut lookups = JoinSet::new();
        for group in groups {
            let directory = Arc::clone(&self.directory);
            lookups.spawn_blocking(move || match directory.list_direct_members(&group) {
                Err(JitError::AccessDenied(reason)) => {
                    tracing::warn!(group = %group, reason = %reason, "cannot list group members, skipping");
                    Ok(Vec::new())
                }
                other => other,
            });
        }

        while let Some(result) = lookups.join_next().await {
            holders.extend(result.map_err(join_error)??);
        }

        tracing::info!(
            resource_role = %resource_role,
            activation_type = %activation_type,
            holders = holders.len(),
            "resolved entitlement holders"
        );
        Ok(holders)
    }

    /// Resources on which `user` has entitlements.
    ///
    /// Effective policies can only be read per resource, so this lookup
    /// is not available; callers must search resources themselves.
    pub async fn find_resources_with_entitlements(
        &self,
        user: &UserId,
    ) -> Result<BTreeSet<ResourceId>, JitError> {
        Err(JitError::Unsupported(format!(
            "listing resources with entitlements for {user} is not supported; search for resources instead"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::clients::{MockDirectory, MockPolicy};
    use crate::marker::{JIT_CONDITION, MPA_CONDITION};
    use jit_core::{ConditionExpression, Role};

    fn project() -> ResourceId {
        ResourceId::new("project-1").unwrap()
    }

    fn binding(role: &str, members: &[&str], condition: &str) -> Binding {
        Binding::new(Role::new(role).unwrap(), members.iter().map(|m| m.to_string()))
            .with_condition(ConditionExpression::new(condition))
    }

    fn resolver(directory: MockDirectory, bindings: Vec<Binding>) -> EntitlementResolver {
        let policy = MockPolicy::new().with_policy(
            &project(),
            PolicyBindingSet { attached_resource: "//cloudresourcemanager/projects/project-1".into(), bindings },
        );
        EntitlementResolver::new(Arc::new(directory), Arc::new(policy), ResolverOptions::new("organizations/0"))
    }

    #[tokio::test]
    async fn requested_types_limit_eligibility() {
        let r = resolver(
            MockDirectory::new(),
            vec![
                binding("roles/a", &["user:alice@example.com"], JIT_CONDITION),
                binding("roles/b", &["user:alice@example.com"], MPA_CONDITION),
            ],
        );
        let user = UserId::new("alice@example.com").unwrap();

        let only_mpa = r.find_entitlements(&user, &project(), &[ActivationType::Mpa]).await.unwrap();
        assert_eq!(only_mpa.available.len(), 1);
        assert!(only_mpa.available.iter().all(|e| e.activation_type == ActivationType::Mpa));

        let none = r.find_entitlements(&user, &project(), &[]).await.unwrap();
        assert!(none.available.is_empty());
    }

    #[tokio::test]
    async fn policy_failure_aborts_resolution() {
        let policy = MockPolicy::new().failing_with(JitError::AccessDenied("no policy access".into()));
        let r = EntitlementResolver::new(
            Arc::new(MockDirectory::new()),
            Arc::new(policy),
            ResolverOptions::new("organizations/0"),
        );
        let err = r
            .find_entitlements(&UserId::new("alice@example.com").unwrap(), &project(), &ActivationType::ALL)
            .await
            .unwrap_err();
        assert_eq!(err, JitError::AccessDenied("no policy access".into()));
    }

    #[tokio::test]
    async fn resources_with_entitlements_is_unsupported() {
        let r = resolver(MockDirectory::new(), vec![]);
        let err = r
            .find_resources_with_entitlements(&UserId::new("alice@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, JitError::Unsupported(_)));
    }
}
