//! End-to-end tests for entitlement discovery against in-memory
//! collaborators.
//!
//! | Scenario | Test |
//! |----------|------|
//! | JIT wins over MPA for the same role | `jit_and_mpa_eligible_role_is_offered_as_jit` |
//! | Group-granted eligibility | `eligibility_through_group_membership` |
//! | Activations at the end boundary | `activation_ending_now_is_current` |
//! | Ancestor policies | `bindings_from_ancestors_apply` |
//! | Directory failure | `directory_failure_aborts_resolution` |
//! | Holders with a denied group | `holders_tolerate_denied_group` |
//! | Holders with a failing group | `holders_propagate_other_group_failures` |

use std::sync::Arc;

use jit_catalog::marker::{activation_condition, JIT_CONDITION, MPA_CONDITION};
use jit_catalog::{
    Activation, ActivationType, Binding, EntitlementResolver, MockDirectory, MockPolicy, PolicyBindingSet,
    PolicyClient, ResolverOptions, ResourceRole,
};
use jit_core::{ConditionExpression, GroupId, JitError, ResourceId, Role, Timestamp, UserId};

fn project() -> ResourceId {
    ResourceId::new("project-1").unwrap()
}

fn user(email: &str) -> UserId {
    UserId::new(email).unwrap()
}

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

fn resource_role(role: &str) -> ResourceRole {
    ResourceRole::new(project(), Role::new(role).unwrap())
}

fn binding(role: &str, members: &[&str], condition: &str) -> Binding {
    Binding::new(Role::new(role).unwrap(), members.iter().map(|m| m.to_string()))
        .with_condition(ConditionExpression::new(condition))
}

fn policy(attached: &str, bindings: Vec<Binding>) -> PolicyBindingSet {
    PolicyBindingSet { attached_resource: attached.to_string(), bindings }
}

fn resolver_with(directory: MockDirectory, policies: Vec<PolicyBindingSet>) -> EntitlementResolver {
    let store = policies
        .into_iter()
        .fold(MockPolicy::new(), |store, p| store.with_policy(&project(), p));
    EntitlementResolver::new(Arc::new(directory), Arc::new(store), ResolverOptions::new("organizations/0"))
}

fn window(start: &str, end: &str) -> Activation {
    Activation::new(ts(start), ts(end)).unwrap()
}

#[tokio::test]
async fn jit_and_mpa_eligible_role_is_offered_as_jit() {
    let r = resolver_with(
        MockDirectory::new(),
        vec![policy(
            "projects/project-1",
            vec![
                binding("roles/both", &["user:alice@example.com"], JIT_CONDITION),
                binding("roles/both", &["user:alice@example.com"], MPA_CONDITION),
                binding("roles/mpa", &["user:alice@example.com"], MPA_CONDITION),
            ],
        )],
    );

    let set = r
        .find_entitlements(&user("alice@example.com"), &project(), &ActivationType::ALL)
        .await
        .unwrap();

    assert_eq!(set.available.len(), 2);
    assert_eq!(set.find_available(&resource_role("roles/both")).unwrap().activation_type, ActivationType::Jit);
    assert_eq!(set.find_available(&resource_role("roles/mpa")).unwrap().activation_type, ActivationType::Mpa);
    assert!(set.warnings.is_empty());
}

#[tokio::test]
async fn eligibility_through_group_membership() {
    let directory = MockDirectory::new().with_group("eng@example.com", &["alice@example.com"]);
    let r = resolver_with(
        directory,
        vec![policy(
            "projects/project-1",
            vec![
                binding("roles/group", &["group:ENG@example.com"], JIT_CONDITION),
                binding("roles/other", &["group:ops@example.com"], JIT_CONDITION),
            ],
        )],
    );

    let set = r
        .find_entitlements(&user("Alice@Example.com"), &project(), &[ActivationType::Jit])
        .await
        .unwrap();

    let roles: Vec<_> = set.available.iter().map(|e| e.resource_role.role.to_string()).collect();
    assert_eq!(roles, vec!["roles/group"]);
}

#[tokio::test]
async fn activation_ending_now_is_current() {
    let now = ts("2026-03-01T12:00:00Z");
    let ending_now = window("2026-03-01T11:00:00Z", "2026-03-01T12:00:00Z");
    let ended = window("2026-03-01T10:00:00Z", "2026-03-01T11:59:59Z");
    let r = resolver_with(
        MockDirectory::new(),
        vec![policy(
            "projects/project-1",
            vec![
                binding("roles/a", &["user:alice@example.com"], activation_condition(&ending_now).as_str()),
                binding("roles/b", &["user:alice@example.com"], activation_condition(&ended).as_str()),
                binding("roles/c", &["user:bob@example.com"], activation_condition(&ending_now).as_str()),
            ],
        )],
    );

    // Activations are reported even when no eligibility type is requested.
    let set = r
        .find_entitlements_at(&user("alice@example.com"), &project(), &[], now)
        .await
        .unwrap();

    assert_eq!(set.current.get(&resource_role("roles/a")), Some(&ending_now));
    assert_eq!(set.expired.get(&resource_role("roles/b")), Some(&ended));
    assert_eq!(set.current.len() + set.expired.len(), 2);
}

#[tokio::test]
async fn reactivated_role_is_only_current() {
    let now = ts("2026-03-01T12:00:00Z");
    let earlier = window("2026-03-01T08:00:00Z", "2026-03-01T09:00:00Z");
    let again = window("2026-03-01T11:00:00Z", "2026-03-01T13:00:00Z");
    let r = resolver_with(
        MockDirectory::new(),
        vec![policy(
            "projects/project-1",
            vec![
                binding("roles/a", &["user:alice@example.com"], activation_condition(&earlier).as_str()),
                binding("roles/a", &["user:alice@example.com"], activation_condition(&again).as_str()),
            ],
        )],
    );

    let set = r
        .find_entitlements_at(&user("alice@example.com"), &project(), &ActivationType::ALL, now)
        .await
        .unwrap();

    assert_eq!(set.current.get(&resource_role("roles/a")), Some(&again));
    assert!(!set.expired.contains_key(&resource_role("roles/a")));
}

#[tokio::test]
async fn bindings_from_ancestors_apply() {
    let r = resolver_with(
        MockDirectory::new(),
        vec![
            policy("projects/project-1", vec![]),
            policy(
                "folders/100",
                vec![binding("roles/inherited", &["user:alice@example.com"], MPA_CONDITION)],
            ),
        ],
    );

    let set = r
        .find_entitlements(&user("alice@example.com"), &project(), &ActivationType::ALL)
        .await
        .unwrap();

    let entitlement = set.find_available(&resource_role("roles/inherited")).unwrap();
    assert_eq!(entitlement.activation_type, ActivationType::Mpa);
    assert_eq!(entitlement.resource_role.resource, project());
}

#[tokio::test]
async fn directory_failure_aborts_resolution() {
    let directory = MockDirectory::new().failing_with(JitError::Io("directory unavailable".into()));
    let r = resolver_with(
        directory,
        vec![policy("projects/project-1", vec![binding("roles/a", &["user:alice@example.com"], JIT_CONDITION)])],
    );

    let err = r
        .find_entitlements(&user("alice@example.com"), &project(), &ActivationType::ALL)
        .await
        .unwrap_err();
    assert_eq!(err, JitError::Io("directory unavailable".into()));
}

#[tokio::test]
async fn holders_tolerate_denied_group() {
    let directory = MockDirectory::new()
        .with_group("eng@example.com", &["bob@example.com", "carol@example.com"])
        .with_external_group("partners@other.com", &["mallory@other.com"]);
    let r = resolver_with(
        directory,
        vec![policy(
            "projects/project-1",
            vec![
                binding(
                    "roles/approver",
                    &["user:alice@example.com", "group:eng@example.com", "group:partners@other.com"],
                    MPA_CONDITION,
                ),
                binding("roles/approver", &["user:dave@example.com"], JIT_CONDITION),
                binding("roles/other", &["user:erin@example.com"], MPA_CONDITION),
            ],
        )],
    );

    let holders = r
        .find_entitlement_holders(&resource_role("roles/approver"), ActivationType::Mpa)
        .await
        .unwrap();

    let emails: Vec<_> = holders.iter().map(|u| u.email().to_string()).collect();
    assert_eq!(emails, vec!["alice@example.com", "bob@example.com", "carol@example.com"]);
}

struct FailingGroupDirectory;

impl jit_catalog::DirectoryClient for FailingGroupDirectory {
    fn list_direct_groups(&self, _user: &UserId) -> Result<Vec<GroupId>, JitError> {
        Ok(Vec::new())
    }

    fn list_direct_members(&self, group: &GroupId) -> Result<Vec<UserId>, JitError> {
        Err(JitError::Io(format!("timeout listing {group}")))
    }
}

#[tokio::test]
async fn holders_propagate_other_group_failures() {
    let store = MockPolicy::new().with_policy(
        &project(),
        policy("projects/project-1", vec![binding("roles/a", &["group:eng@example.com"], JIT_CONDITION)]),
    );
    assert_eq!(store.get_effective_policies("organizations/0", &project()).unwrap().len(), 1);

    let r = EntitlementResolver::new(
        Arc::new(FailingGroupDirectory),
        Arc::new(store),
        ResolverOptions::new("organizations/0"),
    );
    let err = r
        .find_entitlement_holders(&resource_role("roles/a"), ActivationType::Jit)
        .await
        .unwrap_err();
    assert!(matches!(err, JitError::Io(_)));
}
