//! Request lifecycle: discover, request, sign, introspect, decide.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use jit_catalog::marker::MPA_CONDITION;
use jit_catalog::{
    introspect, introspect_token, ActivationRequest, ActivationType, Binding, Ed25519TokenSigner,
    EntitlementResolver, ItemStatus, MinimumLengthPolicy, MockDirectory, MockPolicy, PolicyBindingSet,
    RequestDecision, RequestFactory, RequestOptions, RequestStatus, ResolverOptions, TokenOptions, TokenSigner,
};
use jit_core::{ConditionExpression, JitError, ResourceId, Role, Timestamp, UserId};
use jit_crypto::Ed25519KeyPair;

fn user(email: &str) -> UserId {
    UserId::new(email).unwrap()
}

fn project() -> ResourceId {
    ResourceId::new("project-1").unwrap()
}

fn resolver() -> EntitlementResolver {
    let binding = Binding::new(
        Role::new("roles/mock").unwrap(),
        ["user:user-1@example.com".to_string(), "user:user-2@example.com".to_string()],
    )
    .with_condition(ConditionExpression::new(MPA_CONDITION));
    let store = MockPolicy::new().with_policy(
        &project(),
        PolicyBindingSet { attached_resource: "projects/project-1".into(), bindings: vec![binding] },
    );
    EntitlementResolver::new(Arc::new(MockDirectory::new()), Arc::new(store), ResolverOptions::new("organizations/0"))
}

fn factory() -> RequestFactory {
    RequestFactory::new(
        Arc::new(MinimumLengthPolicy::default()),
        RequestOptions { max_reviewers: 1, ..Default::default() },
    )
}

async fn mpa_request(start: Timestamp) -> ActivationRequest {
    let requester = user("user-1@example.com");
    let set = resolver()
        .find_entitlements(&requester, &project(), &ActivationType::ALL)
        .await
        .unwrap();
    let entitlements: Vec<_> = set.available.iter().cloned().collect();

    let holders = resolver()
        .find_entitlement_holders(&entitlements[0].resource_role, ActivationType::Mpa)
        .await
        .unwrap();
    let reviewers: BTreeSet<_> = holders.into_iter().filter(|u| u != &requester).collect();

    factory()
        .create_mpa_request(&requester, &entitlements, &reviewers, "a justification", start, Duration::minutes(10))
        .unwrap()
}

#[tokio::test]
async fn reviewer_introspects_and_approves_signed_request() {
    let now = Timestamp::now();
    let request = mpa_request(now).await;
    assert_eq!(request.reviewers().iter().collect::<Vec<_>>(), vec![&user("user-2@example.com")]);

    let signer = Ed25519TokenSigner::new(Ed25519KeyPair::generate(), TokenOptions::default());
    let token = signer.sign(&request).unwrap();

    let view = introspect_token(&signer, &token, &user("user-1@example.com"), now).unwrap();
    assert!(view.is_beneficiary);
    assert!(!view.is_reviewer);
    assert_eq!(view.justification, "a justification");
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].request_id, request.id());
    assert_eq!(view.items[0].resource, project());
    assert_eq!(view.items[0].status, ItemStatus::PendingApproval);
    assert_eq!(view.items[0].start_time, request.start_time());
    assert_eq!(view.items[0].end_time, request.end_time());

    let verified = signer.verify(&token).unwrap();
    let mut decision = RequestDecision::pending(verified).unwrap();
    decision.approve(&user("user-2@example.com"), now).unwrap();
    assert_eq!(decision.status(), RequestStatus::Approved);
    assert!(decision.activation_condition().is_ok());
}

#[tokio::test]
async fn uninvolved_caller_is_denied() {
    let now = Timestamp::now();
    let request = mpa_request(now).await;

    let err = introspect(&request, &user("other-party@example.com"), now).unwrap_err();
    assert!(matches!(err, JitError::AccessDenied(_)));
    assert!(err.is_authorization_failure());
}

#[test]
fn invalid_token_is_an_authorization_failure() {
    let signer = Ed25519TokenSigner::new(Ed25519KeyPair::generate(), TokenOptions::default());
    let err = introspect_token(&signer, "eySAMPLE", &user("user-1@example.com"), Timestamp::now()).unwrap_err();
    assert!(matches!(err, JitError::InvalidToken(_)));
    assert!(err.is_authorization_failure());
}

#[test]
fn token_from_another_signer_is_rejected() {
    let a = Ed25519TokenSigner::new(Ed25519KeyPair::generate(), TokenOptions::default());
    let b = Ed25519TokenSigner::new(Ed25519KeyPair::generate(), TokenOptions::default());
    let start = Timestamp::now();
    let request = ActivationRequest::jit(
        user("user-1@example.com"),
        [jit_catalog::ResourceRole::new(project(), Role::new("roles/mock").unwrap())],
        "bug",
        jit_catalog::Activation::new(start, start.checked_add(Duration::minutes(5)).unwrap()).unwrap(),
    )
    .unwrap();

    let token = a.sign(&request).unwrap();
    assert!(matches!(b.verify(&token), Err(JitError::InvalidToken(_))));
}
