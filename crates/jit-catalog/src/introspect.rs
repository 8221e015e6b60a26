//! # Request Introspection
//!
//! Describes a verified request to one of the users involved in it. Only
//! the requester and the request's reviewers may introspect a request;
//! anyone else, and anyone presenting an invalid token, gets an
//! authorization failure.

use serde::{Deserialize, Serialize};

use jit_core::{JitError, RequestId, ResourceId, Role, Timestamp, UserId};

use crate::entitlement::ActivationType;
use crate::request::ActivationRequest;
use crate::token::TokenSigner;

/// Status of one requested entitlement, derived from the request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    /// The window has not started.
    NotYetStarted,
    /// The window is open.
    Active,
    /// The window has ended.
    Expired,
    /// Awaiting a reviewer.
    PendingApproval,
}

impl ItemStatus {
    /// Status of `request` at `now`.
    ///
    /// MPA requests are pending until their window ends; approval is not
    /// visible from the request alone.
    pub fn of(request: &ActivationRequest, now: Timestamp) -> Self {
        if now > request.end_time() {
            return Self::Expired;
        }
        match request.activation_type() {
            ActivationType::Mpa => Self::PendingApproval,
            ActivationType::Jit if now < request.start_time() => Self::NotYetStarted,
            ActivationType::Jit => Self::Active,
        }
    }
}

/// One requested entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntrospectionItem {
    /// Request the item belongs to.
    pub request_id: RequestId,
    /// Resource.
    pub resource: ResourceId,
    /// Role.
    pub role: Role,
    /// Status at introspection time.
    pub status: ItemStatus,
    /// Window start.
    pub start_time: Timestamp,
    /// Window end.
    pub end_time: Timestamp,
}

/// A request as seen by one involved user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Introspection {
    /// Who asked for access.
    pub beneficiary: UserId,
    /// Who may approve.
    pub reviewers: Vec<UserId>,
    /// Whether the caller is the beneficiary.
    pub is_beneficiary: bool,
    /// Whether the caller is a reviewer.
    pub is_reviewer: bool,
    /// Justification given by the beneficiary.
    pub justification: String,
    /// One item per requested entitlement.
    pub items: Vec<IntrospectionItem>,
}

/// Describe `request` to `caller`.
pub fn introspect(request: &ActivationRequest, caller: &UserId, now: Timestamp) -> Result<Introspection, JitError> {
    if !request.is_involved(caller) {
        return Err(JitError::AccessDenied(format!(
            "{caller} is not involved in request {}",
            request.id()
        )));
    }

    let status = ItemStatus::of(request, now);
    let items = request
        .entitlements()
        .iter()
        .map(|resource_role| IntrospectionItem {
            request_id: request.id(),
            resource: resource_role.resource.clone(),
            role: resource_role.role.clone(),
            status,
            start_time: request.start_time(),
            end_time: request.end_time(),
        })
        .collect();

    Ok(Introspection {
        beneficiary: request.requesting_user().clone(),
        reviewers: request.reviewers().iter().cloned().collect(),
        is_beneficiary: request.requesting_user() == caller,
        is_reviewer: request.reviewers().contains(caller),
        justification: request.justification().to_string(),
        items,
    })
}

/// Verify `token` and describe the request it carries to `caller`, both as
/// of `now`.
pub fn introspect_token(
    signer: &dyn TokenSigner,
    token: &str,
    caller: &UserId,
    now: Timestamp,
) -> Result<Introspection, JitError> {
    let request = signer.verify_at(token, now)?;
    introspect(&request, caller, now)
}
