//! # Activation Requests
//!
//! An `ActivationRequest` asks for one or more entitlements to be activated
//! for a time window. JIT requests are self-approved; MPA requests name the
//! reviewers who may approve them.
//!
//! ## Invariants
//!
//! Checked at construction and again when a request is deserialized:
//!
//! - at least one entitlement;
//! - `start_time <= end_time`;
//! - JIT requests have no reviewers, MPA requests at least one;
//! - the requesting user is never a reviewer.
//!
//! Requests are immutable. The outcome of a request is tracked separately
//! by [`crate::decision::RequestDecision`].
//!
//! ## Limits
//!
//! [`RequestFactory`] layers deployment limits on top of the invariants:
//! a justification policy, a maximum number of reviewers and bounds on the
//! window length.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use jit_core::{JitError, RequestId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

use crate::entitlement::{Activation, ActivationType, EligibleEntitlement, ResourceRole};
use crate::justification::JustificationPolicy;

/// A request to activate entitlements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RequestData", into = "RequestData")]
pub struct ActivationRequest {
    id: RequestId,
    activation_type: ActivationType,
    requesting_user: UserId,
    entitlements: BTreeSet<ResourceRole>,
    reviewers: BTreeSet<UserId>,
    justification: String,
    window: Activation,
}

#[derive(Serialize, Deserialize)]
struct RequestData {
    id: RequestId,
    activation_type: ActivationType,
    requesting_user: UserId,
    entitlements: BTreeSet<ResourceRole>,
    #[serde(default)]
    reviewers: BTreeSet<UserId>,
    justification: String,
    start_time: Timestamp,
    end_time: Timestamp,
}

impl TryFrom<RequestData> for ActivationRequest {
    type Error = JitError;

    fn try_from(data: RequestData) -> Result<Self, Self::Error> {
        let request = Self {
            id: data.id,
            activation_type: data.activation_type,
            requesting_user: data.requesting_user,
            entitlements: data.entitlements,
            reviewers: data.reviewers,
            justification: data.justification,
            window: Activation::new(data.start_time, data.end_time)?,
        };
        request.validate()?;
        Ok(request)
    }
}

impl From<ActivationRequest> for RequestData {
    fn from(r: ActivationRequest) -> Self {
        Self {
            id: r.id,
            activation_type: r.activation_type,
            requesting_user: r.requesting_user,
            entitlements: r.entitlements,
            reviewers: r.reviewers,
            justification: r.justification,
            start_time: r.window.start_time(),
            end_time: r.window.end_time(),
        }
    }
}

impl ActivationRequest {
    /// Create a self-approved request.
    pub fn jit(
        user: UserId,
        entitlements: impl IntoIterator<Item = ResourceRole>,
        justification: impl Into<String>,
        window: Activation,
    ) -> Result<Self, JitError> {
        let request = Self {
            id: RequestId::new(),
            activation_type: ActivationType::Jit,
            requesting_user: user,
            entitlements: entitlements.into_iter().collect(),
            reviewers: BTreeSet::new(),
            justification: justification.into(),
            window,
        };
        request.validate()?;
        Ok(request)
    }

    /// Create a request that needs approval by one of `reviewers`.
    pub fn mpa(
        user: UserId,
        entitlements: impl IntoIterator<Item = ResourceRole>,
        reviewers: impl IntoIterator<Item = UserId>,
        justification: impl Into<String>,
        window: Activation,
    ) -> Result<Self, JitError> {
        let request = Self {
            id: RequestId::new(),
            activation_type: ActivationType::Mpa,
            requesting_user: user,
            entitlements: entitlements.into_iter().collect(),
            reviewers: reviewers.into_iter().collect(),
            justification: justification.into(),
            window,
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<(), JitError> {
        if self.entitlements.is_empty() {
            return Err(JitError::InvalidArgument("a request must contain at least one entitlement".into()));
        }
        match self.activation_type {
            ActivationType::Jit if !self.reviewers.is_empty() => {
                return Err(JitError::InvalidArgument("a JIT request must not have reviewers".into()));
            }
            ActivationType::Mpa if self.reviewers.is_empty() => {
                return Err(JitError::InvalidArgument("an MPA request requires at least one reviewer".into()));
            }
            _ => {}
        }
        if self.reviewers.contains(&self.requesting_user) {
            return Err(JitError::InvalidArgument(format!(
                "{} cannot review their own request",
                self.requesting_user
            )));
        }
        Ok(())
    }

    /// Unique id of this request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// How the request is activated.
    pub fn activation_type(&self) -> ActivationType {
        self.activation_type
    }

    /// The user asking for access.
    pub fn requesting_user(&self) -> &UserId {
        &self.requesting_user
    }

    /// Requested resource roles.
    pub fn entitlements(&self) -> &BTreeSet<ResourceRole> {
        &self.entitlements
    }

    /// Users allowed to approve the request. Empty for JIT requests.
    pub fn reviewers(&self) -> &BTreeSet<UserId> {
        &self.reviewers
    }

    /// Why access is needed.
    pub fn justification(&self) -> &str {
        &self.justification
    }

    /// Requested activation window.
    pub fn window(&self) -> Activation {
        self.window
    }

    /// Start of the requested window.
    pub fn start_time(&self) -> Timestamp {
        self.window.start_time()
    }

    /// End of the requested window.
    pub fn end_time(&self) -> Timestamp {
        self.window.end_time()
    }

    /// Whether `user` is the requester or one of the reviewers.
    pub fn is_involved(&self, user: &UserId) -> bool {
        &self.requesting_user == user || self.reviewers.contains(user)
    }
}

/// Limits applied when building requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Maximum number of reviewers an MPA request may name.
    pub max_reviewers: usize,
    /// Shortest allowed window.
    pub min_duration: Duration,
    /// Longest allowed window.
    pub max_duration: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            max_reviewers: 10,
            min_duration: Duration::minutes(5),
            max_duration: Duration::hours(2),
        }
    }
}

/// Builds requests subject to deployment limits.
#[derive(Clone)]
pub struct RequestFactory {
    justification: Arc<dyn JustificationPolicy>,
    options: RequestOptions,
}

impl RequestFactory {
    /// Create a factory.
    pub fn new(justification: Arc<dyn JustificationPolicy>, options: RequestOptions) -> Self {
        Self { justification, options }
    }

    /// The limits applied by this factory.
    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    fn window(&self, start: Timestamp, duration: Duration) -> Result<Activation, JitError> {
        if duration < self.options.min_duration || duration > self.options.max_duration {
            return Err(JitError::InvalidArgument(format!(
                "duration must be between {} and {} minutes, got {}",
                self.options.min_duration.num_minutes(),
                self.options.max_duration.num_minutes(),
                duration.num_minutes(),
            )));
        }
        Activation::new(start, start.checked_add(duration)?)
    }

    fn resource_roles(
        entitlements: &[EligibleEntitlement],
        activation_type: ActivationType,
    ) -> Result<Vec<ResourceRole>, JitError> {
        if entitlements.is_empty() {
            return Err(JitError::InvalidArgument("no entitlements requested".into()));
        }
        entitlements
            .iter()
            .map(|e| {
                if e.activation_type == activation_type {
                    Ok(e.resource_role.clone())
                } else {
                    Err(JitError::InvalidArgument(format!(
                        "{} requires {} activation, not {activation_type}",
                        e.resource_role, e.activation_type
                    )))
                }
            })
            .collect()
    }

    /// Build a JIT request for `duration` starting at `start`.
    pub fn create_jit_request(
        &self,
        user: &UserId,
        entitlements: &[EligibleEntitlement],
        justification: &str,
        start: Timestamp,
        duration: Duration,
    ) -> Result<ActivationRequest, JitError> {
        self.justification.check(justification, user)?;
        let roles = Self::resource_roles(entitlements, ActivationType::Jit)?;
        ActivationRequest::jit(user.clone(), roles, justification, self.window(start, duration)?)
    }

    /// Build an MPA request for `duration` starting at `start`.
    pub fn create_mpa_request(
        &self,
        user: &UserId,
        entitlements: &[EligibleEntitlement],
        reviewers: &BTreeSet<UserId>,
        justification: &str,
        start: Timestamp,
        duration: Duration,
    ) -> Result<ActivationRequest, JitError> {
        self.justification.check(justification, user)?;
        if reviewers.len() > self.options.max_reviewers {
            return Err(JitError::InvalidArgument(format!(
                "at most {} reviewers may be named, got {}",
                self.options.max_reviewers,
                reviewers.len()
            )));
        }
        let roles = Self::resource_roles(entitlements, ActivationType::Mpa)?;
        ActivationRequest::mpa(
            user.clone(),
            roles,
            reviewers.iter().cloned(),
            justification,
            self.window(start, duration)?,
        )
    }
}
