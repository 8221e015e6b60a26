//! # Request Decisions
//!
//! Tracks the outcome of an activation request.
//!
//! ```text
//! Pending ──▶ Approved (terminal)
//!    │
//!    ├──▶ Denied   (terminal)
//!    │
//!    └──▶ Expired  (terminal)
//! ```
//!
//! JIT requests start out approved. An MPA request is approved or denied
//! by one of its reviewers, or expires once its window has ended without
//! a decision. Applying an approved request to the policy is left to the
//! caller: [`RequestDecision::activation_condition`] yields the condition
//! for the temporary bindings.

use serde::{Deserialize, Serialize};

use jit_core::{ConditionExpression, JitError, RequestId, Timestamp, UserId};

use crate::entitlement::ActivationType;
use crate::marker;
use crate::request::ActivationRequest;

/// Status of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting a reviewer.
    Pending,
    /// Approved (terminal).
    Approved,
    /// Denied by a reviewer (terminal).
    Denied,
    /// Window ended without a decision (terminal).
    Expired,
}

impl RequestStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Denied => "DENIED",
            Self::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Record of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// Status before the change.
    pub from: RequestStatus,
    /// Status after the change.
    pub to: RequestStatus,
    /// Who made the change; `None` for expiry.
    pub actor: Option<UserId>,
    /// When the change was made.
    pub at: Timestamp,
    /// Reason given, if any.
    pub reason: Option<String>,
}

/// The outcome of one activation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDecision {
    request: ActivationRequest,
    status: RequestStatus,
    history: Vec<DecisionRecord>,
}

impl RequestDecision {
    /// Start tracking an MPA request.
    pub fn pending(request: ActivationRequest) -> Result<Self, JitError> {
        if request.activation_type() != ActivationType::Mpa {
            return Err(JitError::InvalidArgument(
                "only MPA requests await approval".into(),
            ));
        }
        Ok(Self { request, status: RequestStatus::Pending, history: Vec::new() })
    }

    /// Record a JIT request, which its requester approves by making it.
    pub fn self_approved(request: ActivationRequest, now: Timestamp) -> Result<Self, JitError> {
        if request.activation_type() != ActivationType::Jit {
            return Err(JitError::InvalidArgument(
                "only JIT requests are self-approved".into(),
            ));
        }
        let actor = request.requesting_user().clone();
        let mut decision = Self { request, status: RequestStatus::Pending, history: Vec::new() };
        decision.transition(RequestStatus::Approved, Some(actor), now, None);
        Ok(decision)
    }

    /// The request being decided.
    pub fn request(&self) -> &ActivationRequest {
        &self.request
    }

    /// Id of the request being decided.
    pub fn request_id(&self) -> RequestId {
        self.request.id()
    }

    /// Current status.
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Status changes so far, oldest first.
    pub fn history(&self) -> &[DecisionRecord] {
        &self.history
    }

    fn require_pending(&self, to: RequestStatus) -> Result<(), JitError> {
        if self.status.is_terminal() {
            return Err(JitError::InvalidArgument(format!(
                "request {} is {} and cannot become {to}",
                self.request.id(),
                self.status
            )));
        }
        Ok(())
    }

    fn require_reviewer(&self, user: &UserId) -> Result<(), JitError> {
        if user == self.request.requesting_user() {
            return Err(JitError::AccessDenied(format!("{user} cannot decide on their own request")));
        }
        if !self.request.reviewers().contains(user) {
            return Err(JitError::AccessDenied(format!(
                "{user} is not a reviewer of request {}",
                self.request.id()
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: RequestStatus, actor: Option<UserId>, at: Timestamp, reason: Option<String>) {
        self.history.push(DecisionRecord { from: self.status, to, actor, at, reason });
        self.status = to;
    }

    /// Approve (PENDING → APPROVED). Fails once the window has ended.
    pub fn approve(&mut self, approver: &UserId, now: Timestamp) -> Result<(), JitError> {
        self.require_pending(RequestStatus::Approved)?;
        self.require_reviewer(approver)?;
        if now > self.request.end_time() {
            return Err(JitError::InvalidArgument(format!(
                "request {} ended at {}",
                self.request.id(),
                self.request.end_time()
            )));
        }
        self.transition(RequestStatus::Approved, Some(approver.clone()), now, None);
        Ok(())
    }

    /// Deny (PENDING → DENIED).
    pub fn deny(&mut self, reviewer: &UserId, reason: impl Into<String>, now: Timestamp) -> Result<(), JitError> {
        self.require_pending(RequestStatus::Denied)?;
        self.require_reviewer(reviewer)?;
        self.transition(RequestStatus::Denied, Some(reviewer.clone()), now, Some(reason.into()));
        Ok(())
    }

    /// Expire (PENDING → EXPIRED) if the window has ended by `now`.
    ///
    /// Returns whether the request expired.
    pub fn expire(&mut self, now: Timestamp) -> Result<bool, JitError> {
        self.require_pending(RequestStatus::Expired)?;
        if now <= self.request.end_time() {
            return Ok(false);
        }
        self.transition(RequestStatus::Expired, None, now, None);
        Ok(true)
    }

    /// Condition for the temporary bindings of an approved request.
    pub fn activation_condition(&self) -> Result<ConditionExpression, JitError> {
        if self.status != RequestStatus::Approved {
            return Err(JitError::InvalidArgument(format!(
                "request {} is {}, not APPROVED",
                self.request.id(),
                self.status
            )));
        }
        Ok(marker::activation_condition(&self.request.window()))
    }
}
