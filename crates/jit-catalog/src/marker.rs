//! # Eligibility Markers
//!
//! Eligible and activated roles are stored in a resource's policy as
//! conditional bindings whose condition carries a recognizable marker.
//! A marker is a pure function from a binding to an optional tagged
//! result; bindings that do not match (including malformed conditions)
//! are simply not classified.
//!
//! ## Default conventions
//!
//! | kind       | condition                                                                    |
//! |------------|------------------------------------------------------------------------------|
//! | JIT        | `has({}.jitAccessConstraint)`                                                |
//! | MPA        | `has({}.multiPartyApprovalConstraint)`                                       |
//! | activation | `(request.time >= timestamp("START") && request.time < timestamp("END"))`    |
//!
//! The JIT and MPA markers are compared with all whitespace removed and
//! may appear as one top-level `&&` clause of a larger condition. The
//! activation marker is matched on the parsed expression, so spacing and
//! parentheses do not matter and either `<` or `<=` is accepted for the
//! upper bound.

use std::collections::BTreeSet;

use jit_core::cel::{self, Atom, Expression, Member, RelationOp};
use jit_core::{ConditionExpression, ResourceId, Timestamp};

use crate::binding::Binding;
use crate::entitlement::{Activation, ActivationType, EligibleEntitlement, ResourceRole};

/// Condition marking a JIT-eligible binding.
pub const JIT_CONDITION: &str = "has({}.jitAccessConstraint)";

/// Condition marking an MPA-eligible binding.
pub const MPA_CONDITION: &str = "has({}.multiPartyApprovalConstraint)";

/// Recognizes an eligibility marker.
pub type EligibilityMarker = fn(&ResourceId, &Binding) -> Option<ResourceRole>;

/// Recognizes an activation record.
pub type ActivationMarker = fn(&ResourceId, &Binding) -> Option<(ResourceRole, Activation)>;

/// The set of markers in use.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityMarkers {
    /// JIT eligibility.
    pub jit: EligibilityMarker,
    /// MPA eligibility.
    pub mpa: EligibilityMarker,
    /// Activation records.
    pub activation: ActivationMarker,
}

impl Default for EligibilityMarkers {
    fn default() -> Self {
        Self {
            jit: jit_eligible,
            mpa: mpa_eligible,
            activation: activation_record,
        }
    }
}

impl EligibilityMarkers {
    /// The eligibility marker for an activation type.
    pub fn eligibility(&self, activation_type: ActivationType) -> EligibilityMarker {
        match activation_type {
            ActivationType::Jit => self.jit,
            ActivationType::Mpa => self.mpa,
        }
    }
}

// ---------------------------------------------------------------------------
// Default markers
// ---------------------------------------------------------------------------

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Remove parentheses that enclose the whole of `s`.
fn strip_enclosing_parens(mut s: &str) -> &str {
    while s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        let inner = &s[1..s.len() - 1];
        let mut depth = 0i32;
        let balanced = inner.chars().all(|c| {
            match c {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            depth >= 0
        });
        if !balanced || depth != 0 {
            break;
        }
        s = inner;
    }
    s
}

fn has_marker_clause(condition: &ConditionExpression, marker: &str) -> bool {
    condition
        .split_and()
        .iter()
        .any(|clause| strip_enclosing_parens(&strip_whitespace(clause.as_str())) == marker)
}

fn marked(resource: &ResourceId, binding: &Binding, marker: &str) -> Option<ResourceRole> {
    let condition = binding.condition.as_ref()?;
    has_marker_clause(condition, marker).then(|| ResourceRole::new(resource.clone(), binding.role.clone()))
}

/// Default JIT marker.
pub fn jit_eligible(resource: &ResourceId, binding: &Binding) -> Option<ResourceRole> {
    marked(resource, binding, JIT_CONDITION)
}

/// Default MPA marker.
pub fn mpa_eligible(resource: &ResourceId, binding: &Binding) -> Option<ResourceRole> {
    marked(resource, binding, MPA_CONDITION)
}

/// Default activation marker.
pub fn activation_record(resource: &ResourceId, binding: &Binding) -> Option<(ResourceRole, Activation)> {
    let condition = binding.condition.as_ref()?;
    let activation = parse_activation_window(condition)?;
    Some((ResourceRole::new(resource.clone(), binding.role.clone()), activation))
}

/// Render an activation window in the form [`activation_record`] recognizes.
pub fn activation_condition(activation: &Activation) -> ConditionExpression {
    ConditionExpression::new(format!(
        "(request.time >= timestamp(\"{}\") && request.time < timestamp(\"{}\"))",
        activation.start_time().to_iso8601(),
        activation.end_time().to_iso8601(),
    ))
}

fn is_request_time(expr: &Expression) -> bool {
    let Expression::Member(target, member) = expr else {
        return false;
    };
    matches!(target.as_ref(), Expression::Ident(name) if name.as_str() == cel::REQUEST_VARIABLE)
        && matches!(member.as_ref(), Member::Attribute(attr) if attr.as_str() == "time")
}

fn timestamp_literal(expr: &Expression) -> Option<Timestamp> {
    let Expression::FunctionCall(func, None, args) = expr else {
        return None;
    };
    if !matches!(func.as_ref(), Expression::Ident(name) if name.as_str() == "timestamp") {
        return None;
    }
    match args.as_slice() {
        [Expression::Atom(Atom::String(s))] => Timestamp::parse_lenient(s).ok(),
        _ => None,
    }
}

enum Bound {
    Lower(Timestamp),
    Upper(Timestamp),
}

fn bound(expr: &Expression) -> Option<Bound> {
    let Expression::Relation(l, op, r) = expr else {
        return None;
    };
    if !is_request_time(l) {
        return None;
    }
    let t = timestamp_literal(r)?;
    match op {
        RelationOp::GreaterThanEq => Some(Bound::Lower(t)),
        RelationOp::LessThan | RelationOp::LessThanEq => Some(Bound::Upper(t)),
        _ => None,
    }
}

fn parse_activation_window(condition: &ConditionExpression) -> Option<Activation> {
    let Ok(Expression::And(a, b)) = cel::engine().compile(condition.as_str()) else {
        return None;
    };
    let (start, end) = match (bound(&a)?, bound(&b)?) {
        (Bound::Lower(start), Bound::Upper(end)) | (Bound::Upper(end), Bound::Lower(start)) => (start, end),
        _ => return None,
    };
    Activation::new(start, end).ok()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Applies a set of markers to bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitlementClassifier {
    markers: EligibilityMarkers,
}

impl EntitlementClassifier {
    /// Create a classifier using `markers`.
    pub fn new(markers: EligibilityMarkers) -> Self {
        Self { markers }
    }

    /// Entitlements of `activation_type` found among `bindings`.
    pub fn eligible<'a>(
        &self,
        resource: &ResourceId,
        bindings: impl IntoIterator<Item = &'a Binding>,
        activation_type: ActivationType,
    ) -> BTreeSet<EligibleEntitlement> {
        let marker = self.markers.eligibility(activation_type);
        bindings
            .into_iter()
            .filter_map(|binding| marker(resource, binding))
            .map(|resource_role| EligibleEntitlement::new(resource_role, activation_type))
            .collect()
    }

    /// Activation records found among `bindings`, in binding order.
    pub fn activations<'a>(
        &self,
        resource: &ResourceId,
        bindings: impl IntoIterator<Item = &'a Binding>,
    ) -> Vec<(ResourceRole, Activation)> {
        bindings
            .into_iter()
            .filter_map(|binding| (self.markers.activation)(resource, binding))
            .collect()
    }

    /// Whether `binding` makes its members eligible for exactly `target`.
    pub fn grants(&self, target: &ResourceRole, binding: &Binding, activation_type: ActivationType) -> bool {
        binding.role == target.role
            && self.markers.eligibility(activation_type)(&target.resource, binding).as_ref() == Some(target)
    }
}
