//! # Condition Expressions
//!
//! `ConditionExpression` wraps the boolean CEL text attached to a
//! conditional role binding. Eligibility and activation markers are
//! recognised by inspecting this text, so the type must support being taken
//! apart and put back together without disturbing clauses it does not
//! understand.
//!
//! Values are immutable; every operation returns a new instance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cel;
use crate::error::JitError;
use crate::temporal::Timestamp;

/// A CEL condition, compared by exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionExpression(String);

impl ConditionExpression {
    /// Wrap condition text as-is.
    pub fn new(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// The wrapped text, unchanged.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse and check the condition without evaluating it.
    pub fn compile(&self) -> Result<cel::Expression, JitError> {
        cel::engine().compile(&self.0)
    }

    /// Evaluate with `request.time` bound to the current instant.
    pub fn evaluate(&self) -> Result<bool, JitError> {
        self.evaluate_at(Timestamp::now())
    }

    /// Evaluate with `request.time` bound to `time`.
    ///
    /// Fails with `InvalidExpression` on syntax errors, unknown symbols, or
    /// a non-boolean result.
    pub fn evaluate_at(&self, time: Timestamp) -> Result<bool, JitError> {
        cel::engine().evaluate(&self.0, time)
    }

    /// Render the condition in canonical form.
    ///
    /// Best-effort: a condition that does not compile is returned unchanged.
    pub fn reformat(&self) -> ConditionExpression {
        match self.compile() {
            Ok(ast) => Self(cel::engine().unparse(&ast)),
            Err(_) => self.clone(),
        }
    }

    /// Split the condition into its top-level `&&` clauses.
    ///
    /// Works on the raw text rather than the parsed tree so that each
    /// clause keeps its exact original formatting. `&&` inside parentheses
    /// or inside quoted strings is not a boundary.
    pub fn split_and(&self) -> Vec<ConditionExpression> {
        let mut clauses = Vec::new();
        let mut current = String::new();
        let mut state = SplitState::default();

        let mut chars = self.0.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '&' && state.at_top_level() && chars.peek() == Some(&'&') {
                chars.next();
                clauses.push(Self(std::mem::take(&mut current)));
                continue;
            }
            state.advance(c);
            current.push(c);
        }

        if !current.is_empty() {
            clauses.push(Self(current));
        }
        clauses
    }

    /// Combine clauses with `&&`, parenthesizing each one.
    pub fn and(clauses: &[ConditionExpression]) -> Result<ConditionExpression, JitError> {
        if clauses.is_empty() {
            return Err(JitError::InvalidArgument(
                "at least one clause is required".into(),
            ));
        }
        let joined = clauses
            .iter()
            .map(|c| format!("({})", c.0))
            .collect::<Vec<_>>()
            .join(" && ");
        Ok(Self(joined))
    }
}

impl fmt::Display for ConditionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConditionExpression {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Scanner state for [`ConditionExpression::split_and`].
#[derive(Debug, Default)]
struct SplitState {
    depth: i32,
    single_quotes: usize,
    double_quotes: usize,
}

impl SplitState {
    fn at_top_level(&self) -> bool {
        self.depth == 0 && self.single_quotes % 2 == 0 && self.double_quotes % 2 == 0
    }

    fn advance(&mut self, c: char) {
        match c {
            '(' => self.depth += 1,
            ')' => self.depth -= 1,
            '\'' => self.single_quotes += 1,
            '"' => self.double_quotes += 1,
            _ => {}
        }
    }
}
