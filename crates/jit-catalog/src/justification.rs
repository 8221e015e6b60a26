//! Justification checks for activation requests.

use jit_core::{JitError, UserId};
use serde::{Deserialize, Serialize};

/// Decides whether a justification is acceptable.
pub trait JustificationPolicy: Send + Sync {
    /// Accept or reject `justification` given by `user`.
    fn check(&self, justification: &str, user: &UserId) -> Result<(), JitError>;

    /// Text shown to users describing what is expected.
    fn hint(&self) -> &str;
}

/// Requires a justification of some minimum length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumLengthPolicy {
    /// Minimum length after trimming, in characters.
    pub min_length: usize,
    /// Hint shown to users.
    pub hint: String,
}

impl Default for MinimumLengthPolicy {
    fn default() -> Self {
        Self { min_length: 1, hint: "Describe why you need this access".to_string() }
    }
}

impl JustificationPolicy for MinimumLengthPolicy {
    fn check(&self, justification: &str, _user: &UserId) -> Result<(), JitError> {
        if justification.trim().chars().count() < self.min_length {
            return Err(JitError::InvalidArgument(format!("justification too short: {}", self.hint)));
        }
        Ok(())
    }

    fn hint(&self) -> &str {
        &self.hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_justification() {
        let user = UserId::new("alice@example.com").unwrap();
        let policy = MinimumLengthPolicy::default();
        assert!(policy.check("  ", &user).is_err());
        assert!(policy.check("bug 123", &user).is_ok());
    }

    #[test]
    fn error_carries_hint() {
        let user = UserId::new("alice@example.com").unwrap();
        let policy = MinimumLengthPolicy { min_length: 10, hint: "Enter a ticket number".into() };
        let err = policy.check("short", &user).unwrap_err();
        assert!(err.to_string().contains("Enter a ticket number"));
    }
}
