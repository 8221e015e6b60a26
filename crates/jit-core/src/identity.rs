//! # Identity Newtypes
//!
//! Newtype wrappers for principals, resources, roles and request ids.
//! These prevent accidental identifier confusion: a `GroupId` cannot be
//! passed where a `UserId` is expected.
//!
//! ## Normalization
//!
//! Email-like identifiers are trimmed and lower-cased at construction, so
//! every comparison in the stack is case-insensitive by construction.
//! Policy bindings reference principals in *member form*, `user:<email>`
//! or `group:<email>`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JitError;

/// Member-form prefix for user principals.
pub const USER_PREFIX: &str = "user:";

/// Member-form prefix for group principals.
pub const GROUP_PREFIX: &str = "group:";

/// A user, identified by their lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

/// A directory group, identified by its lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

/// Either kind of principal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalId {
    /// A user principal.
    User(UserId),
    /// A group principal.
    Group(GroupId),
}

/// The resource a binding applies to, e.g. a project id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

/// A role name, e.g. `roles/compute.viewer`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

/// Unique identifier of an activation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

fn normalize_email(kind: &str, raw: &str) -> Result<String, JitError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(JitError::InvalidArgument(format!("{kind} email must not be empty")));
    }
    if !email.contains('@') {
        return Err(JitError::InvalidArgument(format!(
            "{kind} email must contain '@', got {raw:?}"
        )));
    }
    Ok(email)
}

fn non_empty(kind: &str, raw: &str) -> Result<String, JitError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(JitError::InvalidArgument(format!("{kind} must not be empty")));
    }
    Ok(value.to_string())
}

impl UserId {
    /// Create a user id, normalizing the email to lower case.
    pub fn new(email: &str) -> Result<Self, JitError> {
        normalize_email("user", email).map(Self)
    }

    /// The lower-cased email address.
    pub fn email(&self) -> &str {
        &self.0
    }

    /// Render in binding-member form (`user:<email>`).
    pub fn to_member(&self) -> String {
        format!("{USER_PREFIX}{}", self.0)
    }
}

impl GroupId {
    /// Create a group id, normalizing the email to lower case.
    pub fn new(email: &str) -> Result<Self, JitError> {
        normalize_email("group", email).map(Self)
    }

    /// The lower-cased email address.
    pub fn email(&self) -> &str {
        &self.0
    }

    /// Render in binding-member form (`group:<email>`).
    pub fn to_member(&self) -> String {
        format!("{GROUP_PREFIX}{}", self.0)
    }
}

impl PrincipalId {
    /// Parse a binding member string.
    ///
    /// Returns `None` for member kinds other than users and groups
    /// (service accounts, domains, `allUsers`, ...) and for malformed
    /// emails, since those can never match a resolved principal.
    pub fn from_member(member: &str) -> Option<Self> {
        let member = member.trim();
        let lower = member.to_lowercase();
        if let Some(email) = lower.strip_prefix(USER_PREFIX) {
            UserId::new(email).ok().map(Self::User)
        } else if let Some(email) = lower.strip_prefix(GROUP_PREFIX) {
            GroupId::new(email).ok().map(Self::Group)
        } else {
            None
        }
    }

    /// Render in binding-member form.
    pub fn to_member(&self) -> String {
        match self {
            Self::User(u) => u.to_member(),
            Self::Group(g) => g.to_member(),
        }
    }
}

impl ResourceId {
    /// Create a resource id.
    pub fn new(id: &str) -> Result<Self, JitError> {
        non_empty("resource id", id).map(Self)
    }

    /// Access the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Role {
    /// Create a role name.
    pub fn new(name: &str) -> Result<Self, JitError> {
        non_empty("role", name).map(Self)
    }

    /// Access the role name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RequestId {
    /// Generate a new random request identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! string_newtype_conversions {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = JitError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $ty {
            type Err = JitError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_newtype_conversions!(UserId);
string_newtype_conversions!(GroupId);
string_newtype_conversions!(ResourceId);
string_newtype_conversions!(Role);

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_member())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
