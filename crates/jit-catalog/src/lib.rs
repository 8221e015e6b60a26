//! # jit-catalog: Entitlement Discovery and Activation Requests
//!
//! Finds what a user may activate by reading conditional role bindings from
//! a resource's effective policy, and models the requests that activate
//! those entitlements.
//!
//! ## Flow
//!
//! ```text
//! DirectoryClient ─▶ PrincipalResolver ─┐
//!                                       ├─▶ applicable bindings ─▶ EntitlementClassifier ─▶ EntitlementSet
//! PolicyClient ─────────────────────────┘
//!
//! EntitlementSet ─▶ RequestFactory ─▶ ActivationRequest ─▶ TokenSigner ─▶ token
//!                                                                           │
//!                          reviewer ◀── introspect / RequestDecision ◀──────┘
//! ```
//!
//! ## Crate Policy
//!
//! - Collaborators are reached only through [`clients::DirectoryClient`]
//!   and [`clients::PolicyClient`]; nothing in this crate performs I/O
//!   itself.
//! - No caching: every resolution reads the policy afresh.
//! - No `unsafe` code, no `.unwrap()` outside tests.

pub mod binding;
pub mod clients;
pub mod decision;
pub mod entitlement;
pub mod introspect;
pub mod justification;
pub mod marker;
pub mod principal;
pub mod request;
pub mod resolver;
pub mod token;

pub use binding::{Binding, PolicyBindingSet};
pub use clients::{DirectoryClient, MockDirectory, MockPolicy, PolicyClient};
pub use decision::{RequestDecision, RequestStatus};
pub use entitlement::{Activation, ActivationType, EligibleEntitlement, EntitlementSet, ResourceRole};
pub use introspect::{introspect, introspect_token, Introspection, ItemStatus};
pub use justification::{JustificationPolicy, MinimumLengthPolicy};
pub use marker::{EligibilityMarkers, EntitlementClassifier};
pub use principal::{PrincipalResolver, PrincipalSet};
pub use request::{ActivationRequest, RequestFactory, RequestOptions};
pub use resolver::{EntitlementResolver, ResolverOptions};
pub use token::{Ed25519TokenSigner, TokenError, TokenOptions, TokenSigner};
