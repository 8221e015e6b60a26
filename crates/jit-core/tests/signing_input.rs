//! # Signing Input Stability
//!
//! Token signatures are computed over `CanonicalBytes`, so the rendering of
//! the identifier and time types that appear in a request must not depend on
//! construction order or input casing. These vectors pin the exact bytes.

use std::collections::BTreeMap;

use jit_core::{CanonicalBytes, ConditionExpression, ResourceId, Role, Timestamp, UserId};
use serde_json::json;

fn canonical(value: &impl serde::Serialize) -> String {
    let bytes = CanonicalBytes::new(value).unwrap();
    String::from_utf8(bytes.as_bytes().to_vec()).unwrap()
}

#[test]
fn keys_are_sorted_regardless_of_insertion_order() {
    let a = json!({"request": {"user": "a@example.com"}, "iss": "jit-access", "exp": 2, "iat": 1});
    let mut b = serde_json::Map::new();
    b.insert("iat".into(), json!(1));
    b.insert("exp".into(), json!(2));
    b.insert("iss".into(), json!("jit-access"));
    b.insert("request".into(), json!({"user": "a@example.com"}));

    assert_eq!(canonical(&a), canonical(&b));
    assert_eq!(canonical(&a), r#"{"exp":2,"iat":1,"iss":"jit-access","request":{"user":"a@example.com"}}"#);
}

#[test]
fn identifiers_render_normalized() {
    let mut claims = BTreeMap::new();
    claims.insert("user", canonical(&UserId::new(" Alice@Example.COM ").unwrap()));
    claims.insert("resource", canonical(&ResourceId::new("project-1").unwrap()));
    claims.insert("role", canonical(&Role::new("roles/compute.viewer").unwrap()));

    assert_eq!(claims["user"], r#""alice@example.com""#);
    assert_eq!(claims["resource"], r#""project-1""#);
    assert_eq!(claims["role"], r#""roles/compute.viewer""#);
}

#[test]
fn timestamps_render_at_seconds_precision() {
    let ts = Timestamp::parse_lenient("2030-01-01T10:00:00.750+00:00").unwrap();
    assert_eq!(ts, Timestamp::parse("2030-01-01T10:00:00Z").unwrap());
    let exact = Timestamp::parse("2030-01-01T10:00:00Z").unwrap();
    assert_eq!(canonical(&json!({ "at": ts })), canonical(&json!({ "at": exact })));
}

#[test]
fn conditions_render_verbatim() {
    let condition = ConditionExpression::new("has({}.jitAccessConstraint)");
    assert_eq!(canonical(&condition), r#""has({}.jitAccessConstraint)""#);
}

#[test]
fn floats_never_reach_a_signature() {
    assert!(CanonicalBytes::new(&json!({"lifetime": 1.5})).is_err());
    assert!(CanonicalBytes::new(&json!({"lifetime": 90})).is_ok());
}
