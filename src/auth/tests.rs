//! Tests for the auth module

use super::*;
use crate::error::Error;
use std::collections::BTreeMap;
use test_case::test_case;

// ============================================================================
// Gate Tests
// ============================================================================

#[test]
fn test_unauthenticated_is_denied() {
    let decision = check::<&str>(false, &[], Some("admin"));
    assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
}

#[test]
fn test_unauthenticated_is_denied_without_required_role() {
    let decision = check::<&str>(false, &[], None);
    assert_eq!(decision, Decision::Deny(DenyReason::Unauthenticated));
}

#[test]
fn test_required_role_present_is_allowed() {
    let decision = check(true, &["admin", "viewer"], Some("admin"));
    assert_eq!(decision, Decision::Allow);
}

#[test]
fn test_required_role_missing_is_denied() {
    let decision = check(true, &["viewer"], Some("admin"));
    assert_eq!(decision, Decision::Deny(DenyReason::InsufficientRole));
}

#[test_case(&[], None, true ; "no role required, no roles")]
#[test_case(&[], Some(""), true ; "empty required role is unset")]
#[test_case(&[], Some("   "), true ; "blank required role is unset")]
#[test_case(&[], Some("admin"), false ; "empty roles with required role")]
#[test_case(&["Admin"], Some("admin"), false ; "comparison is case sensitive")]
#[test_case(&[" admin"], Some("admin"), false ; "no whitespace normalization")]
#[test_case(&["viewer", "admin"], Some("admin"), true ; "role anywhere in list")]
#[test_case(&["editor"], None, true ; "roles ignored when not gated")]
fn test_check_grid(roles: &[&str], required: Option<&str>, allowed: bool) {
    assert_eq!(check(true, roles, required).is_allowed(), allowed);
    // Without a token nothing is ever allowed
    assert!(!check(false, roles, required).is_allowed());
}

#[test]
fn test_gate_enforce_returns_halting_error() {
    let gate = AuthGate::with_role("admin");
    let identity = SessionIdentity::new("user@example.com", vec!["viewer".to_string()]);

    let err = gate.enforce(&identity).unwrap_err();
    assert!(err.halts_app());
    assert!(matches!(
        err,
        Error::AccessDenied {
            reason: DenyReason::InsufficientRole
        }
    ));
}

#[test]
fn test_gate_enforce_allows() {
    let gate = AuthGate::with_role("admin");
    let identity = SessionIdentity::new("user@example.com", vec!["admin".to_string()]);
    assert!(gate.enforce(&identity).is_ok());

    let open = AuthGate::open();
    assert!(open.enforce(&identity).is_ok());
    assert!(open.enforce(&SessionIdentity::anonymous()).is_err());
}

#[test]
fn test_gate_empty_role_is_open() {
    let gate = AuthGate::new(Some(String::new()));
    assert!(gate.required_role().is_none());

    let blank = AuthGate::new(Some("  \t".to_string()));
    assert!(blank.required_role().is_none());
    let viewer = SessionIdentity::new("user@example.com", vec!["viewer".to_string()]);
    assert!(blank.enforce(&viewer).is_ok());

    assert_eq!(AuthGate::with_role(" admin ").required_role(), Some("admin"));
}

#[test]
fn test_deny_reasons_have_distinct_messages() {
    assert_ne!(
        DenyReason::Unauthenticated.user_message(),
        DenyReason::InsufficientRole.user_message()
    );
    assert_eq!(
        DenyReason::InsufficientRole.user_message(),
        "You are not authorised to use this app."
    );
    assert_eq!(DenyReason::Unauthenticated.to_string(), "unauthenticated");
}

#[test]
fn test_decision_serialization() {
    let json = serde_json::to_value(Decision::Deny(DenyReason::InsufficientRole)).unwrap();
    assert_eq!(json["decision"], "deny");
    assert_eq!(json["reason"], "insufficient_role");
}

// ============================================================================
// Identity Tests
// ============================================================================

#[test]
fn test_headers_case_insensitive() {
    let headers = RequestHeaders::new().with("x-kbc-user-email", "jane@example.com");
    assert_eq!(headers.user_email(), Some("jane@example.com"));
    assert!(headers.contains(USER_EMAIL_HEADER));
    assert!(headers.is_proxied());
}

#[test]
fn test_identity_from_proxy_headers() {
    let headers: RequestHeaders = [
        (USER_EMAIL_HEADER, "jane@example.com"),
        (USER_ROLES_HEADER, "admin, viewer"),
    ]
    .into_iter()
    .collect();

    let identity = SessionIdentity::from_headers(&headers);
    assert_eq!(identity.token.as_deref(), Some("jane@example.com"));
    assert_eq!(identity.roles, vec!["admin", "viewer"]);
    assert!(identity.has_role("admin"));
    assert!(!identity.has_role("Admin"));
}

#[test]
fn test_identity_without_email_is_anonymous() {
    let headers = RequestHeaders::new().with(USER_ROLES_HEADER, "admin");
    let identity = SessionIdentity::from_headers(&headers);
    assert!(!identity.is_authenticated());
    assert_eq!(identity.roles, vec!["admin"]);
}

#[test]
fn test_identity_blank_email_is_anonymous() {
    let headers = RequestHeaders::new().with(USER_EMAIL_HEADER, "   ");
    assert!(!SessionIdentity::from_headers(&headers).is_authenticated());
}

#[test]
fn test_parse_roles_json_array() {
    assert_eq!(parse_roles(r#"["admin","viewer"]"#), vec!["admin", "viewer"]);
    assert_eq!(parse_roles(""), Vec::<String>::new());
    assert_eq!(parse_roles("a,,b"), vec!["a", "b"]);
    assert_eq!(parse_roles(r#"["  admin ", "", "viewer"]"#), vec!["admin", "viewer"]);
}

// ============================================================================
// Authenticator Tests
// ============================================================================

#[test]
fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let req = auth.apply(reqwest::Client::new().get("https://example.com/api"));
    let built = req.build().unwrap();
    assert!(built.headers().is_empty());
}

#[test]
fn test_storage_token_header() {
    let auth = Authenticator::new(AuthConfig::storage_token("kbc-token-123"));
    let req = auth.apply(reqwest::Client::new().get("https://example.com/api"));
    let built = req.build().unwrap();
    assert_eq!(
        built.headers().get(STORAGE_TOKEN_HEADER).unwrap(),
        "kbc-token-123"
    );
}

#[test]
fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "my-token".to_string(),
    });
    let req = auth.apply(reqwest::Client::new().get("https://example.com/api"));
    let built = req.build().unwrap();
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer my-token"
    );
}

#[test]
fn test_custom_headers() {
    let mut headers = BTreeMap::new();
    headers.insert("X-Custom-1".to_string(), "value1".to_string());
    headers.insert("X-Custom-2".to_string(), "value2".to_string());

    let auth = Authenticator::new(AuthConfig::CustomHeaders { headers });
    let req = auth.apply(reqwest::Client::new().get("https://example.com/api"));
    let built = req.build().unwrap();
    assert_eq!(built.headers().get("X-Custom-1").unwrap(), "value1");
    assert_eq!(built.headers().get("X-Custom-2").unwrap(), "value2");
}
