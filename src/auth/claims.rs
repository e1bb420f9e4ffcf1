//! Claim helpers shared by the server-side validator and the client
//! session holder.
//!
//! The client never holds the signing secret, so it reads the payload
//! segment unverified and only uses it for expiry and role display; the
//! server always verifies the signature first.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

use super::TokenError;
use crate::db::UserType;

/// Tokens are treated as expired this many seconds before their nominal
/// `exp` to absorb clock skew between issuer and holder.
pub const EXPIRY_SKEW_SECS: i64 = 30;

pub type ClaimMap = serde_json::Map<String, Value>;

/// `now > exp - 30s`
pub fn is_expired(exp: i64, now: i64) -> bool {
    now > exp - EXPIRY_SKEW_SECS
}

/// Numeric `exp` claim, if present
pub fn expiry(claims: &ClaimMap) -> Option<i64> {
    match claims.get("exp")? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Split a compact JWT and decode its payload without checking the
/// signature.
pub fn decode_unverified(token: &str) -> Result<ClaimMap, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| TokenError::Malformed)?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(TokenError::Malformed),
    }
}

/// Derive the caller's role from token claims.
///
/// Checked in order, first present claim wins:
/// `UserType` (PascalCase), `userType` (camelCase), generic `role`.
/// Absent or unrecognised values resolve to `Regular`.
pub fn resolve_role(claims: &ClaimMap) -> UserType {
    if let Some(value) = claims.get("UserType") {
        return match value {
            Value::Number(n) => from_number(n),
            Value::String(s) => match s.to_lowercase().as_str() {
                "admin" | "1" => UserType::Admin,
                "regular" | "0" | "user" => UserType::Regular,
                other => from_integer_str(other),
            },
            _ => UserType::Regular,
        };
    }

    if let Some(value) = claims.get("userType") {
        return match value {
            Value::Number(n) => from_number(n),
            Value::String(s) => from_integer_str(s),
            _ => UserType::Regular,
        };
    }

    match claims.get("role") {
        Some(Value::String(role)) if !role.is_empty() => {
            if role.eq_ignore_ascii_case("admin") {
                UserType::Admin
            } else {
                UserType::Regular
            }
        }
        _ => UserType::Regular,
    }
}

fn from_number(n: &serde_json::Number) -> UserType {
    match n.as_i64() {
        Some(v) => UserType::from_i64(v),
        None => UserType::Regular,
    }
}

fn from_integer_str(s: &str) -> UserType {
    parse_leading_int(s).map(UserType::from_i64).unwrap_or_default()
}

/// Integer value of a string's leading numeric prefix ("1abc" -> 1),
/// the way loosely typed clients read numbers out of strings.
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let digits: String = s
        .trim_start()
        .chars()
        .enumerate()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(_, c)| c)
        .collect();
    digits.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> ClaimMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_expiry_skew_boundary() {
        let exp = 1_750_000_000;
        assert!(!is_expired(exp, exp - 31));
        assert!(!is_expired(exp, exp - 30));
        assert!(is_expired(exp, exp - 29));
        assert!(is_expired(exp, exp + 10));
    }

    #[test]
    fn test_pascal_case_claim_wins() {
        let c = claims(json!({"UserType": "Admin", "userType": 0, "role": "User"}));
        assert_eq!(resolve_role(&c), UserType::Admin);

        let c = claims(json!({"UserType": "Regular", "userType": 1, "role": "Admin"}));
        assert_eq!(resolve_role(&c), UserType::Regular);

        let c = claims(json!({"UserType": 1}));
        assert_eq!(resolve_role(&c), UserType::Admin);

        let c = claims(json!({"UserType": "1"}));
        assert_eq!(resolve_role(&c), UserType::Admin);
    }

    #[test]
    fn test_null_pascal_claim_stops_the_chain() {
        let c = claims(json!({"UserType": null, "role": "Admin"}));
        assert_eq!(resolve_role(&c), UserType::Regular);
    }

    #[test]
    fn test_camel_case_claim_is_numeric_only() {
        let c = claims(json!({"userType": 1, "role": "User"}));
        assert_eq!(resolve_role(&c), UserType::Admin);

        let c = claims(json!({"userType": "1"}));
        assert_eq!(resolve_role(&c), UserType::Admin);

        // Names are not accepted for the camelCase claim
        let c = claims(json!({"userType": "Admin", "role": "Admin"}));
        assert_eq!(resolve_role(&c), UserType::Regular);
    }

    #[test]
    fn test_role_claim_fallback() {
        let c = claims(json!({"role": "admin"}));
        assert_eq!(resolve_role(&c), UserType::Admin);

        let c = claims(json!({"role": "User"}));
        assert_eq!(resolve_role(&c), UserType::Regular);
    }

    #[test]
    fn test_defaults_to_regular() {
        assert_eq!(resolve_role(&ClaimMap::new()), UserType::Regular);
        let c = claims(json!({"role": ""}));
        assert_eq!(resolve_role(&c), UserType::Regular);
        let c = claims(json!({"UserType": "superuser"}));
        assert_eq!(resolve_role(&c), UserType::Regular);
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("1"), Some(1));
        assert_eq!(parse_leading_int(" 1abc"), Some(1));
        assert_eq!(parse_leading_int("-3"), Some(-3));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int(""), None);
    }

    #[test]
    fn test_decode_unverified() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"7","exp":1750000000}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{}.c2ln", payload);
        let c = decode_unverified(&token).unwrap();
        assert_eq!(c.get("sub"), Some(&json!("7")));
        assert_eq!(expiry(&c), Some(1_750_000_000));
    }

    #[test]
    fn test_decode_unverified_rejects_malformed() {
        assert!(matches!(decode_unverified("abc"), Err(TokenError::Malformed)));
        assert!(matches!(decode_unverified("a.b"), Err(TokenError::Malformed)));
        assert!(matches!(decode_unverified("a.!!!.c"), Err(TokenError::Malformed)));

        let not_object = URL_SAFE_NO_PAD.encode(b"[1,2]");
        let token = format!("x.{}.y", not_object);
        assert!(matches!(decode_unverified(&token), Err(TokenError::Malformed)));
    }
}
