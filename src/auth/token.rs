//! HS256 session tokens.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use serde_json::Value;

use super::claims::{self, ClaimMap};
use super::{AuthContext, TokenError};
use crate::config::AuthConfig;
use crate::db::User;

#[derive(Serialize)]
struct SessionClaims<'a> {
    sub: String,
    email: &'a str,
    given_name: &'a str,
    family_name: &'a str,
    #[serde(rename = "UserType")]
    user_type_name: String,
    #[serde(rename = "userType")]
    user_type: i64,
    role: &'static str,
    #[serde(rename = "IsActive")]
    is_active: bool,
    iat: i64,
    exp: i64,
    iss: &'a str,
    aud: &'a str,
    jti: String,
}

/// Signs tokens for authenticated users
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
    audience: String,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl_secs: config.token_ttl_hours * 3600,
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user, chrono::Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (unix seconds)
    pub fn issue_at(&self, user: &User, now: i64) -> Result<String, TokenError> {
        let role = user.role();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: &user.email,
            given_name: &user.first_name,
            family_name: &user.last_name,
            user_type_name: role.to_string(),
            user_type: role.as_i64(),
            role: role.role_name(),
            is_active: user.active(),
            iat: now,
            exp: now + self.ttl_secs,
            iss: &self.issuer,
            aud: &self.audience,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(TokenError::Signing)
    }
}

/// Verifies signature, issuer and audience, then applies the skewed
/// expiry check and the role fallback chain.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["iss", "aud"]);
        // Expiry is checked below with the skew buffer
        validation.validate_exp = false;

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn validate(&self, token: &str) -> Result<AuthContext, TokenError> {
        self.validate_at(token, chrono::Utc::now().timestamp())
    }

    pub fn validate_at(&self, token: &str, now: i64) -> Result<AuthContext, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let data = decode::<ClaimMap>(token, &self.key, &self.validation)?;
        let claims = data.claims;

        let exp = claims::expiry(&claims).ok_or(TokenError::MissingExpiry)?;
        if claims::is_expired(exp, now) {
            return Err(TokenError::Expired);
        }

        let user_id = match claims.get("sub") {
            Some(Value::String(s)) => s.parse::<i64>().ok(),
            Some(Value::Number(n)) => n.as_i64(),
            _ => None,
        }
        .ok_or(TokenError::InvalidSubject)?;

        let email = claims
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(AuthContext {
            user_id,
            email,
            role: claims::resolve_role(&claims),
            expires_at: exp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserType;
    use serde_json::json;

    const NOW: i64 = 1_750_000_000;

    fn auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "this_is_a_very_secret_key_for_testing_purposes_only".to_string(),
            issuer: "travel-booking-api".to_string(),
            audience: "travel-booking-client".to_string(),
            token_ttl_hours: 24,
            admin_email: None,
            admin_password: None,
        }
    }

    fn user(user_type: UserType) -> User {
        User {
            id: 42,
            email: "test@example.com".to_string(),
            password_hash: String::new(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            user_type: user_type.as_i64(),
            is_active: 1,
            created_at: "2025-06-01T00:00:00+00:00".to_string(),
            last_login_at: None,
        }
    }

    fn sign(claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(auth_config().jwt_secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let config = auth_config();
        let token = TokenIssuer::new(&config).issue_at(&user(UserType::Admin), NOW).unwrap();

        let ctx = TokenValidator::new(&config).validate_at(&token, NOW + 60).unwrap();
        assert_eq!(ctx.user_id, 42);
        assert_eq!(ctx.email, "test@example.com");
        assert_eq!(ctx.role, UserType::Admin);
        assert_eq!(ctx.expires_at, NOW + 24 * 3600);
    }

    #[test]
    fn test_token_carries_both_role_claim_spellings() {
        let token = TokenIssuer::new(&auth_config())
            .issue_at(&user(UserType::Regular), NOW)
            .unwrap();
        let c = claims::decode_unverified(&token).unwrap();
        assert_eq!(c["UserType"], json!("Regular"));
        assert_eq!(c["userType"], json!(0));
        assert_eq!(c["role"], json!("User"));
        assert_eq!(c["sub"], json!("42"));
    }

    #[test]
    fn test_expiry_boundary_uses_skew_buffer() {
        let config = auth_config();
        let token = TokenIssuer::new(&config).issue_at(&user(UserType::Regular), NOW).unwrap();
        let exp = NOW + 24 * 3600;
        let validator = TokenValidator::new(&config);

        assert!(validator.validate_at(&token, exp - 31).is_ok());
        assert!(matches!(
            validator.validate_at(&token, exp - 29),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_rejects_bad_signature() {
        let config = auth_config();
        let token = TokenIssuer::new(&config).issue_at(&user(UserType::Admin), NOW).unwrap();

        let mut other = auth_config();
        other.jwt_secret = "another_secret_that_is_long_enough_to_be_valid".to_string();
        let result = TokenValidator::new(&other).validate_at(&token, NOW);
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_rejects_malformed_structure() {
        let validator = TokenValidator::new(&auth_config());
        assert!(matches!(validator.validate_at("not-a-token", NOW), Err(TokenError::Malformed)));
        assert!(matches!(validator.validate_at("a.b.c.d", NOW), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_rejects_missing_expiry() {
        let token = sign(json!({
            "sub": "1",
            "iss": "travel-booking-api",
            "aud": "travel-booking-client",
            "UserType": "Admin"
        }));
        let result = TokenValidator::new(&auth_config()).validate_at(&token, NOW);
        assert!(matches!(result, Err(TokenError::MissingExpiry)));
    }

    #[test]
    fn test_rejects_wrong_audience() {
        let token = sign(json!({
            "sub": "1",
            "iss": "travel-booking-api",
            "aud": "someone-else",
            "exp": NOW + 3600
        }));
        let result = TokenValidator::new(&auth_config()).validate_at(&token, NOW);
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_role_falls_back_to_generic_claim() {
        let token = sign(json!({
            "sub": "9",
            "iss": "travel-booking-api",
            "aud": "travel-booking-client",
            "exp": NOW + 3600,
            "role": "Admin"
        }));
        let ctx = TokenValidator::new(&auth_config()).validate_at(&token, NOW).unwrap();
        assert_eq!(ctx.role, UserType::Admin);
        assert_eq!(ctx.user_id, 9);
    }

    #[test]
    fn test_rejects_non_numeric_subject() {
        let token = sign(json!({
            "sub": "alice",
            "iss": "travel-booking-api",
            "aud": "travel-booking-client",
            "exp": NOW + 3600
        }));
        let result = TokenValidator::new(&auth_config()).validate_at(&token, NOW);
        assert!(matches!(result, Err(TokenError::InvalidSubject)));
    }
}
