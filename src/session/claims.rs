use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims readable from an access token without knowing the signing key.
///
/// Display-only: the client never trusts these for authorization decisions,
/// the backend remains the judge of token validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

impl TokenClaims {
    /// Decode the payload of a JWT, skipping signature and expiry checks.
    /// Returns `None` for opaque (non-JWT) tokens.
    pub fn inspect(token: &str) -> Option<Self> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| exp <= now).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn reads_claims_without_the_key() {
        let claims = TokenClaims {
            sub: Some("42".to_string()),
            exp: Some(1_700_000_000),
            iat: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-secret")).unwrap();

        let inspected = TokenClaims::inspect(&token).unwrap();
        assert_eq!(inspected.sub.as_deref(), Some("42"));
        assert_eq!(inspected.expires_at().unwrap().timestamp(), 1_700_000_000);
        assert!(inspected.is_expired_at(Utc::now()));
    }

    #[test]
    fn opaque_tokens_have_no_claims() {
        assert!(TokenClaims::inspect("A1").is_none());
    }
}
