//! Local inspection of access tokens.
//!
//! Tokens stay opaque to the client: signatures are never checked here, the
//! backend does that. When a token happens to be a JWT with an `exp` claim we
//! read it so an already-expired session is not treated as valid.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// JWT whose `exp` lies in the future
    Valid { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
    /// Not a JWT, or a JWT without `exp`
    Opaque,
}

impl TokenStatus {
    pub fn is_usable(&self) -> bool {
        !matches!(self, TokenStatus::Expired { .. })
    }
}

pub fn peek_claims(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
}

pub fn inspect(token: &str, now: DateTime<Utc>) -> TokenStatus {
    let Some(exp) = peek_claims(token).and_then(|claims| claims.exp) else {
        return TokenStatus::Opaque;
    };
    let Some(at) = Utc.timestamp_opt(exp, 0).single() else {
        return TokenStatus::Opaque;
    };

    if at <= now {
        TokenStatus::Expired { expired_at: at }
    } else {
        TokenStatus::Valid { expires_at: at }
    }
}
