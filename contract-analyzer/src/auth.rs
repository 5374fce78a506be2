//! API tokens and signed session tokens
//!
//! A caller exchanges a static API token for a short-lived session token at
//! `/login`. Session tokens are HS256 JWTs: `header.payload.signature`, each
//! part base64url without padding, signed with the configured secret.

use axum::http::HeaderMap;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const MAX_TOKEN_LEN: usize = 2048;

/// Errors raised while authenticating a request
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Token está faltando!")]
    Missing,

    #[error("Token inválido!")]
    Invalid,

    #[error("Token expirado!")]
    Expired,
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity the session was issued to
    pub sub: String,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

/// The bearer credential from an `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Static API tokens accepted by `/login`
#[derive(Debug, Clone, Default)]
pub struct ApiTokens {
    admin: Option<String>,
    user: Option<String>,
}

impl ApiTokens {
    pub fn new(admin: Option<String>, user: Option<String>) -> Self {
        Self { admin, user }
    }

    /// Identity an API token maps to
    pub fn identity_for(&self, token: &str) -> Result<&'static str, AuthError> {
        if self.admin.as_deref() == Some(token) {
            Ok("admin")
        } else if self.user.as_deref() == Some(token) {
            Ok("user")
        } else {
            Err(AuthError::Invalid)
        }
    }
}

/// Issues and verifies session tokens
#[derive(Clone)]
pub struct SessionKeys {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl SessionKeys {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: u64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    /// Issue a token for `subject`, valid from `now` for the configured TTL
    pub fn issue(&self, subject: &str, now: i64) -> String {
        let claims = Claims {
            sub: subject.to_string(),
            exp: now.saturating_add(self.ttl_secs),
        };
        let header = URL_SAFE_NO_PAD.encode(JWT_HEADER);
        // Serializing two plain fields cannot fail
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let signing_input = format!("{header}.{payload}");

        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{signing_input}.{signature}")
    }

    /// Verify a token's signature and expiry at `now`
    pub fn verify(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(AuthError::Invalid);
        }

        let mut parts = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Invalid);
        };

        let header_json = URL_SAFE_NO_PAD.decode(header).map_err(|_| AuthError::Invalid)?;
        if header_json != JWT_HEADER.as_bytes() {
            return Err(AuthError::Invalid);
        }

        let expected = URL_SAFE_NO_PAD.decode(signature).map_err(|_| AuthError::Invalid)?;
        let mut mac = self.mac();
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&expected).map_err(|_| AuthError::Invalid)?;

        let payload_json = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AuthError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&payload_json).map_err(|_| AuthError::Invalid)?;

        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
