use chrono::Utc;
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Learner sessions stay valid for a week; admin sessions for a day.
/// With stateless tokens and no revocation list, expiry is the only thing
/// that ends a captured session, so the privileged domain gets the short one.
pub const LEARNER_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
pub const ADMIN_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims
///
/// The payload signed into every session token. Self-contained: nothing is
/// persisted server-side, so the claims must carry everything `verify` needs.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the principal (learner or admin).
    pub sub: Uuid,
    /// Expiration Time (exp): timestamp after which the token must not be accepted.
    pub exp: usize,
    /// Issued At (iat): timestamp when the token was issued.
    pub iat: usize,
}

/// TokenError
///
/// Verification and signing failures. `Expired` and `Invalid` are kept
/// distinct for logging, but both collapse to the same 401 at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed")]
    Signing,
}

/// TokenService
///
/// Issues and verifies signed, time-bounded session tokens for exactly one
/// signing domain. The learner and admin domains are two instances of this
/// one type, constructed from independent secrets. A token signed in one
/// domain can never verify in the other because the HMAC keys differ.
///
/// Pure function of secret + clock: no storage, no revocation list. A token
/// remains valid until its natural expiry (see DESIGN.md on logout).
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_secs: i64,
}

impl TokenService {
    /// The learner-domain instance, 7-day expiry.
    pub fn learner(config: &AppConfig) -> Self {
        Self {
            secret: config.learner_token_secret.clone(),
            ttl_secs: LEARNER_TOKEN_TTL_SECS,
        }
    }

    /// The admin-domain instance, 1-day expiry.
    pub fn admin(config: &AppConfig) -> Self {
        Self {
            secret: config.admin_token_secret.clone(),
            ttl_secs: ADMIN_TOKEN_TTL_SECS,
        }
    }

    /// Token lifetime in seconds. Session cookies must match this.
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_secs
    }

    /// issue
    ///
    /// Signs `{sub, iat, exp = iat + ttl}` with this domain's secret.
    pub fn issue(&self, principal_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal_id,
            iat: now as usize,
            exp: (now + self.ttl_secs) as usize,
        };

        let key = EncodingKey::from_secret(self.secret.as_bytes());
        encode(&Header::default(), &claims, &key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign session token");
            TokenError::Signing
        })
    }

    /// verify
    ///
    /// Decodes and validates a token against this domain's secret. Fails if
    /// the signature does not match (including tokens from the other domain),
    /// the payload is malformed, or the expiry has passed. There is no
    /// refresh mechanism; expiry forces re-authentication.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());

        let mut validation = Validation::default();
        // Ensure expiration time validation is always active.
        validation.validate_exp = true;

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Ok(data.claims.sub),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                // Bad signature, cross-domain token, malformed payload, etc.
                _ => Err(TokenError::Invalid),
            },
        }
    }
}
