//! Signed session tokens (HS256 JWTs).
//!
//! Tokens are stateless: validity is decided by the signature and the `exp`
//! claim alone. Access and refresh tokens share the same structure and differ
//! only in the lifetime they are issued with.

use crate::errors::AuthError;
use crate::models::user::Claims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use tracing::{debug, warn};

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    /// Builds the service from raw key bytes. The key is fixed for the
    /// lifetime of the service.
    pub fn new(secret_key: &[u8]) -> Self {
        // Expiry is checked by callers so expired tokens still parse.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        TokenService {
            encoding_key: EncodingKey::from_secret(secret_key),
            decoding_key: DecodingKey::from_secret(secret_key),
            validation,
        }
    }

    pub fn issue(&self, subject: &str, lifetime_minutes: i64) -> Result<String, AuthError> {
        self.issue_at(subject, lifetime_minutes, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        lifetime_minutes: i64,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let expires_at = Duration::try_minutes(lifetime_minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::TokenSigning(format!(
                    "lifetime of {} minutes is out of range",
                    lifetime_minutes
                ))
            })?;

        let claims = Claims {
            sub: subject.to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))
    }

    /// Subject of a correctly signed token. Expiry is not checked here.
    pub fn extract_subject(&self, token: &str) -> Result<String, AuthError> {
        Ok(self.decode_claims(token)?.sub)
    }

    /// Whether the token belongs to `expected_subject` and has not expired.
    /// Unparseable or forged tokens are an error, not `false`.
    pub fn is_valid(&self, token: &str, expected_subject: &str) -> Result<bool, AuthError> {
        self.is_valid_at(token, expected_subject, Utc::now())
    }

    pub fn is_valid_at(
        &self,
        token: &str,
        expected_subject: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let claims = self.decode_claims(token)?;
        Ok(claims.sub == expected_subject && claims.exp > now.timestamp())
    }

    /// Claims of a correctly signed, unexpired token.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode_claims(token)?;
        if claims.exp <= Utc::now().timestamp() {
            debug!(subject = %claims.sub, exp = claims.exp, "Rejected expired token");
            return Err(AuthError::InvalidToken("Token has expired".to_string()));
        }
        Ok(claims)
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => "signature verification failed".to_string(),
                    ErrorKind::InvalidAlgorithm => "unexpected signing algorithm".to_string(),
                    ErrorKind::InvalidToken => "token format is invalid".to_string(),
                    ErrorKind::Base64(err) => format!("invalid base64: {}", err),
                    ErrorKind::Json(err) => format!("invalid claims: {}", err),
                    ErrorKind::Utf8(err) => format!("invalid UTF-8: {}", err),
                    _ => e.to_string(),
                };
                warn!(reason = %reason, "Token rejected");
                AuthError::TokenMalformed(reason)
            })
    }
}
