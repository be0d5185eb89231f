use crate::errors::AuthError;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
#[cfg(test)]
use argon2::{Algorithm, Params, Version};
use rand_core::OsRng;

/// One-way, salted password hashing.
pub trait PasswordEncoder: Send + Sync {
    fn encode(&self, password: &str) -> Result<String, AuthError>;

    /// Constant-time check of `password` against a stored hash.
    fn matches(&self, password: &str, password_hash: &str) -> bool;
}

#[derive(Default)]
pub struct Argon2PasswordEncoder {
    argon2: Argon2<'static>,
}

impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimal cost parameters so tests don't spend seconds hashing.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        let params = Params::new(1024, 1, 1, None).expect("valid argon2 params");
        Argon2PasswordEncoder {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        Ok(password_hash.to_string())
    }

    fn matches(&self, password: &str, password_hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(password_hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        self.argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
