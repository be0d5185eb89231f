//! Registration, login and access-token refresh.
//!
//! Registration checks run cheapest first: request shape, then formats, then
//! store lookups, then password strength, and only then the hash.

use crate::config::Config;
use crate::db::{StoreError, UserStore};
use crate::errors::AuthError;
use crate::models::auth::{
    AccessTokenResponse, AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, UserResponse,
};
use crate::models::user::User;
use crate::utils::auth::PasswordEncoder;
use crate::utils::token::TokenService;
use crate::utils::validation::{
    is_email_valid, is_name_valid, is_password_strong, is_username_valid, Validate,
};
use async_trait::async_trait;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

pub const BAD_CREDENTIALS: &str = "Username or password is incorrect";

const BAD_USERNAME: &str = "The username can only contain letters, numbers and underscore, \
     with the first character being a letter. The length must be between 3 and 30 characters";
const BAD_EMAIL: &str = "The email address is not valid";
const BAD_NAME: &str = "First and last name can only contain letters, \
     separated by single spaces, apostrophes or hyphens";
const WEAK_PASSWORD: &str = "Password must be at least 8 characters long, include numbers, \
     upper and lower case letters, and at least one special character";
/// Hashed once per service and verified against when the username is unknown.
const DUMMY_PASSWORD: &str = "Dummy!Passw0rd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access_minutes: i64,
    pub refresh_minutes: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        TokenLifetimes {
            access_minutes: 60 * 24,
            refresh_minutes: 60 * 24 * 7,
        }
    }
}

impl From<&Config> for TokenLifetimes {
    fn from(config: &Config) -> Self {
        TokenLifetimes {
            access_minutes: config.access_token_minutes,
            refresh_minutes: config.refresh_token_minutes,
        }
    }
}

/// Establishes the security context for a user whose password has already
/// been verified, before a session is issued. May still refuse the login.
#[async_trait]
pub trait CredentialManager: Send + Sync {
    async fn authenticate(&self, user: User) -> Result<User, AuthError>;
}

/// Records the audit event and accepts every verified user.
pub struct AuditCredentialManager;

#[async_trait]
impl CredentialManager for AuditCredentialManager {
    async fn authenticate(&self, user: User) -> Result<User, AuthError> {
        info!(user_id = %user.id, username = %user.username, "User authenticated");
        Ok(user)
    }
}

pub struct AuthService {
    store: Arc<dyn UserStore>,
    encoder: Arc<dyn PasswordEncoder>,
    tokens: Arc<TokenService>,
    credentials: Arc<dyn CredentialManager>,
    lifetimes: TokenLifetimes,
    dummy_hash: OnceLock<Option<String>>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        encoder: Arc<dyn PasswordEncoder>,
        tokens: Arc<TokenService>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        AuthService {
            store,
            encoder,
            tokens,
            credentials: Arc::new(AuditCredentialManager),
            lifetimes,
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn with_credential_manager(mut self, credentials: Arc<dyn CredentialManager>) -> Self {
        self.credentials = credentials;
        self
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        if !is_username_valid(&request.username) {
            return Err(AuthError::BadInput(BAD_USERNAME.to_string()));
        }
        if !is_email_valid(&request.email) {
            return Err(AuthError::BadInput(BAD_EMAIL.to_string()));
        }
        if !is_name_valid(&request.first_name) || !is_name_valid(&request.last_name) {
            return Err(AuthError::BadInput(BAD_NAME.to_string()));
        }
        if self.store.exists_by_username(&request.username).await? {
            warn!(username = %request.username, "Registration failed: username taken");
            return Err(username_taken(&request.username));
        }
        if self.store.exists_by_email(&request.email).await? {
            warn!(username = %request.username, "Registration failed: email taken");
            return Err(email_taken(&request.email));
        }
        if !is_password_strong(&request.password) {
            return Err(AuthError::BadInput(WEAK_PASSWORD.to_string()));
        }

        let password_hash = self.encoder.encode(&request.password)?;
        let user = User::new(
            &request.username,
            &request.email,
            password_hash,
            &request.first_name,
            &request.last_name,
        );

        // A concurrent registration can still win between the checks and the insert.
        let user = self.store.save(user).await.map_err(|e| match e {
            StoreError::UsernameTaken(username) => username_taken(&username),
            StoreError::EmailTaken(email) => email_taken(&email),
            other => AuthError::Store(other),
        })?;

        info!(user_id = %user.id, username = %user.username, "User registered successfully");

        self.session_for(&user)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AuthError> {
        request.validate()?;

        // Unknown user and wrong password must look the same to the caller,
        // in both the message and the time spent hashing.
        let user = match self.store.find_by_username(&request.username).await? {
            None => {
                if let Some(hash) = self.dummy_hash() {
                    self.encoder.matches(&request.password, hash);
                }
                warn!(username = %request.username, "Login failed: user not found");
                return Err(AuthError::BadInput(BAD_CREDENTIALS.to_string()));
            }
            Some(user) if !self.encoder.matches(&request.password, &user.password_hash) => {
                warn!(user_id = %user.id, "Login failed: invalid credentials");
                return Err(AuthError::BadInput(BAD_CREDENTIALS.to_string()));
            }
            Some(user) => user,
        };

        let user = self.credentials.authenticate(user).await?;

        info!(user_id = %user.id, username = %user.username, "User logged in successfully");

        self.session_for(&user)
    }

    /// Mints a new access token. The refresh token itself is not rotated.
    pub async fn refresh_access_token(
        &self,
        request: &RefreshRequest,
    ) -> Result<AccessTokenResponse, AuthError> {
        request.validate()?;

        let username = self.tokens.extract_subject(&request.refresh_token)?;
        let user = self.current_user(&username).await?;

        if !self.tokens.is_valid(&request.refresh_token, &user.username)? {
            warn!(username = %user.username, "Refresh rejected: token expired or mismatched");
            return Err(AuthError::InvalidToken("Token is invalid".to_string()));
        }

        let access_token = self
            .tokens
            .issue(&user.username, self.lifetimes.access_minutes)?;

        info!(user_id = %user.id, "Access token refreshed");

        Ok(AccessTokenResponse { access_token })
    }

    pub async fn current_user(&self, username: &str) -> Result<User, AuthError> {
        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))
    }

    fn dummy_hash(&self) -> Option<&str> {
        self.dummy_hash
            .get_or_init(|| self.encoder.encode(DUMMY_PASSWORD).ok())
            .as_deref()
    }

    fn session_for(&self, user: &User) -> Result<AuthResponse, AuthError> {
        Ok(AuthResponse {
            access_token: self
                .tokens
                .issue(&user.username, self.lifetimes.access_minutes)?,
            refresh_token: self
                .tokens
                .issue(&user.username, self.lifetimes.refresh_minutes)?,
            user: UserResponse::from(user),
        })
    }
}

fn username_taken(username: &str) -> AuthError {
    AuthError::UserAlreadyExists(format!("User with username: {} already exists", username))
}

fn email_taken(email: &str) -> AuthError {
    AuthError::UserAlreadyExists(format!("User with email: {} already exists", email))
}
