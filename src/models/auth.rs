use crate::models::user::{Role, User};
use crate::utils::validation::{require_not_blank, Validate};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Treats an explicit `null` like a missing field so blank checks see it.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub first_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub last_name: String,
}

impl Validate for RegisterRequest {
    fn violations(&self) -> Vec<String> {
        require_not_blank(&[
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("email", self.email.as_str()),
            ("first_name", self.first_name.as_str()),
            ("last_name", self.last_name.as_str()),
        ])
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
}

impl Validate for LoginRequest {
    fn violations(&self) -> Vec<String> {
        require_not_blank(&[
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ])
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn violations(&self) -> Vec<String> {
        require_not_blank(&[("refresh_token", self.refresh_token.as_str())])
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role(),
        }
    }
}
