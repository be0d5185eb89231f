use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "UPPERCASE")]
pub enum Experience {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "UPPERCASE")]
pub enum Motivation {
    #[default]
    Low,
    Medium,
    High,
}

/// Per-user settings embedded in the user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct UserConfig {
    pub role: Role,
    pub experience: Experience,
    pub motivation: Motivation,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub config: UserConfig,
    pub streak: u64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A freshly registered user with the default configuration.
    pub fn new(
        username: &str,
        email: &str,
        password_hash: String,
        first_name: &str,
        last_name: &str,
    ) -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_owned(),
            email: email.to_owned(),
            password_hash,
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            config: UserConfig::default(),
            streak: 0,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.config.role
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Username
    pub iat: i64,
    pub exp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("bob1", "bob@example.com", "hash".to_string(), "Bob", "Lee");

        assert_eq!(user.role(), Role::User);
        assert_eq!(user.config.experience, Experience::Low);
        assert_eq!(user.config.motivation, Motivation::Low);
        assert_eq!(user.streak, 0);
        assert!(uuid::Uuid::parse_str(&user.id).is_ok());
    }

    #[test]
    fn test_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"USER\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
    }
}
