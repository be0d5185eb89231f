use crate::db::{Database, StoreError, EMAIL_INDEX_TREE, USERNAME_INDEX_TREE, USERS_TREE};
use crate::models::user::{User, UserConfig};
use async_trait::async_trait;
use bincode::{Decode, Encode};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::Transactional;
use std::str;
use tracing::info;

/// Persistence for user records. Username and email are unique keys.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError>;
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Inserts a new record, failing if the username or email is taken.
    async fn save(&self, user: User) -> Result<User, StoreError>;
}

#[derive(Debug, Encode, Decode)]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub config: UserConfig,
    pub streak: u64,
    pub created_at: i64, // Store as timestamp
}

impl From<User> for StoredUser {
    fn from(user: User) -> Self {
        StoredUser {
            id: user.id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            config: user.config,
            streak: user.streak,
            created_at: user.created_at.timestamp(),
        }
    }
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        User {
            id: stored.id,
            username: stored.username,
            email: stored.email,
            password_hash: stored.password_hash,
            first_name: stored.first_name,
            last_name: stored.last_name,
            config: stored.config,
            streak: stored.streak,
            created_at: chrono::DateTime::from_timestamp(stored.created_at, 0)
                .unwrap_or_else(chrono::Utc::now),
        }
    }
}

pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let users_tree = self.db.tree(USERS_TREE)?;

        match users_tree.get(id.as_bytes())? {
            Some(data) => {
                let (stored_user, _): (StoredUser, usize) =
                    bincode::decode_from_slice(&data, bincode::config::standard())?;
                Ok(Some(User::from(stored_user)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn exists_by_username(&self, username: &str) -> Result<bool, StoreError> {
        let username_index = self.db.tree(USERNAME_INDEX_TREE)?;
        Ok(username_index.contains_key(username.as_bytes())?)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let email_index = self.db.tree(EMAIL_INDEX_TREE)?;
        Ok(email_index.contains_key(email.as_bytes())?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let username_index = self.db.tree(USERNAME_INDEX_TREE)?;

        match username_index.get(username.as_bytes())? {
            Some(user_id) => {
                let id = str::from_utf8(&user_id)
                    .map_err(|e| StoreError::CorruptIndex(format!("invalid user id: {}", e)))?;
                self.get_by_id(id).await
            }
            None => Ok(None),
        }
    }

    async fn save(&self, user: User) -> Result<User, StoreError> {
        let users_tree = self.db.tree(USERS_TREE)?;
        let username_index = self.db.tree(USERNAME_INDEX_TREE)?;
        let email_index = self.db.tree(EMAIL_INDEX_TREE)?;

        let stored_user = StoredUser::from(user.clone());
        let encoded = bincode::encode_to_vec(&stored_user, bincode::config::standard())?;

        // All three keys land together or not at all.
        let result = (&users_tree, &username_index, &email_index).transaction(
            |(users, usernames, emails)| -> ConflictableTransactionResult<(), StoreError> {
                if usernames.get(user.username.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        StoreError::UsernameTaken(user.username.clone()),
                    ));
                }
                if emails.get(user.email.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(StoreError::EmailTaken(
                        user.email.clone(),
                    )));
                }

                users.insert(user.id.as_bytes(), encoded.as_slice())?;
                usernames.insert(user.username.as_bytes(), user.id.as_bytes())?;
                emails.insert(user.email.as_bytes(), user.id.as_bytes())?;
                Ok(())
            },
        );

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(StoreError::Sled(e)),
        }

        info!(user_id = %user.id, username = %user.username, "User created in database");

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn create_test_user() -> User {
        User::new(
            "testuser",
            "test@example.com",
            "hashed_password".to_string(),
            "Test",
            "User",
        )
    }

    #[tokio::test]
    async fn test_save_and_find_user() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        let saved = repo.save(user.clone()).await.unwrap();
        assert_eq!(saved.id, user.id);

        let retrieved = repo.find_by_username("testuser").await.unwrap().unwrap();
        assert_eq!(retrieved.id, user.id);
        assert_eq!(retrieved.email, user.email);
        assert_eq!(retrieved.password_hash, "hashed_password");
        assert_eq!(retrieved.first_name, "Test");
        assert_eq!(retrieved.role(), Role::User);
        assert_eq!(retrieved.created_at.timestamp(), user.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_exists_checks() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);

        assert!(!repo.exists_by_username("testuser").await.unwrap());
        assert!(!repo.exists_by_email("test@example.com").await.unwrap());

        repo.save(create_test_user()).await.unwrap();

        assert!(repo.exists_by_username("testuser").await.unwrap());
        assert!(repo.exists_by_email("test@example.com").await.unwrap());
        assert!(!repo.exists_by_username("someone_else").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_missing_user() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);

        assert!(repo.find_by_username("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user1 = create_test_user();
        repo.save(user1.clone()).await.unwrap();

        let mut user2 = create_test_user();
        user2.email = "other@example.com".to_string();

        let result = repo.save(user2.clone()).await;
        assert!(matches!(result, Err(StoreError::UsernameTaken(_))));

        // The rejected record left nothing behind
        assert!(!repo.exists_by_email("other@example.com").await.unwrap());
        assert!(repo.get_by_id(&user2.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user1 = create_test_user();
        repo.save(user1.clone()).await.unwrap();

        let mut user2 = create_test_user();
        user2.username = "another_user".to_string();

        let result = repo.save(user2).await;
        assert!(matches!(result, Err(StoreError::EmailTaken(_))));
        assert!(!repo.exists_by_username("another_user").await.unwrap());
    }
}
