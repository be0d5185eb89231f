pub mod user_repository;

use std::sync::Arc;
use thiserror::Error;

pub use user_repository::{UserRepository, UserStore};

pub const USERS_TREE: &str = "users";
pub const USERNAME_INDEX_TREE: &str = "username_index";
pub const EMAIL_INDEX_TREE: &str = "email_index";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Failed to encode user: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("Failed to decode user: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("Corrupt index entry: {0}")]
    CorruptIndex(String),
    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("Email '{0}' is already registered")]
    EmailTaken(String),
}

#[derive(Clone)]
pub struct Database {
    pub db: Arc<sled::Db>,
}

impl Database {
    pub fn new(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Database { db: Arc::new(db) })
    }

    /// Temporary database, removed when the last handle drops.
    pub fn in_memory() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Database { db: Arc::new(db) })
    }

    pub fn tree(&self, name: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    pub fn is_healthy(&self) -> bool {
        [USERS_TREE, USERNAME_INDEX_TREE, EMAIL_INDEX_TREE]
            .iter()
            .all(|name| self.tree(name).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_database_is_healthy() {
        let db = Database::in_memory().unwrap();
        assert!(db.is_healthy());
    }
}
