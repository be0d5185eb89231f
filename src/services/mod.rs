pub mod auth;

pub use auth::{AuthService, TokenLifetimes};
