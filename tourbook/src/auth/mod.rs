//! Authentication: password hashing, session tokens and the user flows
//!
//! # Example
//!
//! ```rust,ignore
//! use tourbook::auth::{PasswordHasher, TokenService};
//!
//! // Hash a password
//! let hasher = PasswordHasher::default();
//! let hash = hasher.hash("my_secure_password")?;
//! assert!(hasher.verify("my_secure_password", &hash)?);
//!
//! // Issue a session token
//! let tokens = TokenService::new(&config.jwt);
//! let token = tokens.issue(&user_id)?;
//! ```

// Password hashing (Argon2id)
pub mod password;

// Session tokens (HS256 JWT) and cookies
pub mod jwt;

// protect / restrict_to
pub mod middleware;

// signup, login, logout and password flows
pub mod controller;

pub use jwt::{extract_token, Claims, TokenService, COOKIE_NAME};
pub use middleware::{protect, restrict_to, Roles, NOT_LOGGED_IN};
pub use password::PasswordHasher;
