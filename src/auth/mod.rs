//! Authentication: password hashing, JWTs, lockout and the login flows.

pub mod cookies;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod service;

pub use service::{AuthError, AuthService};
