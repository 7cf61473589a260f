//! Authentication module.
//!
//! Bearer JWT validation (HS256) with a dev mode that accepts configured
//! test users via `X-Dev-User` or `dev:<id>` tokens.

mod claims;
mod config;
mod error;
mod middleware;

pub use claims::{Claims, Role};
pub use config::{AuthConfig, ConfigValidationError, DevUser};
pub use error::AuthError;
pub use middleware::{AuthState, CurrentUser, auth_middleware};
