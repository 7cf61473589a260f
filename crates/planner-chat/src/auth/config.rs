//! Authentication configuration.

use super::Role;
use serde::{Deserialize, Serialize};

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable development mode (accept `X-Dev-User` and `dev:` tokens).
    pub dev_mode: bool,

    /// JWT secret for HS256. Accepts `env:VAR_NAME`.
    /// REQUIRED when dev_mode is false.
    pub jwt_secret: Option<String>,

    /// Development users (only used in dev mode).
    pub dev_users: Vec<DevUser>,

    /// Allowed CORS origins.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            jwt_secret: None,
            dev_users: Vec::new(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Validate the configuration for the current mode.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.dev_mode {
            match self.resolve_jwt_secret()? {
                None => return Err(ConfigValidationError::MissingJwtSecret),
                Some(secret) if secret.len() < 32 => {
                    return Err(ConfigValidationError::JwtSecretTooShort);
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// JWT secret is required in production mode.
    MissingJwtSecret,
    /// JWT secret is too short (minimum 32 characters).
    JwtSecretTooShort,
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => {
                write!(
                    f,
                    "JWT secret is required when dev_mode is false. Set PLANNER_CHAT__AUTH__JWT_SECRET or auth.jwt_secret in config."
                )
            }
            Self::JwtSecretTooShort => {
                write!(f, "JWT secret must be at least 32 characters long.")
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Development user configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevUser {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Role.
    #[serde(default)]
    pub role: Role,
}
