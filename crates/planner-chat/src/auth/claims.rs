//! JWT claims and platform roles.

use serde::{Deserialize, Serialize};

/// Platform role of the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Someone planning an event.
    #[default]
    Client,
    /// Venue staff.
    Venue,
    /// Vendor (caterer, florist, ...).
    Vendor,
    /// Platform administrator.
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Client => write!(f, "client"),
            Role::Venue => write!(f, "venue"),
            Role::Vendor => write!(f, "vendor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "client" => Ok(Role::Client),
            "venue" => Ok(Role::Venue),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,

    /// User's email.
    #[serde(default)]
    pub email: Option<String>,

    /// User's name.
    #[serde(default)]
    pub name: Option<String>,

    /// User's roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Custom role claim (alternative to roles array).
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Get the effective role for the user.
    ///
    /// The `role` claim wins over the `roles` array; unknown values fall back to client.
    pub fn effective_role(&self) -> Role {
        if let Some(role) = self.role.as_deref().and_then(|r| r.parse::<Role>().ok()) {
            return role;
        }

        self.roles
            .iter()
            .find_map(|r| r.parse::<Role>().ok())
            .unwrap_or_default()
    }
}
