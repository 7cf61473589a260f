//! Authentication middleware.

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use log::{debug, warn};
use std::sync::Arc;

use super::{AuthConfig, AuthError, Claims, Role};
use crate::threads::ThreadOwner;

const TOKEN_TTL_SECS: i64 = 3600 * 24;

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    decoding_key: Option<DecodingKey>,
}

impl AuthState {
    /// Create new auth state from config.
    /// Resolves `env:VAR_NAME` syntax in jwt_secret at construction time.
    pub fn new(mut config: AuthConfig) -> Self {
        if let Ok(Some(resolved)) = config.resolve_jwt_secret() {
            config.jwt_secret = Some(resolved);
        }

        let decoding_key = config
            .jwt_secret
            .as_ref()
            .map(|s| DecodingKey::from_secret(s.as_bytes()));

        Self {
            config: Arc::new(config),
            decoding_key,
        }
    }

    /// Check if dev mode is enabled.
    pub fn is_dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    /// Get allowed CORS origins from config.
    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }

    /// Validate a bearer token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        if self.config.dev_mode {
            if let Some(user_id) = token.strip_prefix("dev:") {
                return self.dev_user_claims(user_id);
            }
        }

        let decoding_key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthError::Internal("no JWT secret configured".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(token, decoding_key, &validation).map_err(|e| {
            warn!("JWT validation failed: {:?}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    fn dev_user_claims(&self, user_id: &str) -> Result<Claims, AuthError> {
        let user = self
            .config
            .dev_users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::UserNotFound)?;

        Ok(Claims {
            sub: user.id.clone(),
            iss: Some("dev".to_string()),
            exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
            iat: Some(Utc::now().timestamp()),
            email: user.email.clone(),
            name: Some(user.name.clone()),
            roles: vec![user.role.to_string()],
            role: Some(user.role.to_string()),
        })
    }
}

/// Authenticated user extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// User claims.
    pub claims: Claims,
}

impl CurrentUser {
    /// Get the user ID.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    /// Get the user's role.
    pub fn role(&self) -> Role {
        self.claims.effective_role()
    }

    /// The user as a thread owner.
    pub fn owner(&self) -> ThreadOwner {
        ThreadOwner::new(self.id(), self.role())
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Validates tokens and injects `CurrentUser` into request extensions.
/// Auth methods in priority order:
/// 1. Authorization: Bearer <token> header
/// 2. auth_token cookie (EventSource cannot set headers)
/// 3. X-Dev-User header (dev mode only)
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let cookie_token = req
        .headers()
        .get(axum::http::header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_header| token_from_cookie_header(cookie_header, "auth_token"));

    let claims = if let Some(header) = auth_header {
        let token = bearer_token_from_header(header)?;
        auth.validate_token(token)?
    } else if let Some(token) = cookie_token {
        auth.validate_token(token)?
    } else if auth.is_dev_mode() {
        let user_id = req
            .headers()
            .get("X-Dev-User")
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingAuthHeader)?;
        debug!("Using dev user: {}", user_id);
        auth.validate_token(&format!("dev:{}", user_id))?
    } else {
        return Err(AuthError::MissingAuthHeader);
    };

    req.extensions_mut().insert(CurrentUser { claims });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DevUser;

    fn dev_state() -> AuthState {
        AuthState::new(AuthConfig {
            dev_mode: true,
            jwt_secret: Some("x".repeat(32)),
            dev_users: vec![DevUser {
                id: "venue_1".to_string(),
                name: "Harbor Hall".to_string(),
                email: None,
                role: Role::Venue,
            }],
            allowed_origins: vec![],
        })
    }

    #[test]
    fn test_bearer_token_from_header_valid() {
        assert_eq!(
            bearer_token_from_header("Bearer abc.def.ghi").unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(
            bearer_token_from_header("bearer   token123").unwrap(),
            "token123"
        );
    }

    #[test]
    fn test_bearer_token_from_header_invalid() {
        for case in ["", "Bearer", "Bearer ", "Token something", "Bearer a b"] {
            assert!(
                bearer_token_from_header(case).is_err(),
                "{case} should fail"
            );
        }
    }

    #[test]
    fn test_token_from_cookie_header() {
        assert_eq!(
            token_from_cookie_header("theme=dark; auth_token=abc; x=1", "auth_token"),
            Some("abc")
        );
        assert_eq!(token_from_cookie_header("theme=dark", "auth_token"), None);
    }

    #[test]
    fn test_dev_token() {
        let state = dev_state();
        let claims = state.validate_token("dev:venue_1").unwrap();
        assert_eq!(claims.sub, "venue_1");
        assert_eq!(claims.effective_role(), Role::Venue);

        assert!(matches!(
            state.validate_token("dev:nobody"),
            Err(AuthError::UserNotFound)
        ));
    }

    #[test]
    fn test_signed_token_validates() {
        let state = dev_state();
        let now = Utc::now().timestamp();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims {
                sub: "client_7".to_string(),
                iss: Some("planner".to_string()),
                exp: now + 60,
                iat: Some(now),
                email: None,
                name: Some("Casey".to_string()),
                roles: vec!["client".to_string()],
                role: None,
            },
            &jsonwebtoken::EncodingKey::from_secret("x".repeat(32).as_bytes()),
        )
        .unwrap();
        let claims = state.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "client_7");
        assert_eq!(claims.effective_role(), Role::Client);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let state = dev_state();
        assert!(matches!(
            state.validate_token("not-a-jwt"),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
