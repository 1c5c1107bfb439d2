//! Admin login and bearer-token checks
//!
//! One shared admin identity: the password is verified against a bcrypt
//! hash, and a successful login returns an HS256 JWT valid for 24 hours.

use super::error::ApiError;
use super::AppState;
use crate::config::AdminCredentials;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

const ADMIN_SUBJECT: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct AdminAuth {
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AdminAuth {
    pub fn new(credentials: &AdminCredentials) -> Self {
        Self {
            password_hash: credentials.password_hash.clone(),
            encoding_key: EncodingKey::from_secret(credentials.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(credentials.jwt_secret.as_bytes()),
        }
    }

    pub fn verify_password(&self, password: &str) -> bool {
        match bcrypt::verify(password, &self.password_hash) {
            Ok(valid) => valid,
            Err(e) => {
                log::error!("❌ ADMIN_PASSWORD is not a valid bcrypt hash: {}", e);
                false
            }
        }
    }

    pub fn issue_token(&self, now: i64) -> Result<String, ApiError> {
        let claims = Claims {
            sub: ADMIN_SUBJECT.to_string(),
            iat: now,
            exp: now + TOKEN_TTL_SECS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ApiError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("Rejected admin token: {}", e);
                ApiError::Unauthorized("Failed to authenticate token".to_string())
            })
    }
}

/// Accepts both a raw token and `Bearer <token>`.
pub fn extract_token(header: &str) -> &str {
    let header = header.trim();
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

/// Route layer guarding the admin CRUD endpoints.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = state
        .auth
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("admin access is not configured".to_string()))?;

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(extract_token)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;

    auth.validate_token(token)?;
    Ok(next.run(request).await)
}
