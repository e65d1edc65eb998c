//! Bearer-token authentication against Supabase Auth.
//!
//! Handlers take `AuthUser` when sign-in is required (401 otherwise) and
//! `MaybeUser` when anonymous sessions are allowed.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

impl AuthUser {
    /// 403 when a body-supplied user id names someone else.
    pub fn ensure_same_user(&self, claimed: Option<Uuid>) -> Result<(), AppError> {
        match claimed {
            Some(claimed) if claimed != self.id => Err(AppError::Forbidden(
                "User id does not match the signed-in user".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Optional sign-in. Invalid tokens are treated as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// `Ok(None)` when the token is invalid or expired.
    async fn verify(&self, token: &str) -> Result<Option<AuthUser>, AppError>;
}

pub struct SupabaseAuth {
    client: Client,
    user_endpoint: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            user_endpoint: format!("{supabase_url}/auth/v1/user"),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl TokenVerifier for SupabaseAuth {
    async fn verify(&self, token: &str) -> Result<Option<AuthUser>, AppError> {
        let response = self
            .client
            .get(&self.user_endpoint)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Supabase auth request failed: {e}")))?;

        match response.status() {
            StatusCode::OK => {
                let user = response.json::<AuthUser>().await.map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Unexpected Supabase user payload: {e}"))
                })?;
                Ok(Some(user))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status => {
                warn!("Supabase auth returned {status}");
                Ok(None)
            }
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;
        state
            .auth
            .verify(token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };
        let user = state.auth.verify(token).await?;
        if user.is_none() {
            debug!("Ignoring invalid bearer token on optional-auth route");
        }
        Ok(MaybeUser(user))
    }
}
