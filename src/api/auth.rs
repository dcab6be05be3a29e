use axum::{
    Extension, Json,
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{ApiError, AppState, AuthCause};
use crate::api::validation::{validate_email, validate_name, validate_password};
use crate::auth::cookies::{auth_cookie_value, clear_auth_cookie, is_auth_cookie, set_auth_cookie};
use crate::auth::tokens::{Claims, has_expired};
use crate::db::{CreateUserError, PublicUser};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Verified token payload attached to the request by the session middleware.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Claims);

// ============================================================================
// Middleware
// ============================================================================

/// Session middleware driving the token lifecycle for every protected route:
/// validate the access-token cookie, fall back to silent refresh when it has
/// expired, revoke on refresh failure.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = auth_cookie_value(request.headers()) else {
        return Err(ApiError::Unauthorized(AuthCause::MissingToken));
    };

    // Signature is checked before any payload field is trusted; a forged
    // token never reaches the refresh path.
    let claims = state
        .tokens
        .verify(&token)
        .map_err(|_| ApiError::Unauthorized(AuthCause::InvalidToken))?;

    let now = Utc::now();
    if !has_expired(claims.exp, now) {
        request.extensions_mut().insert(CurrentSession(claims));
        return Ok(next.run(request).await);
    }

    // Access token expired: try to rotate from the stored refresh token.
    let user = state
        .store
        .find_active_user_by_id(claims.sub)
        .await
        .map_err(|e| ApiError::internal(format!("Session lookup failed: {e}")))?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized(AuthCause::MissingRefreshToken));
    };
    let Some(stored_refresh) = user.refresh_token else {
        return Err(ApiError::Unauthorized(AuthCause::MissingRefreshToken));
    };

    let refresh_valid = state
        .tokens
        .verify(&stored_refresh)
        .map(|refresh| !has_expired(refresh.exp, now))
        .unwrap_or(false);

    if !refresh_valid {
        // Revocation: nulling the stored token cuts the only path that could
        // mint a new access token for this user.
        if let Err(e) = state.store.set_refresh_token(user.id, None).await {
            tracing::error!("Failed to revoke refresh token for {}: {e}", user.id);
        }
        return Err(ApiError::Unauthorized(AuthCause::TokenExpired));
    }

    let (claims, cookie) = issue_session(&state, user.id).await?;
    tracing::debug!("Rotated session tokens for {}", user.id);

    request.extensions_mut().insert(CurrentSession(claims));
    let mut response = next.run(request).await;

    // A handler that wrote its own auth cookie wins: appending the rotated
    // token after logout's clearing header would hand the session right back.
    let handler_set_auth_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(is_auth_cookie);

    if !handler_set_auth_cookie
        && let Ok(value) = HeaderValue::from_str(&cookie)
    {
        response.headers_mut().append(header::SET_COOKIE, value);
    }

    Ok(response)
}

/// Guard for login/registration: a syntactically present auth cookie means
/// "already logged in". Presence only, validity is irrelevant here.
pub async fn reject_authenticated(request: Request, next: Next) -> Result<Response, ApiError> {
    if auth_cookie_value(request.headers()).is_some() {
        return Err(ApiError::Unauthorized(AuthCause::AlreadyLoggedIn));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
/// Authenticate with email and password, set the session cookie on success.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let user = state
        .store
        .find_active_user_by_email(&payload.email)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?;

    // Unknown email, deactivated account and wrong password collapse into
    // one indistinguishable response so callers cannot enumerate users.
    let Some(user) = user else {
        return Err(ApiError::Unauthorized(AuthCause::InvalidCredentials));
    };

    let is_valid = state
        .store
        .verify_password(&payload.password, &user.password_hash)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e}")))?;

    if !is_valid {
        return Err(ApiError::Unauthorized(AuthCause::InvalidCredentials));
    }

    let (_, cookie) = issue_session(&state, user.id).await?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse { user: user.into() }),
    ))
}

/// POST /auth/register
/// Create an account and log it in straight away.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_name(&payload.name)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let taken = state
        .store
        .email_exists(&payload.email)
        .await
        .map_err(|e| ApiError::internal(format!("Registration error: {e}")))?;

    if taken {
        return Err(ApiError::Conflict("User already exists".to_string()));
    }

    // The probe above can race a concurrent registration; the insert's
    // unique constraint is the authority either way.
    let user = state
        .store
        .create_user(&payload.name, &payload.email, &payload.password)
        .await
        .map_err(|e| match e {
            CreateUserError::EmailTaken => ApiError::Conflict("User already exists".to_string()),
            CreateUserError::Other(e) => {
                ApiError::internal(format!("Failed to create user: {e}"))
            }
        })?;

    tracing::info!("Registered user {}", user.id);

    let (_, cookie) = issue_session(&state, user.id).await?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse { user: user.into() }),
    ))
}

/// POST /auth/logout
/// Clear the stored refresh token and the cookie. No blacklist needed: with
/// the refresh token gone, nothing can mint a new access token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .set_refresh_token(session.0.sub, None)
        .await
        .map_err(|e| ApiError::internal(format!("Logout error: {e}")))?;

    Ok((
        [(header::SET_COOKIE, clear_auth_cookie())],
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// GET /auth/current-user
pub async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<CurrentSession>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .store
        .find_active_user_by_id(session.0.sub)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to get user: {e}")))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse { user: user.into() }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Issue a fresh token pair, persist the refresh token (rotation) and build
/// the access-token cookie.
async fn issue_session(state: &AppState, user_id: Uuid) -> Result<(Claims, String), ApiError> {
    let pair = state
        .tokens
        .issue(user_id, Utc::now())
        .map_err(|e| ApiError::internal(format!("Failed to issue tokens: {e}")))?;

    state
        .store
        .set_refresh_token(user_id, Some(pair.refresh.clone()))
        .await
        .map_err(|e| ApiError::internal(format!("Failed to persist refresh token: {e}")))?;

    let cookie = set_auth_cookie(&pair.access, state.config.jwt_expiration_minutes * 60);

    Ok((
        Claims {
            sub: user_id,
            exp: pair.access_exp,
        },
        cookie,
    ))
}
