/// Authentication endpoints
///
/// - `POST /v1/auth/register`: create a user, their organization and an
///   owner membership in one transaction
/// - `POST /v1/auth/login`: exchange credentials for a token pair bound to
///   the user's first organization
/// - `POST /v1/auth/refresh`: exchange a refresh token for a new access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{jwt, password},
    models::{
        membership::{CreateMembership, Membership, MembershipRole},
        organization::{CreateOrganization, Organization},
        user::{CreateUser, User},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength is checked separately by the password policy
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Company name must be 1-200 characters"))]
    pub company_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Returned by register and login
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// `POST /v1/auth/register`
///
/// # Errors
///
/// - `422`: validation failed or weak password
/// - `409`: email already registered
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid("password", message))?;

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name.clone(),
        },
    )
    .await?;

    let org = Organization::create(
        &mut *tx,
        CreateOrganization {
            name: req.company_name.trim().to_string(),
        },
    )
    .await?;

    Membership::create(
        &mut *tx,
        CreateMembership {
            org_id: org.id,
            user_id: user.id,
            role: MembershipRole::Owner,
            hourly_rate: None,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, org_id = %org.id, "Registered user and organization");

    let (access_token, refresh_token) = jwt::issue_token_pair(user.id, org.id, state.jwt_secret())?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            user_id: user.id,
            org_id: org.id,
            access_token,
            refresh_token,
        }),
    ))
}

/// `POST /v1/auth/login`
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(invalid());
    }

    let org_id = Membership::list_by_user(&state.db, user.id)
        .await?
        .first()
        .map(|m| m.org_id)
        .ok_or_else(|| ApiError::Forbidden("User does not belong to any organization".to_string()))?;

    User::update_last_login(&state.db, user.id).await?;

    let (access_token, refresh_token) = jwt::issue_token_pair(user.id, org_id, state.jwt_secret())?;

    Ok(Json(TokenResponse {
        user_id: user.id,
        org_id,
        access_token,
        refresh_token,
    }))
}

/// `POST /v1/auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "rebar2026".to_string(),
            name: None,
            company_name: String::new(),
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("company_name"));
    }

    #[test]
    fn test_login_request_requires_password() {
        let req = LoginRequest {
            email: "pm@northwind.build".to_string(),
            password: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
