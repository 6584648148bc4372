/// Organization members
///
/// - `GET /v1/members` (worker)
/// - `POST /v1/members` (admin): add an existing user by email, or create the
///   user when a password is supplied
/// - `PATCH /v1/members/:user_id` (admin): role and hourly rate
/// - `DELETE /v1/members/:user_id` (admin)
///
/// Only owners may grant or revoke the owner role, and the last owner can be
/// neither demoted nor removed.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_at_most, ensure_non_negative},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
        password,
    },
    models::{
        activity::{self, NewActivity},
        membership::{CreateMembership, MemberDetails, Membership, MembershipRole, UpdateMembership},
        user::{CreateUser, User},
    },
    payroll::max_hourly_rate,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[serde(default = "default_role")]
    pub role: MembershipRole,

    pub hourly_rate: Option<Decimal>,

    /// Required only when no user with this email exists yet
    pub password: Option<String>,
}

fn default_role() -> MembershipRole {
    MembershipRole::Worker
}

/// Distinguishes an absent field from an explicit `null`
fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: Option<MembershipRole>,

    /// `null` clears the rate
    #[serde(default, deserialize_with = "explicit_null")]
    pub hourly_rate: Option<Option<Decimal>>,
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<MemberDetails>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    Ok(Json(Membership::list_by_org(&state.db, auth.org_id).await?))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    req.validate()?;
    ensure_non_negative("hourly_rate", req.hourly_rate)?;
    ensure_at_most("hourly_rate", req.hourly_rate, max_hourly_rate())?;
    if let Some(pw) = &req.password {
        password::validate_password_strength(pw).map_err(|m| ApiError::invalid("password", m))?;
    }

    let caller_role = require_permission(&state.db, &auth, ResourcePermission::Administer).await?;
    if req.role == MembershipRole::Owner && caller_role != MembershipRole::Owner {
        return Err(ApiError::Forbidden("Only owners can add owners".to_string()));
    }

    let user = match User::find_by_email(&state.db, req.email.trim()).await? {
        Some(user) => user,
        None => {
            let pw = req.password.as_deref().ok_or_else(|| {
                ApiError::NotFound("No user with that email; supply a password to create one".to_string())
            })?;
            User::create(
                &state.db,
                CreateUser {
                    email: req.email.trim().to_string(),
                    password_hash: password::hash_password(pw)?,
                    name: req.name.clone(),
                },
            )
            .await?
        }
    };

    if Membership::find(&state.db, auth.org_id, user.id).await?.is_some() {
        return Err(ApiError::Conflict("User is already a member".to_string()));
    }

    let membership = Membership::create(
        &state.db,
        CreateMembership {
            org_id: auth.org_id,
            user_id: user.id,
            role: req.role,
            hourly_rate: req.hourly_rate,
        },
    )
    .await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "member.added", "member")
            .entity(user.id)
            .details(serde_json::json!({ "role": membership.role })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(membership)))
}

async fn ensure_not_last_owner(pool: &PgPool, org_id: Uuid, target: &Membership) -> ApiResult<()> {
    if target.role == MembershipRole::Owner && Membership::count_owners(pool, org_id).await? <= 1 {
        return Err(ApiError::Conflict(
            "An organization must keep at least one owner".to_string(),
        ));
    }
    Ok(())
}

pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<Membership>> {
    ensure_non_negative("hourly_rate", req.hourly_rate.flatten())?;
    ensure_at_most("hourly_rate", req.hourly_rate.flatten(), max_hourly_rate())?;

    let caller_role = require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let target = Membership::find(&state.db, auth.org_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;

    if let Some(role) = req.role {
        let touches_owner = role == MembershipRole::Owner || target.role == MembershipRole::Owner;
        if touches_owner && caller_role != MembershipRole::Owner && role != target.role {
            return Err(ApiError::Forbidden("Only owners can change owner roles".to_string()));
        }
        if role != MembershipRole::Owner {
            ensure_not_last_owner(&state.db, auth.org_id, &target).await?;
        }
    }

    let updated = Membership::update(
        &state.db,
        auth.org_id,
        user_id,
        UpdateMembership {
            role: req.role,
            hourly_rate: req.hourly_rate,
        },
    )
    .await?
    .ok_or_else(|| ApiError::not_found("Member"))?;

    if req.role.is_some_and(|r| r != target.role) {
        activity::record(
            &state.db,
            NewActivity::new(auth.org_id, auth.user_id, "member.role_changed", "member")
                .entity(user_id)
                .details(serde_json::json!({ "from": target.role, "to": updated.role })),
        )
        .await;
    }

    Ok(Json(updated))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let caller_role = require_permission(&state.db, &auth, ResourcePermission::Administer).await?;

    let target = Membership::find(&state.db, auth.org_id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;

    if target.role == MembershipRole::Owner && caller_role != MembershipRole::Owner {
        return Err(ApiError::Forbidden("Only owners can remove owners".to_string()));
    }
    ensure_not_last_owner(&state.db, auth.org_id, &target).await?;

    Membership::delete(&state.db, auth.org_id, user_id).await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "member.removed", "member").entity(user_id),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let absent: UpdateMemberRequest = serde_json::from_str(r#"{"role":"manager"}"#).unwrap();
        assert_eq!(absent.hourly_rate, None);

        let cleared: UpdateMemberRequest = serde_json::from_str(r#"{"hourly_rate":null}"#).unwrap();
        assert_eq!(cleared.hourly_rate, Some(None));

        let set: UpdateMemberRequest = serde_json::from_str(r#"{"hourly_rate":"42.50"}"#).unwrap();
        assert_eq!(set.hourly_rate, Some(Some(Decimal::new(4250, 2))));
    }

    #[test]
    fn test_add_member_defaults_to_worker() {
        let req: AddMemberRequest = serde_json::from_str(r#"{"email":"crew@northwind.build"}"#).unwrap();
        assert_eq!(req.role, MembershipRole::Worker);
        assert!(req.validate().is_ok());
    }
}
