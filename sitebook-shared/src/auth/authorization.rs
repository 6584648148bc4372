/// Role-based authorization
///
/// Every staff operation requires a minimum [`MembershipRole`] within the
/// caller's organization. The staff hierarchy is
/// `Owner > Admin > Manager > Worker`. `Client` sits outside it: clients pass
/// no staff check and are admitted only by [`require_client`] on portal
/// routes.
///
/// # Example
///
/// ```no_run
/// use sitebook_shared::auth::authorization::{require_permission, ResourcePermission};
/// use sitebook_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), Box<dyn std::error::Error>> {
/// // Managers and above may edit projects
/// require_permission(&pool, &auth, ResourcePermission::Manage).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::membership::{Membership, MembershipRole};

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the organization
    #[error("Not a member of organization {0}")]
    NotMember(Uuid),

    /// User doesn't have the required role
    #[error("Insufficient permissions: requires {required:?}, has {actual:?}")]
    InsufficientRole {
        required: MembershipRole,
        actual: MembershipRole,
    },

    /// Operation is limited to the record's owner
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Permission levels mapped onto minimum roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePermission {
    /// View organization data (Worker+)
    Read,

    /// Field work: tasks, own timesheets, RFIs, messages (Worker+)
    Contribute,

    /// Projects, bids, invoices, approvals (Manager+)
    Manage,

    /// Organization settings, members, numbering, tax (Admin+)
    Administer,

    /// Ownership transfer and organization deletion (Owner)
    Own,
}

impl ResourcePermission {
    /// Gets the minimum role required for this permission
    pub fn min_role(&self) -> MembershipRole {
        match self {
            ResourcePermission::Read | ResourcePermission::Contribute => MembershipRole::Worker,
            ResourcePermission::Manage => MembershipRole::Manager,
            ResourcePermission::Administer => MembershipRole::Admin,
            ResourcePermission::Own => MembershipRole::Owner,
        }
    }
}

/// Loads the caller's role, failing if they are not a member
pub async fn current_role(pool: &PgPool, auth: &AuthContext) -> Result<MembershipRole, AuthzError> {
    Membership::get_role(pool, auth.org_id, auth.user_id)
        .await?
        .ok_or(AuthzError::NotMember(auth.org_id))
}

/// Checks a role against a required minimum without touching the database
pub fn check_role(actual: MembershipRole, required: MembershipRole) -> Result<(), AuthzError> {
    if actual.has_permission(&required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

/// Requires at least `required_role` in the caller's organization
///
/// Returns the caller's actual role so handlers can branch on it (for
/// example, managers see every timesheet, workers only their own).
pub async fn require_role(
    pool: &PgPool,
    auth: &AuthContext,
    required_role: MembershipRole,
) -> Result<MembershipRole, AuthzError> {
    let role = current_role(pool, auth).await?;
    check_role(role, required_role)?;
    Ok(role)
}

/// Requires the role backing `permission`
pub async fn require_permission(
    pool: &PgPool,
    auth: &AuthContext,
    permission: ResourcePermission,
) -> Result<MembershipRole, AuthzError> {
    require_role(pool, auth, permission.min_role()).await
}

/// Allows the record's owner, or anyone holding `permission`
pub async fn require_owner_or(
    pool: &PgPool,
    auth: &AuthContext,
    owner_id: Uuid,
    permission: ResourcePermission,
) -> Result<MembershipRole, AuthzError> {
    let role = current_role(pool, auth).await?;

    if auth.user_id == owner_id && role.is_staff() {
        return Ok(role);
    }

    check_role(role, permission.min_role()).map_err(|_| AuthzError::NotAuthorized)?;
    Ok(role)
}

/// Requires the caller to be a portal client of the organization
pub async fn require_client(pool: &PgPool, auth: &AuthContext) -> Result<(), AuthzError> {
    let role = current_role(pool, auth).await?;

    if role != MembershipRole::Client {
        return Err(AuthzError::InsufficientRole {
            required: MembershipRole::Client,
            actual: role,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_permission_min_role() {
        assert_eq!(ResourcePermission::Read.min_role(), MembershipRole::Worker);
        assert_eq!(ResourcePermission::Contribute.min_role(), MembershipRole::Worker);
        assert_eq!(ResourcePermission::Manage.min_role(), MembershipRole::Manager);
        assert_eq!(ResourcePermission::Administer.min_role(), MembershipRole::Admin);
        assert_eq!(ResourcePermission::Own.min_role(), MembershipRole::Owner);
    }

    #[test]
    fn test_check_role_hierarchy() {
        assert!(check_role(MembershipRole::Owner, MembershipRole::Admin).is_ok());
        assert!(check_role(MembershipRole::Manager, MembershipRole::Manager).is_ok());
        assert!(check_role(MembershipRole::Worker, MembershipRole::Manager).is_err());
    }

    #[test]
    fn test_client_fails_every_staff_check() {
        for required in [
            MembershipRole::Worker,
            MembershipRole::Manager,
            MembershipRole::Admin,
            MembershipRole::Owner,
        ] {
            assert!(matches!(
                check_role(MembershipRole::Client, required),
                Err(AuthzError::InsufficientRole { .. })
            ));
        }
    }

    #[test]
    fn test_authz_error_display() {
        assert!(AuthzError::NotMember(Uuid::new_v4()).to_string().contains("Not a member"));
        assert!(AuthzError::NotAuthorized.to_string().contains("Not authorized"));
    }
}
