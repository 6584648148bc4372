/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected", "pending_migrations": 0 }
/// ```
///
/// Always answers 200. A database outage shows up as `"degraded"`, and
/// unapplied migrations as `"migrations_pending"`.

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use sitebook_shared::db::{migrations::get_migration_status, pool};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,

    /// Absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_migrations: Option<usize>,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    if let Err(e) = pool::health_check(&state.db).await {
        tracing::warn!(error = %e, "Health check could not reach the database");
        return Json(HealthResponse {
            status: "degraded".to_string(),
            version: sitebook_shared::VERSION.to_string(),
            database: "disconnected".to_string(),
            pending_migrations: None,
        });
    }

    let pending = match get_migration_status(&state.db).await {
        Ok(status) => Some(status.pending.len()),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read migration status");
            None
        }
    };

    let status = match pending {
        Some(0) => "healthy",
        Some(_) => "migrations_pending",
        None => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: sitebook_shared::VERSION.to_string(),
        database: "connected".to_string(),
        pending_migrations: pending,
    })
}
