/// Error handling for the API server
///
/// Every handler returns [`ApiResult`]. Library errors convert into
/// [`ApiError`] with `?`, and each variant maps to one status code and a JSON
/// body of the form `{ "error", "message", "details"? }`.
///
/// # Example
///
/// ```
/// use sitebook_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(id: Option<u32>) -> ApiResult<Json<Value>> {
///     let id = id.ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
///     Ok(Json(json!({ "id": id })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError},
    mailer::MailError,
    models::invoice::InvoiceError,
    numbering::NumberingError,
    payroll::PayrollError,
};
use sqlx::error::ErrorKind;
use std::fmt;
use validator::ValidationErrors;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or document number
    Conflict(String),

    /// Unprocessable entity (422)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// SQLSTATE 22003: a value does not fit its `NUMERIC` column
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// Client-caused data errors that `ErrorKind` leaves as `Other`
fn classify_sqlstate(code: Option<&str>) -> Option<ApiError> {
    match code {
        Some(NUMERIC_VALUE_OUT_OF_RANGE) => {
            Some(ApiError::BadRequest("Numeric value out of range".to_string()))
        }
        _ => None,
    }
}

/// Classifies database errors by constraint kind
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(mapped) = classify_sqlstate(db_err.code().as_deref()) {
                    return mapped;
                }
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        if constraint.contains("email") {
                            ApiError::Conflict("Email already exists".to_string())
                        } else {
                            ApiError::Conflict(format!("Duplicate value violates {}", constraint))
                        }
                    }
                    ErrorKind::ForeignKeyViolation => {
                        ApiError::BadRequest(format!("Referenced record does not exist ({})", constraint))
                    }
                    ErrorKind::CheckViolation => {
                        ApiError::BadRequest(format!("Value out of range ({})", constraint))
                    }
                    ErrorKind::NotNullViolation => {
                        ApiError::BadRequest("A required field is missing".to_string())
                    }
                    _ => ApiError::InternalError(format!("Database error: {}", db_err)),
                }
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is unavailable".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => {
                ApiError::Forbidden("Not a member of this organization".to_string())
            }
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::NotAuthorized => {
                ApiError::Forbidden("Not authorized to access this resource".to_string())
            }
            AuthzError::DatabaseError(err) => err.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token creation failed: {}", msg)),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<NumberingError> for ApiError {
    fn from(err: NumberingError) -> Self {
        match err {
            NumberingError::UnknownDocumentType(t) => {
                ApiError::NotFound(format!("Unknown document type: {}", t))
            }
            NumberingError::InvalidConfig(msg) => ApiError::invalid("numbering", msg),
            NumberingError::Database(err) => err.into(),
        }
    }
}

impl From<PayrollError> for ApiError {
    fn from(err: PayrollError) -> Self {
        match err {
            PayrollError::NegativeHours => ApiError::invalid("hours", err.to_string()),
            PayrollError::NegativeRate => ApiError::invalid("hourly_rate", err.to_string()),
            PayrollError::InvalidConfig(msg) => ApiError::invalid("config", msg),
            PayrollError::Overflow => ApiError::invalid("total_hours", err.to_string()),
        }
    }
}

impl From<InvoiceError> for ApiError {
    fn from(err: InvoiceError) -> Self {
        match err {
            InvoiceError::NotFound => ApiError::not_found("Invoice"),
            InvoiceError::UnknownTaxRate(_) => ApiError::invalid("tax_rate_id", err.to_string()),
            InvoiceError::NotEditable(_) | InvoiceError::InvalidTransition { .. } => {
                ApiError::Conflict(err.to_string())
            }
            InvoiceError::AmountOutOfRange => ApiError::invalid("line_items", err.to_string()),
            InvoiceError::Numbering(err) => err.into(),
            InvoiceError::Database(err) => err.into(),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::NotConfigured => {
                ApiError::ServiceUnavailable("Email is not configured".to_string())
            }
            other => ApiError::ServiceUnavailable(format!("Email delivery failed: {}", other)),
        }
    }
}
