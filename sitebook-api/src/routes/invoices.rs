/// Invoices
///
/// All routes require manager.
///
/// - `GET /v1/invoices?status=&project_id=`
/// - `POST /v1/invoices`: numbered `INV-00001`, priced with the given tax
///   rate or the organization default
/// - `GET /v1/invoices/:id`
/// - `PATCH /v1/invoices/:id`: content edits on drafts only; status moves
///   follow draft → sent → paid, or void
/// - `DELETE /v1/invoices/:id`: drafts and void invoices only
/// - `POST /v1/invoices/:id/send`: marks the invoice sent and emails the
///   bill-to address when a mail transport is configured

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{ensure_at_most, ensure_date_order, ensure_not_blank, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sitebook_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    mailer::Email,
    models::{
        activity::{self, NewActivity},
        invoice::{max_amount, max_quantity, CreateInvoice, Invoice, InvoiceStatus, LineItem, UpdateInvoice},
        organization::Organization,
        project::Project,
    },
    timefmt::{format_currency, format_date},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub project_id: Option<Uuid>,

    #[validate(length(min = 1, max = 255, message = "Bill-to name must be 1-255 characters"))]
    pub bill_to_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub bill_to_email: Option<String>,

    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub line_items: Vec<LineItem>,

    pub tax_rate_id: Option<Uuid>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    pub status: Option<InvoiceStatus>,
    pub project_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SendInvoiceResponse {
    pub invoice: Invoice,

    /// False when mail is disabled, the invoice has no bill-to email, or
    /// delivery failed
    pub emailed: bool,
}

fn ensure_line_items(items: &[LineItem]) -> ApiResult<()> {
    for item in items {
        if item.description.trim().is_empty() {
            return Err(ApiError::invalid("line_items", "Line item description is required"));
        }
        if item.quantity.is_sign_negative() || item.unit_price.is_sign_negative() {
            return Err(ApiError::invalid(
                "line_items",
                "Line item quantity and unit price cannot be negative",
            ));
        }
        ensure_at_most("line_items", Some(item.quantity), max_quantity())?;
        ensure_at_most("line_items", Some(item.unit_price), max_amount())?;
    }
    Ok(())
}

/// Client-facing message for a sent invoice
fn invoice_email(invoice: &Invoice, org_name: &str) -> Option<Email> {
    let to = invoice.bill_to_email.clone()?;

    let mut body = format!(
        "Hello {},\n\n{} has sent you invoice {} for {}.\n",
        invoice.bill_to_name,
        org_name,
        invoice.invoice_number,
        format_currency(invoice.total),
    );
    body.push_str(&format!("\nIssued: {}\n", format_date(invoice.issue_date)));
    if let Some(due) = invoice.due_date {
        body.push_str(&format!("Due: {}\n", format_date(due)));
    }
    body.push('\n');
    for item in invoice.line_items.iter() {
        body.push_str(&format!(
            "  {} x {} @ {}\n",
            item.description,
            item.quantity.normalize(),
            format_currency(item.unit_price)
        ));
    }
    body.push_str(&format!(
        "\nSubtotal: {}\nTax: {}\nTotal: {}\n",
        format_currency(invoice.subtotal),
        format_currency(invoice.tax_amount),
        format_currency(invoice.total),
    ));

    Some(Email {
        to,
        subject: format!("Invoice {} from {}", invoice.invoice_number, org_name),
        body,
    })
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoices = Invoice::list(
        &state.db,
        auth.org_id,
        query.status,
        query.project_id,
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok(Json(invoices))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    req.validate()?;
    ensure_line_items(&req.line_items)?;
    ensure_date_order(req.issue_date, req.due_date)?;

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if let Some(project_id) = req.project_id {
        if !Project::exists(&state.db, auth.org_id, project_id).await? {
            return Err(ApiError::invalid("project_id", "project_id does not exist"));
        }
    }

    let invoice = Invoice::create(
        &state.db,
        auth.org_id,
        CreateInvoice {
            project_id: req.project_id,
            bill_to_name: req.bill_to_name.trim().to_string(),
            bill_to_email: req.bill_to_email.map(|e| e.to_lowercase()),
            line_items: req.line_items,
            tax_rate_id: req.tax_rate_id,
            issue_date: req.issue_date,
            due_date: req.due_date,
            notes: req.notes,
        },
    )
    .await?;

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "invoice.created", "invoice")
            .entity(invoice.id)
            .details(serde_json::json!({
                "invoice_number": invoice.invoice_number,
                "total": invoice.total,
            })),
    )
    .await;

    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Invoice>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoice = Invoice::find(&state.db, auth.org_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice"))?;

    Ok(Json(invoice))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateInvoice>,
) -> ApiResult<Json<Invoice>> {
    ensure_not_blank("bill_to_name", req.bill_to_name.as_deref())?;
    if let Some(items) = &req.line_items {
        if items.is_empty() {
            return Err(ApiError::invalid("line_items", "At least one line item is required"));
        }
        ensure_line_items(items)?;
    }

    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let status_change = req.status;
    let invoice = Invoice::update(&state.db, auth.org_id, id, req).await?;

    if let Some(status) = status_change {
        activity::record(
            &state.db,
            NewActivity::new(auth.org_id, auth.user_id, "invoice.status_changed", "invoice")
                .entity(invoice.id)
                .details(serde_json::json!({
                    "invoice_number": invoice.invoice_number,
                    "status": status,
                })),
        )
        .await;
    }

    Ok(Json(invoice))
}

pub async fn send_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SendInvoiceResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    let invoice = Invoice::mark_sent(&state.db, auth.org_id, id).await?;

    let org_name = Organization::find_by_id(&state.db, auth.org_id)
        .await?
        .map(|org| org.name)
        .unwrap_or_default();

    let emailed = match (&state.mailer, invoice_email(&invoice, &org_name)) {
        (Some(mailer), Some(email)) => match mailer.send(&email).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    invoice_id = %invoice.id,
                    error = %e,
                    "Invoice marked sent but email delivery failed"
                );
                false
            }
        },
        _ => false,
    };

    activity::record(
        &state.db,
        NewActivity::new(auth.org_id, auth.user_id, "invoice.sent", "invoice")
            .entity(invoice.id)
            .details(serde_json::json!({
                "invoice_number": invoice.invoice_number,
                "emailed": emailed,
            })),
    )
    .await;

    Ok(Json(SendInvoiceResponse { invoice, emailed }))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Invoice::delete(&state.db, auth.org_id, id).await? {
        return Err(ApiError::not_found("Invoice"));
    }

    Ok(StatusCode::NO_CONTENT)
}
