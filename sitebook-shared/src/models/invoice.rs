/// Invoices and their totals
///
/// An invoice carries its line items as JSONB and stores the computed
/// `subtotal`, `tax_amount` and `total` alongside them. Totals are always
/// recomputed from the items in [`compute_totals`]; clients never send them.
///
/// ```text
/// draft → sent → paid
/// draft → paid
/// draft | sent → void
/// ```
///
/// Only drafts may have their content edited.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invoice_status AS ENUM ('draft', 'sent', 'paid', 'void');
///
/// CREATE TABLE invoices (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     project_id UUID REFERENCES projects(id) ON DELETE SET NULL,
///     invoice_number VARCHAR(40) NOT NULL,
///     bill_to_name VARCHAR(255) NOT NULL,
///     bill_to_email VARCHAR(255),
///     status invoice_status NOT NULL DEFAULT 'draft',
///     line_items JSONB NOT NULL DEFAULT '[]',
///     tax_rate_id UUID REFERENCES tax_rates(id) ON DELETE SET NULL,
///     tax_rate NUMERIC(6, 3) NOT NULL DEFAULT 0,
///     subtotal NUMERIC(14, 2) NOT NULL DEFAULT 0,
///     tax_amount NUMERIC(14, 2) NOT NULL DEFAULT 0,
///     total NUMERIC(14, 2) NOT NULL DEFAULT 0,
///     issue_date DATE NOT NULL DEFAULT CURRENT_DATE,
///     due_date DATE,
///     notes TEXT,
///     sent_at TIMESTAMPTZ,
///     paid_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT invoices_number_unique UNIQUE (org_id, invoice_number)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::tax_rate::TaxRate;
use crate::numbering::{reserve_in_transaction, DocumentType, NumberingError};

/// Error type for invoice operations
#[derive(Debug, thiserror::Error)]
pub enum InvoiceError {
    #[error("Invoice not found")]
    NotFound,

    #[error("Tax rate {0} not found")]
    UnknownTaxRate(Uuid),

    #[error("Invoice is {0:?}; only drafts can be edited")]
    NotEditable(InvoiceStatus),

    #[error("Cannot move invoice from {from:?} to {to:?}")]
    InvalidTransition { from: InvoiceStatus, to: InvoiceStatus },

    #[error("Invoice total exceeds the largest storable amount")]
    AmountOutOfRange,

    #[error(transparent)]
    Numbering(#[from] NumberingError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn can_transition_to(&self, target: InvoiceStatus) -> bool {
        matches!(
            (self, target),
            (InvoiceStatus::Draft, InvoiceStatus::Sent)
                | (InvoiceStatus::Draft, InvoiceStatus::Paid)
                | (InvoiceStatus::Sent, InvoiceStatus::Paid)
                | (InvoiceStatus::Draft, InvoiceStatus::Void)
                | (InvoiceStatus::Sent, InvoiceStatus::Void)
        )
    }
}

/// One billed line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl LineItem {
    /// `quantity × unit_price`, or `None` when the product overflows
    pub fn amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }
}

/// Largest value the money columns hold (`NUMERIC(14, 2)`)
pub fn max_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Largest quantity accepted on one line
pub fn max_quantity() -> Decimal {
    Decimal::from(1_000_000)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal, tax at `tax_rate` percent, and total, each to cents
///
/// Fails with [`InvoiceError::AmountOutOfRange`] when any step overflows or
/// the total does not fit the money columns.
pub fn compute_totals(items: &[LineItem], tax_rate: Decimal) -> Result<InvoiceTotals, InvoiceError> {
    let mut subtotal = Decimal::ZERO;
    for item in items {
        subtotal = item
            .amount()
            .and_then(|amount| subtotal.checked_add(amount))
            .ok_or(InvoiceError::AmountOutOfRange)?;
    }
    let subtotal = round_money(subtotal);

    let tax_amount = subtotal
        .checked_mul(tax_rate)
        .map(|tax| round_money(tax / Decimal::ONE_HUNDRED))
        .ok_or(InvoiceError::AmountOutOfRange)?;
    let total = subtotal
        .checked_add(tax_amount)
        .ok_or(InvoiceError::AmountOutOfRange)?;

    if total > max_amount() {
        return Err(InvoiceError::AmountOutOfRange);
    }

    Ok(InvoiceTotals {
        subtotal,
        tax_amount,
        total,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub project_id: Option<Uuid>,
    pub invoice_number: String,
    pub bill_to_name: String,
    pub bill_to_email: Option<String>,
    pub status: InvoiceStatus,
    pub line_items: Json<Vec<LineItem>>,
    pub tax_rate_id: Option<Uuid>,

    /// Percent copied from the tax rate when the invoice was last edited
    pub tax_rate: Decimal,

    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub project_id: Option<Uuid>,
    pub bill_to_name: String,
    pub bill_to_email: Option<String>,
    pub line_items: Vec<LineItem>,

    /// Falls back to the organization's default rate when absent
    pub tax_rate_id: Option<Uuid>,

    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub bill_to_name: Option<String>,
    pub bill_to_email: Option<String>,
    pub line_items: Option<Vec<LineItem>>,
    pub tax_rate_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<InvoiceStatus>,
}

impl UpdateInvoice {
    fn touches_content(&self) -> bool {
        self.bill_to_name.is_some()
            || self.bill_to_email.is_some()
            || self.line_items.is_some()
            || self.tax_rate_id.is_some()
            || self.due_date.is_some()
            || self.notes.is_some()
    }
}

const COLUMNS: &str = "id, org_id, project_id, invoice_number, bill_to_name, bill_to_email, \
                       status, line_items, tax_rate_id, tax_rate, subtotal, tax_amount, total, \
                       issue_date, due_date, notes, sent_at, paid_at, created_at, updated_at";

async fn resolve_tax_rate(
    conn: &mut PgConnection,
    org_id: Uuid,
    tax_rate_id: Option<Uuid>,
) -> Result<Option<TaxRate>, InvoiceError> {
    match tax_rate_id {
        Some(id) => TaxRate::find(&mut *conn, org_id, id)
            .await?
            .map(Some)
            .ok_or(InvoiceError::UnknownTaxRate(id)),
        None => Ok(TaxRate::find_default(&mut *conn, org_id).await?),
    }
}

async fn lock_invoice(
    conn: &mut PgConnection,
    org_id: Uuid,
    id: Uuid,
) -> Result<Invoice, InvoiceError> {
    sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {COLUMNS} FROM invoices WHERE org_id = $1 AND id = $2 FOR UPDATE"
    ))
    .bind(org_id)
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or(InvoiceError::NotFound)
}

impl Invoice {
    /// Numbers, prices and inserts an invoice in one transaction
    pub async fn create(pool: &PgPool, org_id: Uuid, data: CreateInvoice) -> Result<Self, InvoiceError> {
        let mut tx = pool.begin().await?;

        let tax = resolve_tax_rate(&mut tx, org_id, data.tax_rate_id).await?;
        let rate = tax.as_ref().map_or(Decimal::ZERO, |t| t.rate);
        let totals = compute_totals(&data.line_items, rate)?;

        let invoice_number = reserve_in_transaction(&mut tx, org_id, DocumentType::Invoice).await?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "INSERT INTO invoices
                 (org_id, project_id, invoice_number, bill_to_name, bill_to_email, line_items,
                  tax_rate_id, tax_rate, subtotal, tax_amount, total, issue_date, due_date, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, COALESCE($12, CURRENT_DATE), $13, $14)
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(data.project_id)
        .bind(&invoice_number)
        .bind(data.bill_to_name)
        .bind(data.bill_to_email)
        .bind(Json(&data.line_items))
        .bind(tax.as_ref().map(|t| t.id))
        .bind(rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(data.issue_date)
        .bind(data.due_date)
        .bind(data.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(invoice)
    }

    pub async fn find(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {COLUMNS} FROM invoices WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        org_id: Uuid,
        status: Option<InvoiceStatus>,
        project_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {COLUMNS} FROM invoices
             WHERE org_id = $1
               AND ($2::invoice_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR project_id = $3)
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(org_id)
        .bind(status)
        .bind(project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Invoices a client may see: everything on the project except drafts
    pub async fn list_for_portal(
        pool: &PgPool,
        org_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {COLUMNS} FROM invoices
             WHERE org_id = $1 AND project_id = $2 AND status <> 'draft'
             ORDER BY issue_date DESC"
        ))
        .bind(org_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Edits a draft and/or moves the invoice to a new status
    pub async fn update(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateInvoice,
    ) -> Result<Self, InvoiceError> {
        let mut tx = pool.begin().await?;
        let current = lock_invoice(&mut tx, org_id, id).await?;

        if data.touches_content() && current.status != InvoiceStatus::Draft {
            return Err(InvoiceError::NotEditable(current.status));
        }

        let status = match data.status {
            Some(target) if target != current.status => {
                if !current.status.can_transition_to(target) {
                    return Err(InvoiceError::InvalidTransition {
                        from: current.status,
                        to: target,
                    });
                }
                target
            }
            _ => current.status,
        };

        let (tax_rate_id, tax_rate) = match data.tax_rate_id {
            Some(new_id) => {
                let tax = resolve_tax_rate(&mut tx, org_id, Some(new_id)).await?;
                (Some(new_id), tax.map_or(Decimal::ZERO, |t| t.rate))
            }
            None => (current.tax_rate_id, current.tax_rate),
        };

        let items = data.line_items.unwrap_or(current.line_items.0);
        let totals = compute_totals(&items, tax_rate)?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices
             SET bill_to_name = COALESCE($3, bill_to_name),
                 bill_to_email = COALESCE($4, bill_to_email),
                 line_items = $5,
                 tax_rate_id = $6,
                 tax_rate = $7,
                 subtotal = $8,
                 tax_amount = $9,
                 total = $10,
                 due_date = COALESCE($11, due_date),
                 notes = COALESCE($12, notes),
                 status = $13,
                 sent_at = CASE WHEN $13 = 'sent' AND sent_at IS NULL THEN NOW() ELSE sent_at END,
                 paid_at = CASE WHEN $13 = 'paid' AND paid_at IS NULL THEN NOW() ELSE paid_at END,
                 updated_at = NOW()
             WHERE org_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(data.bill_to_name)
        .bind(data.bill_to_email)
        .bind(Json(&items))
        .bind(tax_rate_id)
        .bind(tax_rate)
        .bind(totals.subtotal)
        .bind(totals.tax_amount)
        .bind(totals.total)
        .bind(data.due_date)
        .bind(data.notes)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(invoice)
    }

    /// Moves a draft to `sent`; already-sent invoices are returned as is
    pub async fn mark_sent(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<Self, InvoiceError> {
        let update = UpdateInvoice {
            status: Some(InvoiceStatus::Sent),
            ..Default::default()
        };
        Self::update(pool, org_id, id, update).await
    }

    /// Deletes a draft or void invoice
    pub async fn delete(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, InvoiceError> {
        let mut tx = pool.begin().await?;
        let current = match lock_invoice(&mut tx, org_id, id).await {
            Ok(invoice) => invoice,
            Err(InvoiceError::NotFound) => return Ok(false),
            Err(e) => return Err(e),
        };

        if matches!(current.status, InvoiceStatus::Sent | InvoiceStatus::Paid) {
            return Err(InvoiceError::NotEditable(current.status));
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(quantity: &str, unit_price: &str) -> LineItem {
        LineItem {
            description: "Drywall, 1/2in sheet".to_string(),
            quantity: d(quantity),
            unit_price: d(unit_price),
        }
    }

    #[test]
    fn test_totals_with_tax() {
        let items = vec![item("10", "12.50"), item("2.5", "80")];
        let totals = compute_totals(&items, d("8.25")).unwrap();

        assert_eq!(totals.subtotal, d("325.00"));
        assert_eq!(totals.tax_amount, d("26.81"));
        assert_eq!(totals.total, d("351.81"));
    }

    #[test]
    fn test_totals_without_items_or_tax() {
        let totals = compute_totals(&[], d("7")).unwrap();
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);

        let untaxed = compute_totals(&[item("3", "33.333")], Decimal::ZERO).unwrap();
        assert_eq!(untaxed.subtotal, d("100.00"));
        assert_eq!(untaxed.tax_amount, Decimal::ZERO);
    }

    #[test]
    fn test_status_transitions() {
        assert!(InvoiceStatus::Draft.can_transition_to(InvoiceStatus::Sent));
        assert!(InvoiceStatus::Sent.can_transition_to(InvoiceStatus::Paid));
        assert!(InvoiceStatus::Sent.can_transition_to(InvoiceStatus::Void));
        assert!(!InvoiceStatus::Paid.can_transition_to(InvoiceStatus::Void));
        assert!(!InvoiceStatus::Void.can_transition_to(InvoiceStatus::Draft));
        assert!(!InvoiceStatus::Sent.can_transition_to(InvoiceStatus::Draft));
    }

    #[test]
    fn test_status_only_update_does_not_touch_content() {
        let update = UpdateInvoice {
            status: Some(InvoiceStatus::Paid),
            ..Default::default()
        };
        assert!(!update.touches_content());

        let update = UpdateInvoice {
            notes: Some("Net 30".to_string()),
            ..Default::default()
        };
        assert!(update.touches_content());
    }

    #[test]
    fn test_line_items_round_trip_as_json() {
        let json = serde_json::json!([{"description": "Labor", "quantity": "8", "unit_price": "65"}]);
        let items: Vec<LineItem> = serde_json::from_value(json).unwrap();
        assert_eq!(items[0].amount(), Some(d("520")));
    }

    #[test]
    fn test_overflowing_line_item_is_rejected() {
        let huge = item("1000000000000000", "1000000000000000");
        assert_eq!(huge.amount(), None);
        assert!(matches!(
            compute_totals(&[huge], d("8")),
            Err(InvoiceError::AmountOutOfRange)
        ));

        let many = vec![item("1", &Decimal::MAX.to_string()), item("1", "1")];
        assert!(matches!(
            compute_totals(&many, Decimal::ZERO),
            Err(InvoiceError::AmountOutOfRange)
        ));
    }

    #[test]
    fn test_total_must_fit_money_columns() {
        let at_limit = compute_totals(&[item("1", "999999999999.99")], Decimal::ZERO).unwrap();
        assert_eq!(at_limit.total, max_amount());

        // Tax pushes the total past the column
        assert!(matches!(
            compute_totals(&[item("1", "999999999999.99")], d("1")),
            Err(InvoiceError::AmountOutOfRange)
        ));
        assert!(matches!(
            compute_totals(&[item("1000000", "1000000000")], Decimal::ZERO),
            Err(InvoiceError::AmountOutOfRange)
        ));
    }
}
