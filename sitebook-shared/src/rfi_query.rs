/// Filtering and sorting for RFI lists
///
/// Project RFI lists are small, so the API loads them whole and narrows them
/// here rather than building dynamic SQL.
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use sitebook_shared::models::rfi::{Rfi, RfiStatus};
/// use sitebook_shared::rfi_query::{apply, RfiFilter, RfiSort, RfiSortField};
///
/// # fn example(rfis: Vec<Rfi>) {
/// let filter = RfiFilter {
///     status: Some(RfiStatus::Open),
///     search: Some("footing".to_string()),
///     ..Default::default()
/// };
/// let sort = RfiSort { field: RfiSortField::DueDate, descending: false };
/// let open = apply(rfis, &filter, sort, Utc::now().date_naive());
/// # }
/// ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::models::rfi::{Rfi, RfiPriority, RfiStatus};

/// Criteria an RFI must meet to be listed; unset fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfiFilter {
    pub status: Option<RfiStatus>,
    pub priority: Option<RfiPriority>,
    pub assigned_to: Option<Uuid>,

    /// Case-insensitive substring of the number, subject or question
    pub search: Option<String>,

    #[serde(default)]
    pub overdue_only: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfiSortField {
    #[default]
    Number,
    DueDate,
    CreatedAt,
    Priority,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfiSort {
    pub field: RfiSortField,
    #[serde(default)]
    pub descending: bool,
}

/// Open and past its due date
pub fn is_overdue(rfi: &Rfi, today: NaiveDate) -> bool {
    rfi.status == RfiStatus::Open && rfi.due_date.is_some_and(|due| due < today)
}

impl RfiFilter {
    pub fn matches(&self, rfi: &Rfi, today: NaiveDate) -> bool {
        if self.status.is_some_and(|s| s != rfi.status) {
            return false;
        }
        if self.priority.is_some_and(|p| p != rfi.priority) {
            return false;
        }
        if self.assigned_to.is_some() && self.assigned_to != rfi.assigned_to {
            return false;
        }
        if self.overdue_only && !is_overdue(rfi, today) {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [&rfi.rfi_number, &rfi.subject, &rfi.question]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }
}

impl RfiSort {
    /// Orders two RFIs; missing due dates go last in either direction
    pub fn compare(&self, a: &Rfi, b: &Rfi) -> Ordering {
        let primary = match self.field {
            RfiSortField::Number => Ordering::Equal,
            RfiSortField::CreatedAt => self.directed(a.created_at.cmp(&b.created_at)),
            RfiSortField::Priority => self.directed(a.priority.cmp(&b.priority)),
            RfiSortField::DueDate => match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => self.directed(x.cmp(&y)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };

        primary.then_with(|| {
            let by_number = compare_numbers(&a.rfi_number, &b.rfi_number);
            if self.field == RfiSortField::Number {
                self.directed(by_number)
            } else {
                by_number
            }
        })
    }

    fn directed(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Compares `RFI-00012` style numbers by their trailing digits, then as text
fn compare_numbers(a: &str, b: &str) -> Ordering {
    fn trailing_digits(s: &str) -> Option<u64> {
        let start = s
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i)?;
        s[start..].parse().ok()
    }

    match (trailing_digits(a), trailing_digits(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Filters then sorts
pub fn apply(rfis: Vec<Rfi>, filter: &RfiFilter, sort: RfiSort, today: NaiveDate) -> Vec<Rfi> {
    let mut out: Vec<Rfi> = rfis
        .into_iter()
        .filter(|rfi| filter.matches(rfi, today))
        .collect();
    out.sort_by(|a, b| sort.compare(a, b));
    out
}
