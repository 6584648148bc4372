//! # SiteBook Shared Library
//!
//! Shared types, persistence and business rules used by the SiteBook API
//! server.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, JWT tokens, request auth context, role checks
//! - `db`: Connection pool and migrations
//! - `models`: Tenant-scoped records and their SQL
//! - `numbering`: Per-organization document number reservation
//! - `payroll`: Overtime math, pay periods, payroll reports
//! - `templates`: `{{ variable }}` extraction and substitution
//! - `timefmt`: Relative time, date, currency and hours formatting
//! - `rfi_query`: RFI filtering and sorting
//! - `realtime`: Organization change feed over PostgreSQL `LISTEN/NOTIFY`
//! - `mailer`: Outbound email transport

pub mod auth;
pub mod db;
pub mod mailer;
pub mod models;
pub mod numbering;
pub mod payroll;
pub mod realtime;
pub mod rfi_query;
pub mod templates;
pub mod timefmt;

/// Current version of the SiteBook shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
