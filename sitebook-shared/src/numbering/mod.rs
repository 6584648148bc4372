/// Document auto-numbering
///
/// Each organization keeps one counter per document type in
/// `document_counters`. A reservation locks the counter row, hands out the
/// current value, and bumps it, so two concurrent callers never receive the
/// same number and numbers for a given `(org_id, doc_type)` only go up.
///
/// Formatting is pure and lives here; persistence lives in [`store`].
///
/// # Example
///
/// ```
/// use sitebook_shared::numbering::{format_document_number, DocumentType, NumberingConfig};
///
/// let config = NumberingConfig::for_type(DocumentType::Invoice);
/// assert_eq!(format_document_number(&config, 42), "INV-00042");
/// ```

pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use store::{
    configure, list_configs, peek, reserve_in_transaction, reserve_number, ConfigureOutcome,
    MemorySequenceStore, NumberingUpdate, PgSequenceStore, SequenceStore,
};

/// Widest padding a counter may be configured with
pub const MAX_PAD_LENGTH: u32 = 12;

/// Error type for numbering operations
#[derive(Debug, thiserror::Error)]
pub enum NumberingError {
    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("Invalid numbering configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Numbered document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    Estimate,
    ChangeOrder,
    PurchaseOrder,
    Rfi,
    Bid,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        DocumentType::Invoice,
        DocumentType::Estimate,
        DocumentType::ChangeOrder,
        DocumentType::PurchaseOrder,
        DocumentType::Rfi,
        DocumentType::Bid,
    ];

    /// Storage key in `document_counters.doc_type`
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "invoice",
            DocumentType::Estimate => "estimate",
            DocumentType::ChangeOrder => "change_order",
            DocumentType::PurchaseOrder => "purchase_order",
            DocumentType::Rfi => "rfi",
            DocumentType::Bid => "bid",
        }
    }

    pub fn default_prefix(&self) -> &'static str {
        match self {
            DocumentType::Invoice => "INV",
            DocumentType::Estimate => "EST",
            DocumentType::ChangeOrder => "CO",
            DocumentType::PurchaseOrder => "PO",
            DocumentType::Rfi => "RFI",
            DocumentType::Bid => "BID",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = NumberingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| NumberingError::UnknownDocumentType(s.to_string()))
    }
}

/// Counter settings for one document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingConfig {
    pub prefix: String,
    pub separator: String,
    pub pad_length: u32,

    /// Value the next reservation will hand out
    pub next_number: i64,
}

impl NumberingConfig {
    /// Defaults for a type: its prefix, `-`, five digits, starting at 1
    pub fn for_type(doc_type: DocumentType) -> Self {
        Self {
            prefix: doc_type.default_prefix().to_string(),
            separator: "-".to_string(),
            pad_length: 5,
            next_number: 1,
        }
    }

    /// The number the next reservation will return
    pub fn preview(&self) -> String {
        format_document_number(self, self.next_number)
    }

    /// Checks the bounds the counter table enforces
    pub fn validate(&self) -> Result<(), NumberingError> {
        if self.pad_length == 0 || self.pad_length > MAX_PAD_LENGTH {
            return Err(NumberingError::InvalidConfig(format!(
                "pad_length must be between 1 and {MAX_PAD_LENGTH}"
            )));
        }
        if self.next_number < 1 {
            return Err(NumberingError::InvalidConfig(
                "next_number must be at least 1".to_string(),
            ));
        }
        if self.prefix.len() > 16 {
            return Err(NumberingError::InvalidConfig(
                "prefix must be at most 16 characters".to_string(),
            ));
        }
        if self.separator.len() > 4 {
            return Err(NumberingError::InvalidConfig(
                "separator must be at most 4 characters".to_string(),
            ));
        }
        Ok(())
    }
}

/// Formats `n` as `prefix + separator + zero-padded digits`
///
/// Numbers wider than `pad_length` are printed in full. An empty prefix drops
/// the separator too.
pub fn format_document_number(config: &NumberingConfig, n: i64) -> String {
    let width = config.pad_length as usize;
    if config.prefix.is_empty() {
        format!("{n:0width$}")
    } else {
        format!("{}{}{n:0width$}", config.prefix, config.separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(prefix: &str, separator: &str, pad_length: u32) -> NumberingConfig {
        NumberingConfig {
            prefix: prefix.to_string(),
            separator: separator.to_string(),
            pad_length,
            next_number: 1,
        }
    }

    #[test]
    fn test_pads_to_configured_length() {
        assert_eq!(format_document_number(&config("INV", "-", 5), 1), "INV-00001");
        assert_eq!(format_document_number(&config("PO", "/", 3), 7), "PO/007");
        assert_eq!(format_document_number(&config("RFI", "-", 1), 9), "RFI-9");
    }

    #[test]
    fn test_wide_numbers_are_not_truncated() {
        assert_eq!(format_document_number(&config("INV", "-", 3), 123456), "INV-123456");
    }

    #[test]
    fn test_empty_prefix_omits_separator() {
        assert_eq!(format_document_number(&config("", "-", 4), 12), "0012");
    }

    #[test]
    fn test_formatting_is_deterministic() {
        let cfg = config("CO", "-", 6);
        for n in [1, 99, 100_000, 999_999] {
            let a = format_document_number(&cfg, n);
            assert_eq!(a, format_document_number(&cfg, n));
            assert!(a.len() >= "CO-".len() + 6);
        }
    }

    #[test]
    fn test_default_config_per_type() {
        let est = NumberingConfig::for_type(DocumentType::Estimate);
        assert_eq!(est.prefix, "EST");
        assert_eq!(est.preview(), "EST-00001");
        assert_eq!(NumberingConfig::for_type(DocumentType::ChangeOrder).prefix, "CO");
    }

    #[test]
    fn test_document_type_parse_round_trip() {
        for t in DocumentType::ALL {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert!(matches!(
            "timesheet".parse::<DocumentType>(),
            Err(NumberingError::UnknownDocumentType(_))
        ));
    }

    #[test]
    fn test_document_type_serde_matches_storage_key() {
        let json = serde_json::to_string(&DocumentType::PurchaseOrder).unwrap();
        assert_eq!(json, "\"purchase_order\"");
    }

    #[test]
    fn test_validate_bounds() {
        assert!(config("INV", "-", 5).validate().is_ok());
        assert!(config("INV", "-", 0).validate().is_err());
        assert!(config("INV", "-", 13).validate().is_err());

        let mut cfg = config("INV", "-", 5);
        cfg.next_number = 0;
        assert!(cfg.validate().is_err());
    }
}
