/// Counter persistence and reservation
///
/// [`reserve_in_transaction`] is the primitive: it upserts the counter row,
/// locks it with `SELECT ... FOR UPDATE`, bumps `next_number` and returns the
/// formatted pre-increment value. Document inserts call it on their own
/// transaction so the number and the document commit (or roll back)
/// together. [`reserve_number`] wraps it in a transaction of its own.
///
/// [`SequenceStore`] abstracts reservation so callers (and tests) can swap
/// PostgreSQL for [`MemorySequenceStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{format_document_number, DocumentType, NumberingConfig, NumberingError};

#[derive(Debug, sqlx::FromRow)]
struct CounterRow {
    prefix: String,
    separator: String,
    pad_length: i32,
    next_number: i64,
}

impl From<CounterRow> for NumberingConfig {
    fn from(row: CounterRow) -> Self {
        NumberingConfig {
            prefix: row.prefix,
            separator: row.separator,
            pad_length: row.pad_length.max(1) as u32,
            next_number: row.next_number,
        }
    }
}

/// Partial change to a counter's settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NumberingUpdate {
    pub prefix: Option<String>,
    pub separator: Option<String>,
    pub pad_length: Option<u32>,
    pub next_number: Option<i64>,
}

impl NumberingUpdate {
    fn apply(self, mut config: NumberingConfig) -> NumberingConfig {
        if let Some(prefix) = self.prefix {
            config.prefix = prefix;
        }
        if let Some(separator) = self.separator {
            config.separator = separator;
        }
        if let Some(pad_length) = self.pad_length {
            config.pad_length = pad_length;
        }
        if let Some(next_number) = self.next_number {
            config.next_number = next_number;
        }
        config
    }
}

/// Result of [`configure`]
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureOutcome {
    pub config: NumberingConfig,
    pub previous_next_number: i64,
}

impl ConfigureOutcome {
    /// True when `next_number` moved backward, which can re-issue numbers
    pub fn was_reset_backward(&self) -> bool {
        self.config.next_number < self.previous_next_number
    }
}

async fn ensure_counter(
    conn: &mut PgConnection,
    org_id: Uuid,
    doc_type: DocumentType,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO document_counters (org_id, doc_type, prefix)
         VALUES ($1, $2, $3)
         ON CONFLICT (org_id, doc_type) DO NOTHING",
    )
    .bind(org_id)
    .bind(doc_type.as_str())
    .bind(doc_type.default_prefix())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn lock_counter(
    conn: &mut PgConnection,
    org_id: Uuid,
    doc_type: DocumentType,
) -> Result<NumberingConfig, sqlx::Error> {
    ensure_counter(conn, org_id, doc_type).await?;

    let row = sqlx::query_as::<_, CounterRow>(
        "SELECT prefix, separator, pad_length, next_number
         FROM document_counters
         WHERE org_id = $1 AND doc_type = $2
         FOR UPDATE",
    )
    .bind(org_id)
    .bind(doc_type.as_str())
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.into())
}

/// Reserves the next number inside the caller's transaction
///
/// The counter row stays locked until the caller commits or rolls back, so
/// concurrent reservations for the same `(org_id, doc_type)` serialize.
pub async fn reserve_in_transaction(
    conn: &mut PgConnection,
    org_id: Uuid,
    doc_type: DocumentType,
) -> Result<String, NumberingError> {
    let config = lock_counter(conn, org_id, doc_type).await?;

    sqlx::query(
        "UPDATE document_counters
         SET next_number = next_number + 1, updated_at = NOW()
         WHERE org_id = $1 AND doc_type = $2",
    )
    .bind(org_id)
    .bind(doc_type.as_str())
    .execute(&mut *conn)
    .await?;

    let number = format_document_number(&config, config.next_number);
    tracing::debug!(org_id = %org_id, doc_type = %doc_type, number = %number, "Reserved document number");

    Ok(number)
}

/// Reserves the next number in a transaction of its own
///
/// # Example
///
/// ```no_run
/// use sitebook_shared::numbering::{reserve_number, DocumentType};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let number = reserve_number(&pool, org_id, DocumentType::Estimate).await?;
/// println!("next estimate: {number}");
/// # Ok(())
/// # }
/// ```
pub async fn reserve_number(
    pool: &PgPool,
    org_id: Uuid,
    doc_type: DocumentType,
) -> Result<String, NumberingError> {
    let mut tx = pool.begin().await?;
    let number = reserve_in_transaction(&mut tx, org_id, doc_type).await?;
    tx.commit().await?;
    Ok(number)
}

/// Current settings for a counter without reserving (defaults if never used)
pub async fn peek(
    pool: &PgPool,
    org_id: Uuid,
    doc_type: DocumentType,
) -> Result<NumberingConfig, NumberingError> {
    let row = sqlx::query_as::<_, CounterRow>(
        "SELECT prefix, separator, pad_length, next_number
         FROM document_counters
         WHERE org_id = $1 AND doc_type = $2",
    )
    .bind(org_id)
    .bind(doc_type.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row
        .map(NumberingConfig::from)
        .unwrap_or_else(|| NumberingConfig::for_type(doc_type)))
}

/// Settings for every document type, stored or default
pub async fn list_configs(
    pool: &PgPool,
    org_id: Uuid,
) -> Result<Vec<(DocumentType, NumberingConfig)>, NumberingError> {
    let rows: Vec<(String, String, String, i32, i64)> = sqlx::query_as(
        "SELECT doc_type, prefix, separator, pad_length, next_number
         FROM document_counters
         WHERE org_id = $1",
    )
    .bind(org_id)
    .fetch_all(pool)
    .await?;

    let mut stored: HashMap<String, NumberingConfig> = rows
        .into_iter()
        .map(|(doc_type, prefix, separator, pad_length, next_number)| {
            let row = CounterRow {
                prefix,
                separator,
                pad_length,
                next_number,
            };
            (doc_type, row.into())
        })
        .collect();

    Ok(DocumentType::ALL
        .into_iter()
        .map(|t| {
            let config = stored
                .remove(t.as_str())
                .unwrap_or_else(|| NumberingConfig::for_type(t));
            (t, config)
        })
        .collect())
}

/// Changes a counter's settings
///
/// Moving `next_number` backward is allowed and can re-issue numbers that
/// are already in use; it is logged at `warn` and reported through
/// [`ConfigureOutcome::was_reset_backward`] so callers can audit it.
pub async fn configure(
    pool: &PgPool,
    org_id: Uuid,
    doc_type: DocumentType,
    update: NumberingUpdate,
) -> Result<ConfigureOutcome, NumberingError> {
    let mut tx = pool.begin().await?;

    let current = lock_counter(&mut tx, org_id, doc_type).await?;
    let previous_next_number = current.next_number;
    let config = update.apply(current);
    config.validate()?;

    sqlx::query(
        "UPDATE document_counters
         SET prefix = $3, separator = $4, pad_length = $5, next_number = $6, updated_at = NOW()
         WHERE org_id = $1 AND doc_type = $2",
    )
    .bind(org_id)
    .bind(doc_type.as_str())
    .bind(&config.prefix)
    .bind(&config.separator)
    .bind(config.pad_length as i32)
    .bind(config.next_number)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let outcome = ConfigureOutcome {
        config,
        previous_next_number,
    };

    if outcome.was_reset_backward() {
        tracing::warn!(
            org_id = %org_id,
            doc_type = %doc_type,
            from = previous_next_number,
            to = outcome.config.next_number,
            "Document counter reset backward; numbers may be re-issued"
        );
    }

    Ok(outcome)
}

/// Hands out document numbers
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Reserves the next formatted number for `(org_id, doc_type)`
    async fn reserve(&self, org_id: Uuid, doc_type: DocumentType) -> Result<String, NumberingError>;

    /// Reads the counter without reserving
    async fn peek(&self, org_id: Uuid, doc_type: DocumentType)
        -> Result<NumberingConfig, NumberingError>;
}

/// PostgreSQL-backed [`SequenceStore`]
#[derive(Debug, Clone)]
pub struct PgSequenceStore {
    pool: PgPool,
}

impl PgSequenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn reserve(&self, org_id: Uuid, doc_type: DocumentType) -> Result<String, NumberingError> {
        reserve_number(&self.pool, org_id, doc_type).await
    }

    async fn peek(
        &self,
        org_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<NumberingConfig, NumberingError> {
        peek(&self.pool, org_id, doc_type).await
    }
}

/// In-memory [`SequenceStore`]; the mutex plays the role of the row lock
#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    counters: Mutex<HashMap<(Uuid, DocumentType), NumberingConfig>>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a counter, including moving it backward
    pub async fn set(&self, org_id: Uuid, doc_type: DocumentType, config: NumberingConfig) {
        self.counters.lock().await.insert((org_id, doc_type), config);
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn reserve(&self, org_id: Uuid, doc_type: DocumentType) -> Result<String, NumberingError> {
        let mut counters = self.counters.lock().await;
        let config = counters
            .entry((org_id, doc_type))
            .or_insert_with(|| NumberingConfig::for_type(doc_type));

        let current = config.next_number;
        // Let other reservers run while the "row" is held
        tokio::task::yield_now().await;
        config.next_number = current + 1;

        Ok(format_document_number(config, current))
    }

    async fn peek(
        &self,
        org_id: Uuid,
        doc_type: DocumentType,
    ) -> Result<NumberingConfig, NumberingError> {
        Ok(self
            .counters
            .lock()
            .await
            .get(&(org_id, doc_type))
            .cloned()
            .unwrap_or_else(|| NumberingConfig::for_type(doc_type)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn number_part(formatted: &str) -> i64 {
        formatted.rsplit('-').next().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_sequential_reservations_strictly_increase() {
        let store = MemorySequenceStore::new();
        let org = Uuid::new_v4();

        let mut last = 0;
        for _ in 0..25 {
            let n = number_part(&store.reserve(org, DocumentType::Invoice).await.unwrap());
            assert!(n > last);
            last = n;
        }
        assert_eq!(last, 25);
    }

    #[tokio::test]
    async fn test_first_reservation_uses_defaults() {
        let store = MemorySequenceStore::new();
        let number = store.reserve(Uuid::new_v4(), DocumentType::Rfi).await.unwrap();
        assert_eq!(number, "RFI-00001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_are_distinct() {
        let store = Arc::new(MemorySequenceStore::new());
        let org = Uuid::new_v4();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.reserve(org, DocumentType::Bid).await.unwrap() })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap()));
        }

        assert_eq!(seen.len(), 64);
        assert_eq!(store.peek(org, DocumentType::Bid).await.unwrap().next_number, 65);
    }

    #[tokio::test]
    async fn test_counters_are_scoped_by_org_and_type() {
        let store = MemorySequenceStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(store.reserve(a, DocumentType::Invoice).await.unwrap(), "INV-00001");
        assert_eq!(store.reserve(a, DocumentType::Invoice).await.unwrap(), "INV-00002");
        assert_eq!(store.reserve(b, DocumentType::Invoice).await.unwrap(), "INV-00001");
        assert_eq!(store.reserve(a, DocumentType::Estimate).await.unwrap(), "EST-00001");
    }

    #[tokio::test]
    async fn test_backward_reset_reissues_numbers() {
        let store = MemorySequenceStore::new();
        let org = Uuid::new_v4();

        store.reserve(org, DocumentType::Invoice).await.unwrap();
        store.reserve(org, DocumentType::Invoice).await.unwrap();
        store
            .set(org, DocumentType::Invoice, NumberingConfig::for_type(DocumentType::Invoice))
            .await;

        assert_eq!(store.reserve(org, DocumentType::Invoice).await.unwrap(), "INV-00001");
    }

    #[tokio::test]
    async fn test_peek_does_not_reserve() {
        let store = MemorySequenceStore::new();
        let org = Uuid::new_v4();

        assert_eq!(store.peek(org, DocumentType::ChangeOrder).await.unwrap().preview(), "CO-00001");
        assert_eq!(store.reserve(org, DocumentType::ChangeOrder).await.unwrap(), "CO-00001");
    }

    #[test]
    fn test_update_merges_fields() {
        let update = NumberingUpdate {
            prefix: Some("INVC".to_string()),
            pad_length: Some(3),
            ..Default::default()
        };
        let merged = update.apply(NumberingConfig::for_type(DocumentType::Invoice));

        assert_eq!(merged.prefix, "INVC");
        assert_eq!(merged.separator, "-");
        assert_eq!(merged.pad_length, 3);
        assert_eq!(merged.next_number, 1);
    }

    #[test]
    fn test_outcome_detects_backward_reset() {
        let mut config = NumberingConfig::for_type(DocumentType::Invoice);
        config.next_number = 10;

        let forward = ConfigureOutcome {
            config: config.clone(),
            previous_next_number: 5,
        };
        assert!(!forward.was_reset_backward());

        let backward = ConfigureOutcome {
            config,
            previous_next_number: 20,
        };
        assert!(backward.was_reset_backward());
    }
}
