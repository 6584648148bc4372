/// Organization change feed
///
/// Triggers on every tenant-scoped table call `pg_notify('sitebook_changes', ...)`
/// with a small JSON payload naming the organization, table, row and
/// operation. [`subscribe`] opens a dedicated `LISTEN` connection and yields
/// the events belonging to one organization. Clients refetch what changed.
///
/// # Example
///
/// ```no_run
/// use futures::StreamExt;
/// use sitebook_shared::realtime::subscribe;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut changes = Box::pin(subscribe(&pool, org_id).await?);
/// while let Some(change) = changes.next().await {
///     println!("{} {} {}", change.op, change.collection, change.id);
/// }
/// # Ok(())
/// # }
/// ```

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Notification channel used by the `notify_org_change` trigger
pub const CHANNEL: &str = "sitebook_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeOp::Insert => "insert",
            ChangeOp::Update => "update",
            ChangeOp::Delete => "delete",
        })
    }
}

/// One changed row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub org_id: Uuid,

    /// Table name, e.g. `rfis`
    pub collection: String,

    pub id: Uuid,
    pub op: ChangeOp,
}

/// Decodes a notification payload; malformed payloads yield None
pub fn parse_notification(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, payload, "Ignoring malformed change notification");
            None
        }
    }
}

/// Streams changes for `org_id` until the consumer drops the stream
///
/// The listener reconnects on its own after a dropped connection;
/// notifications sent while disconnected are lost.
pub async fn subscribe(
    pool: &PgPool,
    org_id: Uuid,
) -> Result<impl Stream<Item = ChangeEvent> + Send + 'static, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;

    tracing::debug!(org_id = %org_id, "Change feed listener started");

    let stream = listener.into_stream().filter_map(move |notification| {
        let event = match notification {
            Ok(n) => parse_notification(n.payload()).filter(|e| e.org_id == org_id),
            Err(e) => {
                tracing::warn!(error = %e, org_id = %org_id, "Change feed listener error");
                None
            }
        };
        futures::future::ready(event)
    });

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger_payload() {
        let org = Uuid::new_v4();
        let row = Uuid::new_v4();
        let payload = format!(
            r#"{{"org_id":"{org}","collection":"invoices","id":"{row}","op":"update"}}"#
        );

        let event = parse_notification(&payload).unwrap();
        assert_eq!(event.org_id, org);
        assert_eq!(event.collection, "invoices");
        assert_eq!(event.id, row);
        assert_eq!(event.op, ChangeOp::Update);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_notification("not json").is_none());
        assert!(parse_notification(r#"{"org_id":"nope"}"#).is_none());
    }

    #[test]
    fn test_op_display_matches_serde() {
        for op in [ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete] {
            assert_eq!(serde_json::to_string(&op).unwrap(), format!("\"{op}\""));
        }
    }
}
