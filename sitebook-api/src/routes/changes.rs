/// Organization change feed (SSE)
///
/// `GET /v1/changes`
///
/// Opens a dedicated `LISTEN` connection and forwards every change in the
/// caller's organization. The stream ends when the client disconnects.
/// At most `MAX_CHANGE_SUBSCRIBERS` streams are open at once; beyond that the
/// request fails with 503.
///
/// ```text
/// event: ready
/// data: {"org_id":"..."}
///
/// event: change
/// id: 4f1c...
/// data: {"org_id":"...","collection":"rfis","id":"4f1c...","op":"update"}
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures::stream::{self, Stream};
use sitebook_shared::{
    auth::{authorization::current_role, middleware::AuthContext},
    realtime::{self, ChangeEvent},
};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_stream::StreamExt as _;

fn claim_slot(slots: &Arc<Semaphore>) -> ApiResult<OwnedSemaphorePermit> {
    slots.clone().try_acquire_owned().map_err(|_| {
        tracing::warn!("Change feed subscriber limit reached");
        ApiError::ServiceUnavailable("Too many change feed subscribers".to_string())
    })
}

fn to_sse(change: &ChangeEvent) -> Event {
    let event = Event::default().event("change").id(change.id.to_string());
    match serde_json::to_string(change) {
        Ok(json) => event.data(json),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode change event");
            event.data("{}")
        }
    }
}

pub async fn stream_changes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let slot = claim_slot(&state.change_subscribers)?;
    current_role(&state.db, &auth).await?;

    let changes = realtime::subscribe(&state.db, auth.org_id).await?;

    tracing::info!(org_id = %auth.org_id, user_id = %auth.user_id, "Change feed subscribed");

    let ready = Event::default()
        .event("ready")
        .data(serde_json::json!({ "org_id": auth.org_id }).to_string());

    let stream = stream::once(async move { ready })
        .chain(changes.map(move |change| {
            let _held = &slot;
            to_sse(&change)
        }))
        .map(Ok);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(25))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_returned_when_streams_end() {
        let slots = Arc::new(Semaphore::new(2));

        let first = claim_slot(&slots).unwrap();
        let _second = claim_slot(&slots).unwrap();
        assert!(matches!(claim_slot(&slots), Err(ApiError::ServiceUnavailable(_))));

        drop(first);
        assert!(claim_slot(&slots).is_ok());
    }
}
