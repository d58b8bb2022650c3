//! HTTP handlers: the query facade
//!
//! `GET /stats` is a synchronous read of the current aggregate.
//! `GET /stats/stream` is an infinite SSE feed fed by the subscription hub:
//! push-on-change, but coalesced so one connection sees at most one frame
//! per `stream_min_interval` no matter how fast events arrive. Rapid
//! successive notifications collapse into the latest value.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use tokio::time::Instant;

use types::aggregate::{Aggregate, StatsResponse};

use crate::error::ServiceError;
use crate::hub::Subscription;
use crate::state::AppState;

/// One-shot aggregate query.
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, ServiceError> {
    let aggregate = state.backend.stats()?;
    Ok(Json(StatsResponse::from(&aggregate)))
}

/// Live aggregate feed. Non-restartable; runs until the client disconnects,
/// which drops the subscription and releases its hub slot.
pub async fn stream_stats(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServiceError> {
    // Subscribe before snapshotting so no update between the two is lost;
    // anything delivered twice is filtered by the count guard below.
    let subscription = state.hub.subscribe();
    let initial = state.backend.stats()?;

    let stream = aggregate_stream(subscription, initial, state.stream_min_interval)
        .map(|aggregate| Ok(frame(&aggregate)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn frame(aggregate: &Aggregate) -> Event {
    let body = serde_json::to_string(&StatsResponse::from(aggregate))
        .unwrap_or_else(|_| "{}".to_string());
    Event::default().data(body)
}

struct StreamState {
    subscription: Subscription,
    min_interval: Duration,
    last_emit: Option<Instant>,
    last_count: u64,
    initial: Option<Aggregate>,
}

/// The value sequence for one connection: the snapshot at connect, then
/// every change the subscriber has not yet seen, rate-coalesced.
fn aggregate_stream(
    subscription: Subscription,
    initial: Aggregate,
    min_interval: Duration,
) -> impl Stream<Item = Aggregate> {
    let state = StreamState {
        subscription,
        min_interval,
        last_emit: None,
        last_count: 0,
        initial: Some(initial),
    };

    futures::stream::unfold(state, |mut state| async move {
        let aggregate = match state.initial.take() {
            Some(first) => first,
            None => loop {
                let candidate = next_coalesced(&mut state).await?;
                // A value no newer than what this connection already
                // emitted (an update that raced the connect snapshot) is
                // skipped, keeping the observed sequence monotonic.
                if candidate.total_count > state.last_count {
                    break candidate;
                }
            },
        };

        state.last_emit = Some(Instant::now());
        state.last_count = aggregate.total_count;
        Some((aggregate, state))
    })
}

/// Wait for the next notification, then hold the frame back until the
/// minimum interval since the previous emit has passed, folding in any
/// newer snapshots that arrive in the meantime.
async fn next_coalesced(state: &mut StreamState) -> Option<Aggregate> {
    let mut latest = state.subscription.recv().await?;

    if let Some(last_emit) = state.last_emit {
        let deadline = last_emit + state.min_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                more = state.subscription.recv() => match more {
                    Some(aggregate) => latest = aggregate,
                    None => break,
                },
            }
        }
    }

    Some(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SubscriptionHub;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn snapshot(count: u64) -> Aggregate {
        Aggregate {
            total_count: count,
            total_amount: Decimal::new(count as i64 * 1050, 2),
        }
    }

    #[tokio::test]
    async fn test_first_value_is_connect_snapshot() {
        let hub = Arc::new(SubscriptionHub::with_defaults());
        let stream = aggregate_stream(hub.subscribe(), snapshot(3), Duration::from_secs(5));
        futures::pin_mut!(stream);

        let first = stream.next().await.unwrap();
        assert_eq!(first.total_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_updates_coalesce_to_latest() {
        let hub = Arc::new(SubscriptionHub::with_defaults());
        let stream = aggregate_stream(hub.subscribe(), snapshot(1), Duration::from_secs(5));
        futures::pin_mut!(stream);

        // Connect snapshot arrives immediately.
        assert_eq!(stream.next().await.unwrap().total_count, 1);

        // A burst of updates inside one interval collapses to the latest.
        for count in 2..=10 {
            hub.notify(snapshot(count));
        }
        assert_eq!(stream.next().await.unwrap().total_count, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_update_skipped() {
        let hub = Arc::new(SubscriptionHub::with_defaults());
        let subscription = hub.subscribe();

        // An update sent between subscribe and snapshot is already part
        // of the connect snapshot and must not be re-emitted.
        hub.notify(snapshot(2));
        let stream = aggregate_stream(subscription, snapshot(2), Duration::from_millis(50));
        futures::pin_mut!(stream);

        assert_eq!(stream.next().await.unwrap().total_count, 2);

        hub.notify(snapshot(3));
        assert_eq!(stream.next().await.unwrap().total_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_enforced_between_frames() {
        let hub = Arc::new(SubscriptionHub::with_defaults());
        let stream = aggregate_stream(hub.subscribe(), snapshot(1), Duration::from_secs(5));
        futures::pin_mut!(stream);

        let _ = stream.next().await.unwrap();
        let first_emit = Instant::now();

        hub.notify(snapshot(2));
        let _ = stream.next().await.unwrap();
        assert!(first_emit.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_stream_ends_when_hub_dropped() {
        let hub = Arc::new(SubscriptionHub::with_defaults());
        let stream = aggregate_stream(hub.subscribe(), snapshot(0), Duration::from_millis(1));
        futures::pin_mut!(stream);

        let _ = stream.next().await.unwrap();
        drop(hub);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_frame_payload_shape() {
        let body = serde_json::to_string(&StatsResponse::from(&snapshot(2))).unwrap();
        assert_eq!(body, r#"{"total_orders":2,"total_amount":21.0}"#);
    }
}
