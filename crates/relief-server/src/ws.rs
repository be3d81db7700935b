//! `WebSocket` stream of mutation events.
//!
//! Clients connect to `GET /ws/events` and receive one JSON text frame
//! per successful mutation. An `events=a,b` query narrows the stream to
//! the named events; an unknown name is rejected before the upgrade.
//! Subscribers only see events published after they connect.
//!
//! A client that falls behind by more than the channel capacity skips
//! the missed events and resumes from the oldest retained one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use relief_core::{EventFilter, Subscription};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Query of `GET /ws/events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Comma-separated event names; absent or empty means every event.
    pub events: Option<String>,
}

/// Upgrade to a `WebSocket` streaming mutation events.
///
/// # Route
///
/// `GET /ws/events`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Response, ApiError> {
    let filter = query
        .events
        .as_deref()
        .map_or_else(|| Ok(EventFilter::all()), EventFilter::parse_list)?;
    let subscription = state.service.subscribe(filter);
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, subscription)))
}

/// Forward each accepted event as a text frame until either side closes.
async fn handle_ws(mut socket: WebSocket, mut subscription: Subscription) {
    debug!(filter = ?subscription.filter(), "WebSocket client connected");

    loop {
        tokio::select! {
            result = subscription.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize mutation event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    subscription.unsubscribe();
}
