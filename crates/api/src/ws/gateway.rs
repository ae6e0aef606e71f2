use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use mealscan_core::types::TaskId;
use mealscan_events::{ProgressBroker, TaskEvent};
use mealscan_store::TaskStore;

use crate::state::AppState;

/// Interval between heartbeat pings (in seconds).
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Outbound channel depth per connection.
const OUTBOUND_BUFFER: usize = 32;

/// HTTP handler that upgrades a per-task subscription to WebSocket.
pub async fn task_ws_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<TaskId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.store, state.broker, task_id))
}

/// Manage a single per-task subscription after upgrade.
///
/// Subscribes to the broker group BEFORE reading the snapshot, so an
/// event published between the two is buffered in the receiver rather
/// than lost. The client therefore sees the snapshot plus every later
/// event; a gap is not possible. Buffered events from that window can
/// lag the snapshot, so updates whose progress falls below the last
/// value delivered are dropped instead of relayed -- the client never
/// observes progress moving backwards.
async fn handle_socket(
    socket: WebSocket,
    store: Arc<TaskStore>,
    broker: Arc<ProgressBroker>,
    task_id: TaskId,
) {
    tracing::info!(task_id = %task_id, "Task subscription connected");

    let mut events = broker.subscribe(task_id).await;

    // Unknown id: close immediately, zero events delivered.
    let snapshot = match store.get(task_id).await {
        Ok(task) => task,
        Err(_) => {
            tracing::debug!(task_id = %task_id, "Subscription to unknown task rejected");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            drop(events);
            broker.prune(task_id).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let send_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!("WebSocket sink closed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let first = TaskEvent::snapshot(&snapshot);
    let mut done = first.is_terminal();
    let mut last_progress = snapshot.progress;
    if send_event(&out_tx, &first).await.is_ok() && !done {
        let mut heartbeat =
            tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
        // The first tick fires immediately; skip it.
        heartbeat.tick().await;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            // Fell behind the group buffer; the store
                            // snapshot is always current, resend it.
                            tracing::warn!(task_id = %task_id, skipped, "Subscriber lagged, resyncing from snapshot");
                            match store.get(task_id).await {
                                Ok(task) => TaskEvent::snapshot(&task),
                                Err(_) => break,
                            }
                        }
                        Err(RecvError::Closed) => break,
                    };

                    // An update buffered before the snapshot read can
                    // trail what the client already saw; drop it.
                    if let TaskEvent::Update { progress, .. } = &event {
                        if *progress < last_progress {
                            continue;
                        }
                        last_progress = *progress;
                    }

                    let terminal = event.is_terminal();
                    if send_event(&out_tx, &event).await.is_err() {
                        break;
                    }
                    if terminal {
                        done = true;
                        break;
                    }
                }
                inbound = stream.next() => {
                    match inbound {
                        Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                            if out_tx.send(Message::Text("pong".into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(Message::Pong(_))) => {
                            tracing::trace!(task_id = %task_id, "Pong received");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(task_id = %task_id, error = %e, "WebSocket receive error");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if out_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    if done {
        let _ = out_tx.send(Message::Close(None)).await;
    }

    // Clean up: drop our receiver, then reclaim the group if it emptied.
    drop(events);
    drop(out_tx);
    let _ = send_task.await;
    broker.prune(task_id).await;
    tracing::info!(task_id = %task_id, "Task subscription disconnected");
}

async fn send_event(
    out_tx: &mpsc::Sender<Message>,
    event: &TaskEvent,
) -> Result<(), mpsc::error::SendError<Message>> {
    match serde_json::to_string(event) {
        Ok(json) => out_tx.send(Message::Text(json.into())).await,
        Err(e) => {
            // Event types are plain data; serialization cannot fail in
            // practice, but a skipped frame beats a dropped connection.
            tracing::error!(error = %e, "Failed to serialize task event");
            Ok(())
        }
    }
}
