//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Intent, WorldHandle};
use crate::ws::protocol::ServerMsg;
use crate::ws::session::{Session, SessionAction};

/// Direct replies (pong, re-join welcome) queued per connection
const DIRECT_CAPACITY: usize = 32;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut session = Session::new(player_id, state.config.session_limits());
    let world = state.world.clone();

    // Nothing is sent until the client joins, and it has the liveness window to do so
    let join_deadline = state.config.session_timeout;
    let joined = timeout(
        join_deadline,
        await_join(&mut session, &world, &mut ws_sink, &mut ws_stream),
    )
    .await;
    let (welcome, events_rx) = match joined {
        Ok(Some(joined)) => joined,
        Ok(None) => {
            info!(player_id = %player_id, "Connection closed before join");
            return;
        }
        Err(_) => {
            info!(player_id = %player_id, "No join within {:?}, closing", join_deadline);
            // A join may have been staged just before the deadline
            let _ = world.intent_tx.send(Intent::Leave { player_id }).await;
            let _ = ws_sink.send(Message::Close(None)).await;
            return;
        }
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        let _ = world.intent_tx.send(Intent::Leave { player_id }).await;
        return;
    }
    session.mark_joined();

    run_session(session, world, ws_sink, ws_stream, events_rx).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Read frames until a join is accepted. Returns the welcome to send and the
/// event subscription taken just before the join was staged.
async fn await_join(
    session: &mut Session,
    world: &WorldHandle,
    ws_sink: &mut SplitSink<WebSocket, Message>,
    ws_stream: &mut SplitStream<WebSocket>,
) -> Option<(ServerMsg, broadcast::Receiver<ServerMsg>)> {
    let player_id = session.player_id;

    while let Some(result) = ws_stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        };

        match session.handle_text(&text) {
            SessionAction::Join { name, class } => {
                // Subscribe first so our own playerJoined is not missed
                let events_rx = world.subscribe_events();
                if let Some(welcome) = request_join(world, player_id, name, class).await {
                    return Some((welcome, events_rx));
                }
                warn!(player_id = %player_id, "Join rejected");
            }
            SessionAction::Pong { t, .. } => {
                if send_msg(ws_sink, &ServerMsg::Pong { t }).await.is_err() {
                    return None;
                }
            }
            SessionAction::Forward(_) | SessionAction::Ignore => {}
        }
    }
    None
}

/// Stage a join and wait for the world's answer on the next tick
async fn request_join(
    world: &WorldHandle,
    player_id: Uuid,
    name: String,
    class: crate::ws::protocol::PlayerClass,
) -> Option<ServerMsg> {
    let (reply, welcome) = oneshot::channel();
    world
        .intent_tx
        .send(Intent::Join {
            player_id,
            name,
            class,
            reply,
        })
        .await
        .ok()?;
    // Dropped sender means the world declined the join
    welcome.await.ok()
}

/// Run the joined session with read/write split
async fn run_session(
    mut session: Session,
    world: WorldHandle,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    events_rx: broadcast::Receiver<ServerMsg>,
) {
    let player_id = session.player_id;
    let (direct_tx, direct_rx) = mpsc::channel(DIRECT_CAPACITY);

    // Spawn writer task: snapshots, events and direct replies -> WebSocket
    let mut writer_handle = tokio::spawn(write_loop(
        player_id,
        ws_sink,
        world.snapshots(),
        events_rx,
        direct_rx,
    ));

    // Reader loop: WebSocket -> world intents
    loop {
        let result = tokio::select! {
            result = ws_stream.next() => result,
            _ = &mut writer_handle => {
                debug!(player_id = %player_id, "Writer finished, closing session");
                break;
            }
        };

        let Some(result) = result else {
            break;
        };

        match result {
            Ok(Message::Text(text)) => match session.handle_text(&text) {
                SessionAction::Forward(intent) => {
                    if world.intent_tx.send(intent).await.is_err() {
                        debug!(player_id = %player_id, "Intent channel closed");
                        break;
                    }
                }
                SessionAction::Join { name, class } => {
                    // Re-join respawns a dead player; ignored while alive
                    if let Some(welcome) = request_join(&world, player_id, name, class).await {
                        let _ = direct_tx.try_send(welcome);
                    }
                }
                SessionAction::Pong { t, heartbeat } => {
                    if direct_tx.try_send(ServerMsg::Pong { t }).is_err() {
                        debug!(player_id = %player_id, "Direct queue full, pong dropped");
                    }
                    if let Some(intent) = heartbeat {
                        if world.intent_tx.send(intent).await.is_err() {
                            debug!(player_id = %player_id, "Intent channel closed");
                            break;
                        }
                    }
                }
                SessionAction::Ignore => {}
            },
            Ok(Message::Binary(_)) => {
                debug!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Removal happens at the next tick boundary
    let _ = world.intent_tx.send(Intent::Leave { player_id }).await;

    writer_handle.abort();
}

/// Forward outbound traffic until the socket fails or we are removed
async fn write_loop(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut snapshot_rx: watch::Receiver<Arc<ServerMsg>>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
    mut direct_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        tokio::select! {
            changed = snapshot_rx.changed() => {
                if changed.is_err() {
                    debug!(player_id = %player_id, "Snapshot channel closed");
                    break;
                }
                // Only the latest snapshot is ever sent
                let snapshot = snapshot_rx.borrow_and_update().clone();
                if let Err(e) = send_msg(&mut ws_sink, &snapshot).await {
                    debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
            event = events_rx.recv() => match event {
                Ok(msg) => {
                    let removed = matches!(&msg, ServerMsg::PlayerLeft { player_id: id, .. } if *id == player_id);
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                    if removed {
                        info!(player_id = %player_id, "Player removed from world, closing socket");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} events", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Event channel closed");
                    break;
                }
            },
            Some(msg) = direct_rx.recv() => {
                if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                    debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                    break;
                }
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
