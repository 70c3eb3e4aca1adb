//! Realtime WebSocket endpoint — 订单事件推送
//!
//! GET /api/live/ws?token=<JWT>
//! Auth: JWT 通过 query parameter 传递（浏览器 WebSocket 不支持自定义 headers）
//!
//! 协议:
//! - Client → Server: ClientCommand (joinUserRoom, joinOrderRoom, ping)
//! - Server → Client: ServerMessage (orderCreated, orderStatusUpdated, joined, error, pong)
//!
//! 每加入一个 room 启动一个转发 task：LiveHub broadcast → 本连接 mpsc → socket。
//! 连接断开时全部 abort。

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::message::{ClientCommand, ServerMessage, Topic};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::auth::{CurrentUser, authenticate};
use crate::notify::LiveSubscription;
use crate::state::AppState;

/// Rooms a single connection may join
const MAX_ROOMS_PER_CONNECTION: usize = 32;

/// Per-connection outbound queue
const FORWARD_CAPACITY: usize = 64;

const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/live/ws", get(handle_live_ws))
}

/// GET /api/live/ws?token=<JWT>
pub async fn handle_live_ws(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&state.jwt, &query.token, "/api/live/ws")?;
    Ok(ws.on_upgrade(move |socket| live_session(socket, state, user)))
}

/// Resolve a join command into the topic the caller may subscribe to
pub async fn authorize_join(
    state: &AppState,
    user: &CurrentUser,
    cmd: &ClientCommand,
) -> Result<Option<Topic>, AppError> {
    match cmd {
        ClientCommand::JoinUserRoom { user_id } => {
            if !user.can_access(user_id) {
                return Err(AppError::forbidden("Cannot join another user's room"));
            }
            Ok(Some(Topic::User(user_id.clone())))
        }
        ClientCommand::JoinOrderRoom { order_id } => {
            let order = state
                .storage
                .get_order(order_id)
                .await?
                .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
            if !user.can_access(&order.user_id) {
                return Err(AppError::forbidden("Cannot join this order's room"));
            }
            Ok(Some(Topic::Order(order.id)))
        }
        ClientCommand::Ping => Ok(None),
    }
}

fn error_message(err: &AppError) -> ServerMessage {
    ServerMessage::Error {
        code: err.code.code(),
        message: err.message.clone(),
    }
}

/// Forward one hub topic into the connection queue
fn spawn_forward(
    mut hub_rx: LiveSubscription,
    tx: mpsc::Sender<ServerMessage>,
    user_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match hub_rx.recv().await {
                Ok(msg) => {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(user_id = %user_id, lagged = n, "Live subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn live_session(socket: WebSocket, state: AppState, user: CurrentUser) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(FORWARD_CAPACITY);
    let mut rooms: HashMap<Topic, JoinHandle<()>> = HashMap::new();

    tracing::info!(user_id = %user.id, "Live WS connected");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            Some(event) = rx.recv() => {
                if send_message(&mut sink, &event).await.is_err() {
                    break;
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(cmd) => handle_command(&state, &user, &cmd, &tx, &mut rooms).await,
                            Err(e) => error_message(&AppError::with_message(
                                ErrorCode::InvalidFormat,
                                format!("Invalid command: {e}"),
                            )),
                        };
                        if send_message(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    for (_, handle) in rooms {
        handle.abort();
    }
    tracing::info!(user_id = %user.id, "Live WS disconnected");
}

async fn handle_command(
    state: &AppState,
    user: &CurrentUser,
    cmd: &ClientCommand,
    tx: &mpsc::Sender<ServerMessage>,
    rooms: &mut HashMap<Topic, JoinHandle<()>>,
) -> ServerMessage {
    let topic = match authorize_join(state, user, cmd).await {
        Ok(Some(topic)) => topic,
        Ok(None) => return ServerMessage::Pong,
        Err(e) => {
            tracing::debug!(user_id = %user.id, code = %e.code, "Live join rejected");
            return error_message(&e);
        }
    };

    if !rooms.contains_key(&topic) {
        if rooms.len() >= MAX_ROOMS_PER_CONNECTION {
            return error_message(&AppError::with_message(
                ErrorCode::ValueOutOfRange,
                format!("Too many rooms on one connection (max {MAX_ROOMS_PER_CONNECTION})"),
            ));
        }
        let hub_rx = state.live.subscribe(&topic);
        rooms.insert(
            topic.clone(),
            spawn_forward(hub_rx, tx.clone(), user.id.clone()),
        );
    }

    ServerMessage::Joined {
        topic: topic.to_string(),
    }
}

async fn send_message<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
