//! WebSocket handler for client connections
//!
//! Handles the upgrade, connection lifecycle, and the event dispatch loop:
//! every inbound frame is parsed into a [`ClientEvent`] and mapped to exactly
//! one game or matchmaking operation; the operation's emissions go back out
//! through the room bus. No business logic lives here.

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use super::state::AppState;
use crate::core_types::SessionId;
use crate::messages::{ClientEvent, Outbound, ServerEvent};
use crate::queue::Ticket;

/// WebSocket upgrade handler.
///
/// Endpoint: GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Connection lifecycle: register, forward outbound events, dispatch inbound
/// events, clean up on close.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: SessionId = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.bus.register(&session_id, tx);

    let welcome = ServerEvent::Connected {
        session_id: session_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&welcome) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Forward emissions from the bus channel to the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Parse and dispatch inbound events.
    let recv_state = state.clone();
    let recv_session = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch(&recv_state, &recv_session, event).await,
                    Err(e) => {
                        warn!(session_id = %recv_session, "unparseable event: {e}");
                        recv_state.bus.send(Outbound::ToSession(
                            recv_session.clone(),
                            ServerEvent::BadRequest {
                                reason: "malformed event".to_string(),
                            },
                        ));
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.bus.unregister(&session_id);
}

/// Map one inbound event to its operation and emit the results.
async fn dispatch(state: &AppState, session_id: &SessionId, event: ClientEvent) {
    let out = match event {
        ClientEvent::QueueForTime {
            time,
            player_id,
            account_id,
            stake,
        } => {
            let ticket = Ticket {
                player_id,
                session_id: session_id.clone(),
                account_id,
                stake,
            };
            state.matchmaker.enqueue(&time, ticket).await
        }
        ClientEvent::JoinGame {
            room_id,
            player_id,
            name,
            account_id,
        } => {
            // Subscribe before dispatch so the joiner sees its own
            // room-wide broadcasts.
            state.bus.subscribe(session_id, &room_id);
            state
                .game
                .join(&room_id, &player_id, session_id, name, account_id)
                .await
        }
        ClientEvent::SetName {
            room_id,
            player_id,
            name,
        } => state.game.set_name(&room_id, &player_id, name).await,
        ClientEvent::SendChat {
            room_id,
            text,
            name,
            ..
        } => state.game.send_chat(&room_id, &text, name).await,
        ClientEvent::MakeMove {
            room_id,
            player_id,
            from,
            to,
            promotion,
        } => {
            state
                .game
                .make_move(
                    &room_id,
                    &player_id,
                    session_id,
                    &from,
                    &to,
                    promotion.as_deref(),
                )
                .await
        }
        ClientEvent::Flag {
            room_id,
            loser_color,
        } => state.game.flag(&room_id, loser_color).await,
        ClientEvent::Resign { room_id, player_id } => {
            state.game.resign(&room_id, &player_id).await
        }
        ClientEvent::OfferDraw { room_id, player_id } => {
            state.game.offer_draw(&room_id, &player_id).await
        }
        ClientEvent::AcceptDraw { room_id, player_id } => {
            state.game.accept_draw(&room_id, &player_id).await
        }
        ClientEvent::DeclineDraw { room_id, player_id } => {
            state.game.decline_draw(&room_id, &player_id).await
        }
        ClientEvent::Ping => vec![Outbound::ToSession(session_id.clone(), ServerEvent::Pong)],
    };
    state.bus.send_all(out);
}
