//! Realtime protocol types
//!
//! The closed set of client and server events. Inbound payloads are parsed
//! into [`ClientEvent`] at the gateway boundary before any dispatch, so the
//! core only ever sees validated, typed requests. Operations return
//! [`Outbound`] emissions - addressed either to the requesting session or to
//! every session subscribed to a room - and the transport layer delivers them
//! without inspecting their contents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Color, PlayerId, RoomId, SessionId};
use crate::room::GameStatePayload;

/// Inbound client event. `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    QueueForTime {
        time: String,
        player_id: PlayerId,
        account_id: AccountId,
        stake: Decimal,
    },
    #[serde(rename_all = "camelCase")]
    JoinGame {
        room_id: RoomId,
        player_id: PlayerId,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        account_id: Option<AccountId>,
    },
    #[serde(rename_all = "camelCase")]
    SetName {
        room_id: RoomId,
        player_id: PlayerId,
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    SendChat {
        room_id: RoomId,
        player_id: PlayerId,
        text: String,
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MakeMove {
        room_id: RoomId,
        player_id: PlayerId,
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Flag {
        room_id: RoomId,
        loser_color: Color,
    },
    #[serde(rename_all = "camelCase")]
    Resign { room_id: RoomId, player_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    OfferDraw { room_id: RoomId, player_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    AcceptDraw { room_id: RoomId, player_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    DeclineDraw { room_id: RoomId, player_id: PlayerId },
    Ping,
}

/// Outbound server event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Connected { session_id: SessionId },
    #[serde(rename_all = "camelCase")]
    Paired { room_id: RoomId, time: String },
    QueueRejected {
        reason: String,
    },
    ColorAssigned {
        color: Color,
    },
    GameState(GameStatePayload),
    PlayerNames {
        #[serde(skip_serializing_if = "Option::is_none")]
        white: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        black: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PlayerJoined {
        player_id: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    ChatMessage {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        timestamp: i64,
    },
    MoveMade {
        from: String,
        to: String,
        notation: String,
        position: String,
    },
    MoveRejected {
        reason: String,
    },
    GameOver {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        loser: Option<Color>,
    },
    DrawOffered {
        from: Color,
    },
    DrawDeclined {
        by: Color,
    },
    BadRequest {
        reason: String,
    },
    Pong,
}

/// An emission with its delivery scope.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Unicast to one transport session (rejections, color assignment, the
    /// joining session's state snapshot).
    ToSession(SessionId, ServerEvent),
    /// Broadcast to every session subscribed to the room.
    ToRoom(RoomId, ServerEvent),
}
