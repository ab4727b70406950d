//! Room entity and process-wide registry
//!
//! A room is one paired game: board, players, stake metadata. The registry is
//! the only process-wide index of rooms; individual room contents are only
//! ever mutated under the room's own lock, which makes every game operation a
//! single-writer-per-room critical section.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::core_types::{AccountId, Color, PlayerId, RoomId, SessionId};
use crate::rules::LiveBoard;

/// One seat at the board.
///
/// `player_id` is the stable identity; `session_id` is the transport binding
/// and is refreshed on every reconnect.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    pub player_id: PlayerId,
    pub session_id: SessionId,
    pub name: Option<String>,
    pub account_id: Option<AccountId>,
}

/// A single move as recorded in room history and the `gameState` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub notation: String,
    /// FEN of the position after the move.
    pub position: String,
}

/// The canonical resynchronization payload sent on every join/move.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub room_id: RoomId,
    /// Current position, FEN-serialized.
    pub position: String,
    pub turn: Color,
    pub history: Vec<MoveRecord>,
    pub players: RoomPlayers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake_each: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomPlayers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub black: Option<PlayerId>,
}

pub struct Room {
    pub id: RoomId,
    pub board: LiveBoard,
    pub history: Vec<MoveRecord>,
    pub white: Option<PlayerSlot>,
    pub black: Option<PlayerSlot>,
    pub created_at: DateTime<Utc>,
    pub time_control: Option<String>,
    pub over: bool,
    pub draw_offer: Option<Color>,
    pub stake_each: Option<Decimal>,
    pub pot: Option<Decimal>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            board: LiveBoard::new(),
            history: Vec::new(),
            white: None,
            black: None,
            created_at: Utc::now(),
            time_control: None,
            over: false,
            draw_offer: None,
            stake_each: None,
            pot: None,
        }
    }

    pub fn slot(&self, color: Color) -> Option<&PlayerSlot> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, color: Color) -> Option<&mut PlayerSlot> {
        match color {
            Color::White => self.white.as_mut(),
            Color::Black => self.black.as_mut(),
        }
    }

    /// The color a player already holds in this room, if any.
    pub fn color_of(&self, player_id: &str) -> Option<Color> {
        if self.white.as_ref().is_some_and(|p| p.player_id == player_id) {
            return Some(Color::White);
        }
        if self.black.as_ref().is_some_and(|p| p.player_id == player_id) {
            return Some(Color::Black);
        }
        None
    }

    /// Seat a player: reconnects refresh the session binding, new players
    /// take the first open slot (white before black), full rooms assign
    /// nothing.
    pub fn assign_color(&mut self, player_id: &str, session_id: &str) -> Option<Color> {
        if let Some(existing) = self.color_of(player_id) {
            if let Some(slot) = self.slot_mut(existing) {
                slot.session_id = session_id.to_string();
            }
            return Some(existing);
        }
        let slot = PlayerSlot {
            player_id: player_id.to_string(),
            session_id: session_id.to_string(),
            name: None,
            account_id: None,
        };
        if self.white.is_none() {
            self.white = Some(slot);
            return Some(Color::White);
        }
        if self.black.is_none() {
            self.black = Some(slot);
            return Some(Color::Black);
        }
        None
    }

    pub fn state_payload(&self) -> GameStatePayload {
        GameStatePayload {
            room_id: self.id.clone(),
            position: self.board.fen(),
            turn: self.board.side_to_move(),
            history: self.history.clone(),
            players: RoomPlayers {
                white: self.white.as_ref().map(|p| p.player_id.clone()),
                black: self.black.as_ref().map(|p| p.player_id.clone()),
            },
            time_control: self.time_control.clone(),
            stake_each: self.stake_each,
            pot: self.pot,
        }
    }
}

/// Process-wide room index.
///
/// Structural mutation (insert) goes through the concurrent map; room
/// contents are protected by the per-room mutex. Rooms are never deleted.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Arc<Mutex<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Idempotent creation: first reference creates an empty room.
    pub fn get_or_create(&self, room_id: &str) -> Arc<Mutex<Room>> {
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Room::new(room_id.to_string()))))
            .clone()
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
