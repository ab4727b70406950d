//! Game session operations
//!
//! The per-room state machine: seating and reconnects, turn-enforced move
//! application, draw negotiation, resignation, clock-flag handling, and the
//! hand-off to settlement on any terminal transition. Every operation locks
//! the room for its full duration (including the settlement await), so room
//! mutation is single-writer and two racing moves can never both apply.
//!
//! Operations return addressed emissions instead of writing to the transport;
//! the gateway delivers them and tests assert on them directly.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::core_types::{Color, PlayerId, RoomId, SessionId};
use crate::messages::{Outbound, ServerEvent};
use crate::room::{MoveRecord, Room, RoomRegistry};
use crate::settlement::SettlementEngine;
use crate::store::AccountStore;

pub struct GameService {
    registry: Arc<RoomRegistry>,
    store: Arc<dyn AccountStore>,
    settlement: Arc<SettlementEngine>,
}

impl GameService {
    pub fn new(
        registry: Arc<RoomRegistry>,
        store: Arc<dyn AccountStore>,
        settlement: Arc<SettlementEngine>,
    ) -> Self {
        Self {
            registry,
            store,
            settlement,
        }
    }

    /// Seat a player (or re-bind a reconnecting one) and push the full state
    /// snapshot. Idempotent: a player who already holds a color only gets a
    /// refreshed session binding; a full room assigns nothing.
    pub async fn join(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        session_id: &SessionId,
        name: Option<String>,
        account_id: Option<String>,
    ) -> Vec<Outbound> {
        let room = self.registry.get_or_create(room_id);
        let mut room = room.lock().await;

        let assigned = room.assign_color(player_id, session_id);
        if let Some(color) = assigned {
            if let Some(slot) = room.slot_mut(color) {
                if account_id.is_some() {
                    slot.account_id = account_id;
                }
                if name.is_some() {
                    slot.name = name;
                }
            }
        }
        info!(%room_id, %player_id, color = assigned.map(Color::as_str), "join");

        let mut out = Vec::new();
        if let Some(color) = assigned {
            out.push(Outbound::ToSession(
                session_id.clone(),
                ServerEvent::ColorAssigned { color },
            ));
        }
        out.push(Outbound::ToSession(
            session_id.clone(),
            ServerEvent::GameState(room.state_payload()),
        ));
        let (white, black) = self.resolve_names(&mut room).await;
        out.push(Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::PlayerNames { white, black },
        ));
        out.push(Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::PlayerJoined {
                player_id: player_id.clone(),
                color: assigned,
            },
        ));
        out
    }

    /// Apply a move. Rejection reasons, in priority order: room not found,
    /// game over, not in room, not your turn, illegal move.
    pub async fn make_move(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        session_id: &SessionId,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Vec<Outbound> {
        let reject = |reason: &str| {
            vec![Outbound::ToSession(
                session_id.clone(),
                ServerEvent::MoveRejected {
                    reason: reason.to_string(),
                },
            )]
        };

        let Some(room) = self.registry.get(room_id) else {
            return reject("room not found");
        };
        let mut room = room.lock().await;
        if room.over {
            return reject("game over");
        }
        let Some(color) = room.color_of(player_id) else {
            return reject("not in room");
        };
        // No explicit start event: the game is in progress once both seats
        // are taken, and not a move earlier.
        if room.white.is_none() || room.black.is_none() {
            return reject("waiting for players");
        }
        if color != room.board.side_to_move() {
            return reject("not your turn");
        }
        let applied = match room.board.apply(from, to, promotion) {
            Ok(applied) => applied,
            Err(_) => return reject("illegal move"),
        };
        info!(%room_id, %player_id, from, to, notation = %applied.notation, "move");

        room.history.push(MoveRecord {
            from: applied.from.clone(),
            to: applied.to.clone(),
            notation: applied.notation.clone(),
            position: applied.fen.clone(),
        });

        let mut out = vec![
            Outbound::ToRoom(
                room_id.clone(),
                ServerEvent::MoveMade {
                    from: applied.from,
                    to: applied.to,
                    notation: applied.notation,
                    position: applied.fen,
                },
            ),
            Outbound::ToRoom(
                room_id.clone(),
                ServerEvent::GameState(room.state_payload()),
            ),
        ];

        if let Some(kind) = room.board.terminal() {
            room.over = true;
            let reason = kind.reason();
            out.push(Outbound::ToRoom(
                room_id.clone(),
                ServerEvent::GameOver {
                    reason: reason.to_string(),
                    loser: None,
                },
            ));
            // The side to move in the final position is the mated side; every
            // non-checkmate terminal here is a draw.
            let winner = kind
                .is_decisive()
                .then(|| room.board.side_to_move().opposite());
            self.settlement.settle(&room, winner, reason).await;
        }
        out
    }

    /// Resignation: the resigning color loses, the opposite color takes the
    /// pot. Silently ignored for unknown rooms, finished games, and players
    /// without a seat.
    pub async fn resign(&self, room_id: &RoomId, player_id: &PlayerId) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        if room.over {
            return Vec::new();
        }
        let Some(loser) = room.color_of(player_id) else {
            return Vec::new();
        };
        room.over = true;
        info!(%room_id, %player_id, loser = loser.as_str(), "resign");

        let out = vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::GameOver {
                reason: "resign".to_string(),
                loser: Some(loser),
            },
        )];
        self.settlement
            .settle(&room, Some(loser.opposite()), "resign")
            .await;
        out
    }

    /// Clock expiry, as declared by a client. The server keeps no
    /// authoritative timer and trusts the reported loser color; only room
    /// existence and liveness are checked.
    pub async fn flag(&self, room_id: &RoomId, loser: Color) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        if room.over {
            return Vec::new();
        }
        room.over = true;
        info!(%room_id, loser = loser.as_str(), "flagged");

        let out = vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::GameOver {
                reason: "timeout".to_string(),
                loser: Some(loser),
            },
        )];
        self.settlement
            .settle(&room, Some(loser.opposite()), "timeout")
            .await;
        out
    }

    /// Record a draw offer. A new offer from the same color silently
    /// replaces the stale one; only one outstanding offer is tracked.
    pub async fn offer_draw(&self, room_id: &RoomId, player_id: &PlayerId) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        if room.over {
            return Vec::new();
        }
        let Some(color) = room.color_of(player_id) else {
            return Vec::new();
        };
        room.draw_offer = Some(color);
        vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::DrawOffered { from: color },
        )]
    }

    /// Accept an outstanding offer. Only the non-offering color can accept;
    /// the offering color accepting its own offer does nothing.
    pub async fn accept_draw(&self, room_id: &RoomId, player_id: &PlayerId) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        if room.over {
            return Vec::new();
        }
        let Some(color) = room.color_of(player_id) else {
            return Vec::new();
        };
        match room.draw_offer {
            Some(offer) if offer != color => {}
            _ => return Vec::new(),
        }
        room.over = true;
        room.draw_offer = None;
        info!(%room_id, by = color.as_str(), "draw agreed");

        let out = vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::GameOver {
                reason: "draw".to_string(),
                loser: None,
            },
        )];
        self.settlement.settle(&room, None, "draw").await;
        out
    }

    /// Clear an outstanding offer without ending the game.
    pub async fn decline_draw(&self, room_id: &RoomId, player_id: &PlayerId) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        if room.over {
            return Vec::new();
        }
        let Some(color) = room.color_of(player_id) else {
            return Vec::new();
        };
        if room.draw_offer.is_none() {
            return Vec::new();
        }
        room.draw_offer = None;
        vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::DrawDeclined { by: color },
        )]
    }

    /// Chat is a side channel: no effect on the state machine.
    pub async fn send_chat(
        &self,
        room_id: &RoomId,
        text: &str,
        name: Option<String>,
    ) -> Vec<Outbound> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if self.registry.get(room_id).is_none() {
            return Vec::new();
        }
        vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::ChatMessage {
                text: text.to_string(),
                name,
                timestamp: Utc::now().timestamp_millis(),
            },
        )]
    }

    /// Update a seated player's display name and re-broadcast both names.
    pub async fn set_name(
        &self,
        room_id: &RoomId,
        player_id: &PlayerId,
        name: String,
    ) -> Vec<Outbound> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        let mut room = room.lock().await;
        let Some(color) = room.color_of(player_id) else {
            return Vec::new();
        };
        if let Some(slot) = room.slot_mut(color) {
            slot.name = Some(name);
        }
        let (white, black) = self.resolve_names(&mut room).await;
        vec![Outbound::ToRoom(
            room_id.clone(),
            ServerEvent::PlayerNames { white, black },
        )]
    }

    /// Fill missing display names from the account store (lazily, cached on
    /// the slot). Store failures leave the name unresolved.
    async fn resolve_names(&self, room: &mut Room) -> (Option<String>, Option<String>) {
        for color in [Color::White, Color::Black] {
            let lookup = match room.slot(color) {
                Some(slot) if slot.name.is_none() => slot.account_id.clone(),
                _ => None,
            };
            if let Some(account_id) = lookup {
                if let Ok(Some(name)) = self.store.display_name(&account_id).await {
                    if let Some(slot) = room.slot_mut(color) {
                        slot.name = Some(name);
                    }
                }
            }
        }
        (
            room.white.as_ref().and_then(|p| p.name.clone()),
            room.black.as_ref().and_then(|p| p.name.clone()),
        )
    }
}
