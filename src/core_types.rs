//! Core types used throughout the system
//!
//! Fundamental identifiers and the two-valued color tag shared by all modules.

use serde::{Deserialize, Serialize};

/// Room ID - identifies one paired game session.
///
/// # Constraints:
/// - **Opaque**: v4 UUID string minted at pairing time
/// - **Immutable**: never reused; rooms are not deleted
pub type RoomId = String;

/// Player ID - stable identity of a participant.
///
/// Survives reconnects; a player keeps their color slot for the lifetime
/// of the room.
pub type PlayerId = String;

/// Account ID - key into the external account store (balances, ledger).
pub type AccountId = String;

/// Session ID - volatile transport identity.
///
/// Replaced on every reconnect; only ever used for addressing emissions.
pub type SessionId = String;

/// Side of the board.
///
/// Every state-machine transition matches exhaustively on this enum;
/// there are no stringly-typed color comparisons anywhere in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The opposing side.
    pub fn opposite(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Wire representation ("white" / "black").
    pub fn as_str(self) -> &'static str {
        match self {
            Color::White => "white",
            Color::Black => "black",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
