//! Stakemate - Real-time staked chess server
//!
//! Players queue by time control and wager, get paired, have stakes
//! escrowed, play a synchronized game over WebSocket, and are settled
//! automatically at game end.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (RoomId, PlayerId, Color, etc.)
//! - [`rules`] - Rules adapter over the chess library
//! - [`room`] - Room entity and process-wide registry
//! - [`queue`] - Pairing queue and matchmaking
//! - [`escrow`] - Balance escrow with per-account serialization
//! - [`session`] - Per-room game state machine
//! - [`settlement`] - Payout/refund distribution and history recording
//! - [`store`] - Account store interface (PostgreSQL / in-memory)
//! - [`messages`] - Realtime client/server protocol types
//! - [`gateway`] - axum HTTP/WebSocket gateway

// Core types - must be first!
pub mod core_types;

// Game components
pub mod escrow;
pub mod messages;
pub mod queue;
pub mod room;
pub mod rules;
pub mod session;
pub mod settlement;
pub mod store;

// Boundary services
pub mod config;
pub mod fx;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Color, PlayerId, RoomId, SessionId};
pub use escrow::{EscrowError, EscrowLedger};
pub use messages::{ClientEvent, Outbound, ServerEvent};
pub use queue::{Matchmaker, Ticket};
pub use room::{Room, RoomRegistry};
pub use rules::{LiveBoard, TerminalKind};
pub use session::GameService;
pub use settlement::SettlementEngine;
pub use store::{AccountStore, MemoryAccountStore, PgAccountStore};
