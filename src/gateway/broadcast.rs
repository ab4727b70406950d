//! Room bus: session registry and per-room subscriptions
//!
//! Maps volatile transport sessions to their outbound channels and rooms to
//! their subscriber sets, and delivers addressed emissions. Uses DashMap for
//! concurrent access; a session appears in at most one channel entry but may
//! subscribe to any number of rooms.

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core_types::{RoomId, SessionId};
use crate::messages::{Outbound, ServerEvent};

/// Outbound channel for one WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<ServerEvent>;

pub struct RoomBus {
    /// session_id -> outbound channel
    sessions: DashMap<SessionId, WsSender>,
    /// room_id -> subscribed session ids
    rooms: DashMap<RoomId, HashSet<SessionId>>,
}

impl RoomBus {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a freshly connected session.
    pub fn register(&self, session_id: &str, tx: WsSender) {
        self.sessions.insert(session_id.to_string(), tx);
        info!(session_id, total = self.sessions.len(), "session connected");
    }

    /// Drop a closed session and every room subscription it held.
    pub fn unregister(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.rooms.retain(|_, subscribers| {
            subscribers.remove(session_id);
            !subscribers.is_empty()
        });
        info!(session_id, total = self.sessions.len(), "session closed");
    }

    /// Subscribe a session to a room's broadcasts.
    pub fn subscribe(&self, session_id: &str, room_id: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(session_id.to_string());
        debug!(session_id, room_id, "subscribed");
    }

    /// Deliver one addressed emission. Send failures mean the client is
    /// already gone; cleanup happens when its socket task unregisters.
    pub fn send(&self, outbound: Outbound) {
        match outbound {
            Outbound::ToSession(session_id, event) => {
                if let Some(tx) = self.sessions.get(&session_id) {
                    let _ = tx.send(event);
                }
            }
            Outbound::ToRoom(room_id, event) => {
                if let Some(subscribers) = self.rooms.get(&room_id) {
                    for session_id in subscribers.iter() {
                        if let Some(tx) = self.sessions.get(session_id) {
                            let _ = tx.send(event.clone());
                        }
                    }
                }
            }
        }
    }

    /// Deliver a batch of emissions in order.
    pub fn send_all(&self, outbound: Vec<Outbound>) {
        for item in outbound {
            self.send(item);
        }
    }

    /// (connected sessions, rooms with subscribers)
    pub fn stats(&self) -> (usize, usize) {
        (self.sessions.len(), self.rooms.len())
    }
}

impl Default for RoomBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicast_and_room_broadcast() {
        let bus = RoomBus::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        bus.register("s1", tx1);
        bus.register("s2", tx2);
        bus.subscribe("s1", "room-1");
        bus.subscribe("s2", "room-1");

        bus.send(Outbound::ToSession("s1".into(), ServerEvent::Pong));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());

        bus.send(Outbound::ToRoom(
            "room-1".into(),
            ServerEvent::QueueRejected {
                reason: "x".into(),
            },
        ));
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_unregister_cleans_subscriptions() {
        let bus = RoomBus::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        bus.register("s1", tx);
        bus.subscribe("s1", "room-1");
        assert_eq!(bus.stats(), (1, 1));

        bus.unregister("s1");
        assert_eq!(bus.stats(), (0, 0));
    }
}
