use std::sync::Arc;

use crate::escrow::EscrowLedger;
use crate::fx::FxService;
use crate::gateway::broadcast::RoomBus;
use crate::queue::Matchmaker;
use crate::session::GameService;
use crate::store::AccountStore;

/// Shared gateway state. Constructed once at process start and injected into
/// every handler; there are no ambient globals, so tests build isolated
/// instances.
#[derive(Clone)]
pub struct AppState {
    pub game: Arc<GameService>,
    pub matchmaker: Arc<Matchmaker>,
    pub bus: Arc<RoomBus>,
    pub store: Arc<dyn AccountStore>,
    pub escrow: Arc<EscrowLedger>,
    pub fx: Arc<FxService>,
}

impl AppState {
    pub fn new(
        game: Arc<GameService>,
        matchmaker: Arc<Matchmaker>,
        bus: Arc<RoomBus>,
        store: Arc<dyn AccountStore>,
        escrow: Arc<EscrowLedger>,
        fx: Arc<FxService>,
    ) -> Self {
        Self {
            game,
            matchmaker,
            bus,
            store,
            escrow,
            fx,
        }
    }
}
