//! Stakemate server entry point
//!
//! Wires the service graph and starts the gateway:
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌──────────┐    ┌────────────┐
//! │  Config  │───▶│  Account  │───▶│  Escrow  │───▶│ Settlement │
//! │  (YAML)  │    │   Store   │    │  Ledger  │    │   Engine   │
//! └──────────┘    └───────────┘    └──────────┘    └────────────┘
//!                                        │               │
//!                 ┌────────────┐    ┌──────────┐    ┌──────────┐
//!                 │  Gateway   │◀───│Matchmaker│    │   Game   │
//!                 │ (axum/ws)  │    │          │    │ Service  │
//!                 └────────────┘    └──────────┘    └──────────┘
//! ```

use std::sync::Arc;

use stakemate::config::AppConfig;
use stakemate::escrow::EscrowLedger;
use stakemate::fx::FxService;
use stakemate::gateway::{self, broadcast::RoomBus, state::AppState};
use stakemate::queue::Matchmaker;
use stakemate::room::RoomRegistry;
use stakemate::session::GameService;
use stakemate::settlement::SettlementEngine;
use stakemate::store::{AccountStore, MemoryAccountStore, PgAccountStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = stakemate::logging::init_logging(&config);

    tracing::info!("Starting stakemate server in {} mode", env);

    // Account store: PostgreSQL when configured, in-memory otherwise.
    let store: Arc<dyn AccountStore> = match &config.postgres_url {
        Some(url) => {
            let store = PgAccountStore::connect(url).await?;
            println!("🗄️  Account store: PostgreSQL");
            Arc::new(store)
        }
        None => {
            println!("⚠️  Account store: in-memory (no postgres_url configured)");
            Arc::new(MemoryAccountStore::new())
        }
    };

    let escrow = Arc::new(EscrowLedger::new(store.clone()));
    let registry = Arc::new(RoomRegistry::new());
    let settlement = Arc::new(SettlementEngine::new(escrow.clone(), store.clone()));
    let game = Arc::new(GameService::new(
        registry.clone(),
        store.clone(),
        settlement,
    ));
    let matchmaker = Arc::new(Matchmaker::new(escrow.clone(), registry));
    let bus = Arc::new(RoomBus::new());
    let fx = Arc::new(FxService::new(&config.fx));

    let state = Arc::new(AppState::new(game, matchmaker, bus, store, escrow, fx));

    let mut gateway_config = config.gateway.clone();
    if let Some(port) = get_port_override() {
        gateway_config.port = port;
    }

    gateway::run_server(&gateway_config, state).await;
    Ok(())
}
