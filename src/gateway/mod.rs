pub mod broadcast;
pub mod handlers;
pub mod state;
pub mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;
use ws::ws_handler;

/// Build the full gateway router.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/fx/usd-zar", get(handlers::fx_rate))
        .route("/games/recent/{account_id}", get(handlers::recent_games));

    let app = Router::new()
        // WebSocket endpoint
        .route("/ws", get(ws_handler))
        // Health check
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes);

    // [SECURITY] Mock API routes - only compiled when 'mock-api' feature is enabled.
    // Production builds MUST be compiled with `--no-default-features` to exclude this.
    #[cfg(feature = "mock-api")]
    let app = app.nest(
        "/internal/mock",
        Router::new().route("/deposit", axum::routing::post(handlers::mock_deposit)),
    );

    app.with_state(state)
}

/// Start the gateway server.
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("❌ FATAL: Failed to bind to {}: {}", addr, e);
            eprintln!(
                "   Hint: Port {} may already be in use. Check with: lsof -i :{}",
                config.port, config.port
            );
            std::process::exit(1);
        }
    };

    println!("🚀 Gateway listening on http://{}", addr);
    println!("📡 WebSocket endpoint: ws://{}/ws", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ FATAL: Server error: {}", e);
        std::process::exit(1);
    }
}
