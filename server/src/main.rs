use axum::routing::get;
use axum::Router;
use brawl_server::config::ServerConfig;
use brawl_server::session_loop::{run_session_loop, SessionBroadcast, SessionCommand};
use brawl_server::ws::{ws_handler, AppState};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();

    let (session_tx, session_rx) = mpsc::channel::<SessionCommand>(256);
    let (broadcast_tx, _) = broadcast::channel::<SessionBroadcast>(256);

    // Spawn session loop
    let bc_tx = broadcast_tx.clone();
    let loop_config = config.clone();
    tokio::spawn(async move {
        run_session_loop(session_rx, bc_tx, loop_config).await;
    });

    // Axum app
    let app_state = AppState {
        session_tx,
        broadcast_tx,
        connection_semaphore: Arc::new(Semaphore::new(config.max_connections)),
        allowed_origins: config.allowed_origins.clone(),
        max_message_bytes: config.max_message_bytes,
        heartbeat_interval: config.heartbeat_interval(),
        heartbeat_timeout: config.heartbeat_timeout(),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting brawl server on {}", listen_addr);
    println!("Brawl server listening on {}", listen_addr);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
