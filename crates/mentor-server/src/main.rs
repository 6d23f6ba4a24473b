use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use mentor_api::state::{AppState, AppStateInner};
use mentor_api::{chats, health, messages, users};
use mentor_gateway::connection;
use mentor_gateway::registry::Registry;
use mentor_store::{Database, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentor=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("MENTOR_DB_PATH").unwrap_or_else(|_| "mentor.db".into());
    let host = std::env::var("MENTOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("MENTOR_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = Registry::new();
    let state: AppState = Arc::new(AppStateInner { db, registry });

    // Routes
    let app = Router::new()
        .route("/health", get(health::health))
        .route("/users", post(users::create_user))
        .route("/users/{user_id}", get(users::get_user))
        .route("/chats", post(chats::create_chat).get(chats::list_chats))
        .route(
            "/chats/{chat_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/ws", get(ws_upgrade))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Mentor server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let store: Arc<dyn RecordStore> = state.db.clone();
        connection::handle_socket(socket, state.registry.clone(), store)
    })
}
