use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use gather_api::auth::{self, AppState, AppStateInner};
use gather_api::dashboard;
use gather_api::events;
use gather_api::middleware::{optional_auth, require_auth};
use gather_api::registrations;
use gather_api::sessions::SessionStore;
use gather_db::Database;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gather=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("GATHER_DB_PATH").unwrap_or_else(|_| "gather.db".into());
    let host = std::env::var("GATHER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("GATHER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let session_ttl_hours: i64 = std::env::var("GATHER_SESSION_TTL_HOURS")
        .unwrap_or_else(|_| "24".into())
        .parse()?;

    // Init database
    let db = Database::open(&PathBuf::from(&db_path))?;

    // Admin bootstrap: signup only produces plain users, so the first admin
    // comes from the environment.
    if let (Ok(username), Ok(password)) = (
        std::env::var("GATHER_ADMIN_USERNAME"),
        std::env::var("GATHER_ADMIN_PASSWORD"),
    ) {
        let hash = auth::hash_password(&password)?;
        if db.ensure_admin(&username, &hash)? {
            info!("Created admin account '{}'", username);
        }
    }

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        sessions: SessionStore::new(session_ttl_hours),
    });

    // Sweep expired sessions in the background
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let removed = sweeper_state.sessions.cleanup_expired().await;
            if removed > 0 {
                debug!("Swept {} expired sessions", removed);
            }
        }
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/events", get(events::list_events))
        .route("/events/{id}", get(events::get_event))
        .route("/dashboard/popular", get(dashboard::popular))
        .route("/dashboard/recent", get(dashboard::recent))
        .with_state(state.clone());

    let stats_routes = Router::new()
        .route("/dashboard/stats", get(dashboard::stats))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/check", get(auth::check))
        .route("/events", post(events::create_event))
        .route(
            "/events/{id}",
            put(events::update_event).delete(events::delete_event),
        )
        .route(
            "/events/{id}/registrations",
            get(registrations::event_registrations),
        )
        .route(
            "/registrations",
            post(registrations::register).get(registrations::my_registrations),
        )
        .route("/registrations/all", get(registrations::all_registrations))
        .route(
            "/registrations/{id}",
            put(registrations::set_status).delete(registrations::cancel),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(stats_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Gather server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
