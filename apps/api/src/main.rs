use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use router::Stores;
use shared_config::{AppConfig, StorageBackend};
use shared_database::{InMemoryStore, SupabaseStore};
use shared_utils::clock::{Clock, SystemClock};

fn build_stores(config: &AppConfig, clock: Arc<dyn Clock>) -> Stores {
    match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let store = Arc::new(SupabaseStore::new(config, clock.clone()));
            Stores {
                schedules: store.clone(),
                history: store.clone(),
                wards: store,
                clock,
            }
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            let store = Arc::new(InMemoryStore::new(clock.clone()));
            Stores {
                schedules: store.clone(),
                history: store.clone(),
                wards: store,
                clock,
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ward operations API server");

    let config = Arc::new(AppConfig::from_env());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.ward_utc_offset_minutes));
    let stores = build_stores(&config, clock);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), stores)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };
    info!("Listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
