mod config;
mod error;
mod routes;
mod storage;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use watcharr_core::{CredentialHasher, TokenIssuer};

use config::ServerConfig;
use storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub hasher: CredentialHasher,
    pub issuer: TokenIssuer,
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(state: &AppState) -> Self {
        state.issuer.clone()
    }
}

fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/verify", get(routes::auth::verify));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watcharr_server=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("watcharr starting");

    match config::load_dotenv() {
        Some(path) => tracing::info!("loaded environment from {}", path.display()),
        None => tracing::info!("no .env file found, using process environment"),
    }

    // A missing JWT_SECRET aborts startup before anything is served.
    let config = ServerConfig::from_env()
        .inspect_err(|e| tracing::error!("invalid configuration: {e:#}"))?;

    tracing::info!("data directory: {}", config.data_dir.display());
    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    let p = &config.hash_params;
    tracing::info!(
        memory_kib = p.memory_kib,
        iterations = p.iterations,
        parallelism = p.parallelism,
        "password hashing parameters"
    );

    let state = AppState {
        db,
        hasher: CredentialHasher::new(config.hash_params),
        issuer: TokenIssuer::new(config.jwt_secret.clone()),
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
