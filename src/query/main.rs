//! Query server for phonetic place lookups.
//!
//! Provides an HTTP API for exact code lookups against one index and for
//! resolving a typed word to places with the combined match strategy.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use placephone::config::Config;
use placephone::matcher::{MatchStrategy, PhoneticMatcher};
use placephone::models::{Algorithm, CodeCounts, PhoneticCode, Place};
use placephone::store::{BuildRecord, IndexStore, StoreError};

#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Phonetic place lookup server")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// sled database directory (overrides config)
    #[arg(long)]
    store: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    store: IndexStore,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = args.store {
        config.store.path = path;
    }
    if let Some(listen) = args.listen {
        config.query.listen = listen;
    }

    info!("Placephone Query Server");
    info!("Opening store at {}", config.store.path.display());

    let store = IndexStore::open_config(&config.store).context("Failed to open place store")?;
    info!(
        "Store has {} places, {} index rows",
        store.place_count(),
        store.row_counts().total()
    );

    let state = Arc::new(AppState { store });

    // Build router
    let app = Router::new()
        .route("/status", get(status_handler))
        .route("/lookup", get(lookup_handler))
        .route("/match", get(match_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", config.query.listen);

    let listener = tokio::net::TcpListener::bind(&config.query.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn internal_error(e: StoreError) -> (StatusCode, String) {
    tracing::error!("Store access failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Run a sled call on the blocking pool
async fn with_store<T, F>(state: &AppState, f: F) -> Result<T, (StatusCode, String)>
where
    T: Send + 'static,
    F: FnOnce(&IndexStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| {
            tracing::error!("Store task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .map_err(internal_error)
}

/// Index status and the last completed build
async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let status = with_store(&state, |store| {
        Ok(StatusResponse {
            places: store.place_count(),
            rows: store.row_counts(),
            last_build: store.last_build()?,
        })
    })
    .await?;

    Ok(Json(status))
}

#[derive(Serialize)]
struct StatusResponse {
    places: usize,
    rows: CodeCounts,
    last_build: Option<BuildRecord>,
}

/// Exact code lookup in one index
async fn lookup_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<LookupResponse>, (StatusCode, String)> {
    let algorithm: Algorithm = params
        .algorithm
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;

    let code = params.code.clone();
    let rows = with_store(&state, move |store| store.lookup_codes(algorithm, &code)).await?;

    Ok(Json(LookupResponse {
        algorithm,
        code: params.code,
        rows,
    }))
}

#[derive(Deserialize)]
struct LookupParams {
    /// beider_morse, nysiis or soundex
    algorithm: String,
    code: String,
}

#[derive(Serialize)]
struct LookupResponse {
    algorithm: Algorithm,
    code: String,
    rows: Vec<PhoneticCode>,
}

/// Resolve a word to places
async fn match_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchParams>,
) -> Result<Json<MatchResponse>, (StatusCode, String)> {
    let word = params.word.trim();
    if word.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "word must not be empty".to_string()));
    }

    let word = word.to_string();
    let query = word.clone();
    let outcome = with_store(&state, move |store| {
        PhoneticMatcher::new(store).match_word(&query)
    })
    .await?;

    Ok(Json(MatchResponse {
        word,
        strategy: outcome.strategy,
        places: outcome.places,
    }))
}

#[derive(Deserialize)]
struct MatchParams {
    word: String,
}

#[derive(Serialize)]
struct MatchResponse {
    word: String,
    strategy: MatchStrategy,
    places: Vec<Place>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::Builder;

    #[tokio::test]
    async fn test_handlers_read_store_off_runtime() {
        let dir = Builder::new().prefix("placephone-query-").tempdir().unwrap();
        let store = IndexStore::open(dir.path()).unwrap();
        store
            .insert_places(&[Place::new(1, "Newark", 40.73, -74.17)])
            .unwrap();
        placephone::IndexBuildPipeline::new(&store, &store, Default::default())
            .run()
            .unwrap();
        let state = Arc::new(AppState { store });

        let Json(status) = status_handler(State(state.clone())).await.unwrap();
        assert_eq!(status.places, 1);
        assert!(status.last_build.is_some());

        let Json(lookup) = lookup_handler(
            State(state.clone()),
            Query(LookupParams {
                algorithm: "nysiis".to_string(),
                code: "NARC".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(lookup.rows.len(), 1);
        assert_eq!(lookup.rows[0].place_id, 1);
        assert_eq!(lookup.rows[0].algorithm, Algorithm::Nysiis);

        let Json(matched) = match_handler(
            State(state.clone()),
            Query(MatchParams {
                word: "newark".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(matched.strategy, MatchStrategy::Exact);
        assert_eq!(matched.places.len(), 1);

        let err = with_store(&state, |_| -> Result<(), StoreError> { panic!("store task") })
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
