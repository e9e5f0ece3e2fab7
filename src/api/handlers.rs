//! API Handlers
//!
//! HTTP request handlers for each cache service endpoint. Backend calls may
//! touch the filesystem or the network, so they run on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::debug;

use crate::cache::Cache;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The cache facade; it synchronizes internally
    pub cache: Arc<Cache>,
}

impl AppState {
    /// Creates a new AppState around an existing cache.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Fails if the configured backend cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.build_cache()?))
    }
}

/// Runs a cache call on the blocking pool.
async fn blocking<T, F>(cache: &Arc<Cache>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Cache) -> T + Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || f(&cache))
        .await
        .map_err(|e| CacheError::Internal(e.to_string()))
}

/// Handler for PUT /cache
///
/// Stores a JSON value with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let expiry = req.expiry();
    let SetRequest { key, value, .. } = req;
    let response = SetResponse::new(key.as_str());
    blocking(&state.cache, move |cache| cache.set(&key, value, expiry)).await?;

    Ok(Json(response))
}

/// Handler for GET /cache/:key
///
/// A stored `null` is returned as a hit; absent and expired keys are 404.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let value = blocking(&state.cache, move |cache| cache.get(&lookup)).await?;

    match value {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => {
            debug!(key = %key, "cache miss");
            Err(CacheError::NotFound(key))
        }
    }
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    blocking(&state.cache, move |cache| cache.clear(Some(&target))).await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /cache
///
/// Empties the default backend.
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    blocking(&state.cache, |cache| cache.clear(None)).await?;
    Ok(Json(ClearResponse::new()))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let response = blocking(&state.cache, |cache| {
        StatsResponse::new(cache.default_backend_name(), &cache.stats())
    })
    .await?;

    Ok(Json(response))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
