//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::cache::{Cache, Ttl, NO_EXPIRATION};
use crate::error::{CacheError, Result};
use crate::models::{
    AddResponse, DeleteResponse, GetResponse, HealthResponse, SetRequest, SetResponse,
    SizeResponse,
};

/// Application state shared across all handlers.
///
/// The cache does its own per-segment locking, so it is shared through a
/// plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Shared cache
    pub cache: Arc<Cache<String>>,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: Cache<String>) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState from configuration.
    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Ok(Self::new(Cache::from_config(config)?))
    }
}

/// Validates the request and resolves the TTL it asks for.
fn requested_ttl(req: &SetRequest, cache: &Cache<String>) -> Result<Ttl> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    Ok(match (req.persist, req.ttl) {
        (true, _) => NO_EXPIRATION,
        (false, Some(secs)) => Ttl::After(Duration::from_secs(secs)),
        (false, None) => Ttl::After(cache.default_ttl()),
    })
}

/// Handler for PUT /set
///
/// Stores a key-value pair, overwriting any existing value.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let ttl = requested_ttl(&req, &state.cache)?;
    state.cache.set(&req.key, req.value, ttl);

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for PUT /add
///
/// Stores a key-value pair only if the key has no live value.
pub async fn add_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<AddResponse>> {
    let ttl = requested_ttl(&req, &state.cache)?;
    let added = state.cache.add(&req.key, req.value, ttl);

    Ok(Json(AddResponse::new(req.key, added)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value.as_str())))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state
        .cache
        .remove(&key)
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for GET /size
///
/// Returns the approximate number of entries.
pub async fn size_handler(State(state): State<AppState>) -> Json<SizeResponse> {
    Json(SizeResponse::new(
        state.cache.size(),
        state.cache.segment_count(),
    ))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
