// GET/POST handlers: version, live readings, history, debug maintenance

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use std::collections::BTreeMap;

use super::{AppState, ApiError};
use crate::models::{
    ContainerCpuSample, ContainerMemorySample, HostCpuSample, HostMemorySample,
};
use crate::query::QueryFacade;
use crate::store::unix_millis_now;
use crate::version::{NAME, VERSION};

/// `?from=&to=`, each RFC3339 or unix seconds.
#[derive(Debug, Default, Deserialize)]
pub(super) struct RangeParams {
    from: Option<String>,
    to: Option<String>,
}

/// GET /api/version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

pub(super) async fn cpu_current(
    State(state): State<AppState>,
) -> Result<Json<HostCpuSample>, ApiError> {
    let percent = state.host.cpu_percent().await?;
    Ok(Json(HostCpuSample {
        time: unix_millis_now(),
        percent,
    }))
}

pub(super) async fn memory_current(
    State(state): State<AppState>,
) -> Result<Json<HostMemorySample>, ApiError> {
    let memory = state.host.virtual_memory().await?;
    Ok(Json(memory.at(unix_millis_now())))
}

pub(super) async fn cpu_history(
    State(state): State<AppState>,
    Query(p): Query<RangeParams>,
) -> Result<Json<Vec<HostCpuSample>>, ApiError> {
    let rows = QueryFacade::new(&state.store, unix_millis_now())
        .host_cpu(p.from.as_deref(), p.to.as_deref())
        .await?;
    Ok(Json(rows))
}

pub(super) async fn memory_history(
    State(state): State<AppState>,
    Query(p): Query<RangeParams>,
) -> Result<Json<Vec<HostMemorySample>>, ApiError> {
    let rows = QueryFacade::new(&state.store, unix_millis_now())
        .host_memory(p.from.as_deref(), p.to.as_deref())
        .await?;
    Ok(Json(rows))
}

pub(super) async fn container_cpu_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<RangeParams>,
) -> Result<Json<Vec<ContainerCpuSample>>, ApiError> {
    let rows = QueryFacade::new(&state.store, unix_millis_now())
        .container_cpu(&id, p.from.as_deref(), p.to.as_deref())
        .await?;
    Ok(Json(rows))
}

pub(super) async fn container_memory_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(p): Query<RangeParams>,
) -> Result<Json<Vec<ContainerMemorySample>>, ApiError> {
    let rows = QueryFacade::new(&state.store, unix_millis_now())
        .container_memory(&id, p.from.as_deref(), p.to.as_deref())
        .await?;
    Ok(Json(rows))
}

/// POST /api/vacuum (debug only)
pub(super) async fn vacuum(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.store.vacuum().await?;
    Ok("ok")
}

/// POST /api/checkpoint (debug only)
pub(super) async fn checkpoint(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    state.store.checkpoint().await?;
    Ok("ok")
}

/// GET /api/stats (debug only): row count per table.
pub(super) async fn stats(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<&'static str, i64>>, ApiError> {
    let counts = state.store.row_counts().await?;
    Ok(Json(
        counts
            .into_iter()
            .map(|(table, n)| (table.name(), n))
            .collect(),
    ))
}
