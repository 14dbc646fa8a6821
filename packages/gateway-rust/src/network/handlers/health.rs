//! Health, liveness, and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::network::HealthState;
use crate::registry::{EntrySummary, RegistryEntry};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub state: HealthState,
    pub uptime_secs: u64,
    pub in_flight: u64,
    pub registries: RegistryHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryHealth {
    pub adapters: Vec<EntrySummary>,
    pub deployment_backends: Vec<EntrySummary>,
    pub plugins: Vec<EntrySummary>,
}

/// Detailed health as JSON. Always 200; `state` carries the verdict.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let registries = &state.services.registries;
    Json(HealthReport {
        state: state.shutdown.health_state(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        in_flight: state.shutdown.in_flight_count(),
        registries: RegistryHealth {
            adapters: summarize(&registries.adapters.list()),
            deployment_backends: summarize(&registries.deployments.list()),
            plugins: summarize(&registries.plugins.list()),
        },
    })
}

fn summarize<B: ?Sized>(entries: &[RegistryEntry<B>]) -> Vec<EntrySummary> {
    entries.iter().map(RegistryEntry::summary).collect()
}

/// Liveness only proves the process answers; always 200.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// 200 once serving with a default adapter; 503 while starting, draining,
/// or without a default adapter.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    let serving = state.shutdown.health_state() == HealthState::Ready;
    if serving && state.services.registries.adapters.default_entry().is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
