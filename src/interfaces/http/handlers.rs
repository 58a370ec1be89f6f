//! Operator API handlers
//!
//! Thin adapters from HTTP to the command service, discovery routine,
//! storage gateway, and meter stream hub. Authentication is expected to be
//! provided by middleware outside this crate.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::Stream;
use serde_json::{json, Value};
use tracing::info;

use super::dto::{
    ApiResponse, ChangeConfigurationBody, ChargePointSummary, CommandStatus, ConfigurationQuery,
    HealthResponse, MeterStreamQuery, RawCommandRequest, RemoteStartBody, RemoteStopBody,
    ResetBody, TransactionsQuery, TriggerBody, UnlockBody,
};
use crate::application::commands::{
    change_configuration, get_configuration, remote_start_transaction, remote_stop_transaction,
    reset, trigger_message, unlock_connector, RemoteStartContext, SharedCommandService,
};
use crate::application::discovery::{discover_connectors, DiscoveryReport, DiscoveryTiming};
use crate::application::session::{CallError, SharedSessionRegistry};
use crate::application::telemetry::{MeterFilter, MeterStreamHub};
use crate::domain::{Connector, DomainError, Transaction};
use crate::infrastructure::cache::CacheGateway;
use crate::infrastructure::storage::StorageGateway;
use metrics_exporter_prometheus::PrometheusHandle;

/// Shared state for all operator API routes.
#[derive(Clone)]
pub struct ApiState {
    pub registry: SharedSessionRegistry,
    pub commands: SharedCommandService,
    pub storage: Arc<dyn StorageGateway>,
    pub cache: Arc<dyn CacheGateway>,
    pub hub: Arc<MeterStreamHub>,
    pub discovery_timing: DiscoveryTiming,
    pub metrics: PrometheusHandle,
}

// ── Error mapping ──────────────────────────────────────────────

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<CallError> for ApiError {
    fn from(e: CallError) -> Self {
        let status = match &e {
            CallError::NotConnected(_) => StatusCode::NOT_FOUND,
            CallError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CallError::Remote { .. } => StatusCode::BAD_GATEWAY,
            CallError::ConnectionClosed => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        let status = match &e {
            DomainError::ChargePointNotFound(_)
            | DomainError::TransactionNotFound(_)
            | DomainError::ConnectorNotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ── Charge points ──────────────────────────────────────────────

pub async fn list_charge_points(State(state): State<ApiState>) -> ApiResult<Vec<ChargePointSummary>> {
    let charge_points = state.storage.list_charge_points().await?;
    let summaries = charge_points
        .into_iter()
        .map(|cp| {
            let connected = state.registry.is_connected(&cp.id);
            ChargePointSummary {
                charge_point: cp,
                connected,
            }
        })
        .collect();
    Ok(Json(ApiResponse::success(summaries)))
}

pub async fn list_connected(State(state): State<ApiState>) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.registry.connected_ids()))
}

pub async fn list_connectors(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
) -> ApiResult<Vec<Connector>> {
    let connectors = state.storage.list_connectors(&charge_point_id).await?;
    Ok(Json(ApiResponse::success(connectors)))
}

// ── Commands ───────────────────────────────────────────────────

pub async fn send_raw_command(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<RawCommandRequest>,
) -> ApiResult<Value> {
    info!(
        charge_point_id = charge_point_id.as_str(),
        action = body.action.as_str(),
        "Operator raw command"
    );
    let payload = body.payload.unwrap_or_else(|| json!({}));
    let response = state
        .commands
        .send_raw(&charge_point_id, &body.action, payload, None)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

pub async fn remote_start(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<RemoteStartBody>,
) -> ApiResult<CommandStatus> {
    let context = RemoteStartContext {
        vehicle_id: body.vehicle_id,
        fleet_id: body.fleet_id,
    };
    let status = remote_start_transaction(
        &state.commands,
        &charge_point_id,
        body.connector_id,
        &body.id_tag,
        body.charging_profile,
        Some(context),
    )
    .await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

pub async fn remote_stop(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<RemoteStopBody>,
) -> ApiResult<CommandStatus> {
    let status =
        remote_stop_transaction(&state.commands, &charge_point_id, body.transaction_id).await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

pub async fn reset_charge_point(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<ResetBody>,
) -> ApiResult<CommandStatus> {
    let status = reset(&state.commands, &charge_point_id, body.kind).await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

pub async fn unlock(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<UnlockBody>,
) -> ApiResult<CommandStatus> {
    let status = unlock_connector(&state.commands, &charge_point_id, body.connector_id).await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

pub async fn get_config(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Query(query): Query<ConfigurationQuery>,
) -> ApiResult<Value> {
    let keys = query.keys.map(|s| {
        s.split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
    });
    let result = get_configuration(&state.commands, &charge_point_id, keys, None).await?;
    Ok(Json(ApiResponse::success(json!({
        "configurationKey": result.configuration_key,
        "unknownKey": result.unknown_key,
    }))))
}

pub async fn change_config(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<ChangeConfigurationBody>,
) -> ApiResult<CommandStatus> {
    let status =
        change_configuration(&state.commands, &charge_point_id, &body.key, &body.value).await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

pub async fn trigger(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> ApiResult<CommandStatus> {
    let status = trigger_message(
        &state.commands,
        &charge_point_id,
        body.requested_message,
        body.connector_id,
        None,
    )
    .await?;
    Ok(Json(ApiResponse::success(CommandStatus { status })))
}

// ── Discovery ──────────────────────────────────────────────────

pub async fn discover(
    State(state): State<ApiState>,
    Path(charge_point_id): Path<String>,
) -> ApiResult<DiscoveryReport> {
    let report = discover_connectors(
        &state.commands,
        &state.storage,
        &charge_point_id,
        &state.discovery_timing,
    )
    .await?;
    Ok(Json(ApiResponse::success(report)))
}

// ── Transactions ───────────────────────────────────────────────

pub async fn list_transactions(
    State(state): State<ApiState>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<Vec<Transaction>> {
    let transactions = state
        .storage
        .list_transactions(query.charge_point_id.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(transactions)))
}

// ── Live meter stream (SSE) ────────────────────────────────────

pub async fn meter_stream(
    State(state): State<ApiState>,
    Query(query): Query<MeterStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let filter = MeterFilter {
        charge_point_id: query.charge_point_id,
        connector_id: query.connector_id,
    };
    info!(?filter, "Meter stream subscriber attached");

    let subscription = state.hub.subscribe(filter);
    let stream = futures_util::stream::unfold(subscription, |mut subscription| async move {
        let sample = subscription.recv().await?;
        let event = Event::default()
            .event("meterValues")
            .json_data(&sample)
            .unwrap_or_default();
        Some((Ok(event), subscription))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ── Health & metrics ───────────────────────────────────────────

pub async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    let storage_ok = state.storage.ping().await.is_ok();
    let cache_ok = state.cache.ping().await.is_ok();
    let response = HealthResponse {
        status: if storage_ok && cache_ok { "ok" } else { "degraded" },
        storage: storage_ok,
        cache: cache_ok,
        connected_charge_points: state.registry.count(),
    };
    Json(ApiResponse::success(response))
}

pub async fn prometheus_metrics(State(state): State<ApiState>) -> String {
    state.metrics.render()
}
