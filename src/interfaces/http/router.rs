//! Operator API router
//!
//! Authentication middleware is deliberately absent here; deployments
//! mount one in front of this router.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, ApiState};

pub fn create_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api/charge-points", get(handlers::list_charge_points))
        .route("/api/charge-points/connected", get(handlers::list_connected))
        .route(
            "/api/charge-points/{charge_point_id}/connectors",
            get(handlers::list_connectors),
        )
        .route(
            "/api/charge-points/{charge_point_id}/commands",
            post(handlers::send_raw_command),
        )
        .route(
            "/api/charge-points/{charge_point_id}/remote-start",
            post(handlers::remote_start),
        )
        .route(
            "/api/charge-points/{charge_point_id}/remote-stop",
            post(handlers::remote_stop),
        )
        .route(
            "/api/charge-points/{charge_point_id}/reset",
            post(handlers::reset_charge_point),
        )
        .route(
            "/api/charge-points/{charge_point_id}/unlock",
            post(handlers::unlock),
        )
        .route(
            "/api/charge-points/{charge_point_id}/configuration",
            get(handlers::get_config).post(handlers::change_config),
        )
        .route(
            "/api/charge-points/{charge_point_id}/trigger",
            post(handlers::trigger),
        )
        .route(
            "/api/charge-points/{charge_point_id}/discover-connectors",
            post(handlers::discover),
        )
        .route("/api/transactions", get(handlers::list_transactions))
        .route("/api/streams/meter-values", get(handlers::meter_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
