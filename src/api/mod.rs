//! Control-plane RPC surface.

pub mod agent_routes;
pub mod auth;
pub mod operator_routes;
pub mod state;
pub mod types;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::{build_services, AppState, Services};

/// Assemble the full route table over a service bundle.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Operator surface
        .route(
            "/bots",
            post(operator_routes::create_bot)
                .get(operator_routes::list_bots)
                .delete(operator_routes::delete_bots),
        )
        .route("/bots/:id", get(operator_routes::get_bot))
        .route("/bots/:id/deploy", post(operator_routes::deploy_bot))
        .route("/bots/:id/cancel", post(operator_routes::cancel_deployment))
        .route("/bots/:id/leave", post(operator_routes::remove_from_call))
        .route("/bots/:id/log-level", post(operator_routes::set_log_level))
        .route("/bots/:id/chat", post(operator_routes::submit_chat_message))
        .route(
            "/bots/:id/speaker-timeframes",
            get(operator_routes::get_speaker_timeframes),
        )
        .route("/bots/:id/events", get(operator_routes::list_events))
        .route("/bots/:id/screenshots", get(operator_routes::list_screenshots))
        // Agent surface
        .route("/agent/bots/:id/heartbeat", post(agent_routes::heartbeat))
        .route("/agent/bots/:id/events", post(agent_routes::report_event))
        .route("/agent/bots/:id/status", post(agent_routes::update_status))
        .route(
            "/agent/bots/:id/chat/dequeue",
            post(agent_routes::dequeue_message),
        )
        .route(
            "/agent/bots/:id/screenshots",
            post(agent_routes::upload_screenshot),
        )
        .route(
            "/agent/bots/:id/screenshots/metadata",
            post(agent_routes::add_screenshot),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
