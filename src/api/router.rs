// src/api/router.rs
// Route table

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

use super::http;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(http::health::health))
        // Accounts
        .route("/api/auth/register", post(http::auth::register))
        .route("/api/auth/login", post(http::auth::login))
        .route("/api/auth/refresh", post(http::auth::refresh))
        // Sessions and chat
        .route(
            "/api/sessions",
            post(http::sessions::create_session).get(http::sessions::list_sessions),
        )
        .route(
            "/api/sessions/{session_id}",
            get(http::sessions::get_session).delete(http::sessions::delete_session),
        )
        .route("/api/sessions/{session_id}/messages", get(http::sessions::get_messages))
        .route("/api/sessions/{session_id}/summary", get(http::sessions::get_summary))
        .route("/api/sessions/{session_id}/chat", post(http::chat::send_message))
        .route("/api/sessions/{session_id}/upload", post(http::uploads::upload_document))
        .route("/api/models", get(http::chat::list_models))
        .route("/api/analytics", get(http::sessions::analytics))
        // Search
        .route("/api/search", post(http::search::search_messages))
        .route("/api/context/similar", post(http::search::search_similar_contexts))
        // Teams
        .route("/api/teams", post(http::teams::create_team).get(http::teams::list_my_teams))
        .route("/api/teams/join", post(http::teams::join_team))
        .route("/api/teams/sweep", post(http::teams::run_promotion_sweep))
        .route("/api/teams/{team_id}/members", get(http::teams::get_members))
        .route("/api/teams/{team_id}/invite", post(http::teams::regenerate_invite))
        .route("/api/teams/{team_id}/role", post(http::teams::update_member_role))
        .route("/api/teams/{team_id}/promote", post(http::teams::promote_guest))
        .route(
            "/api/teams/{team_id}/temp-promotion",
            post(http::teams::promote_admin_temporarily),
        )
        .route(
            "/api/teams/{team_id}/temp-promotion/resolve",
            post(http::teams::resolve_temp_promotion),
        )
        .route("/api/teams/{team_id}/permissions", post(http::teams::add_permission))
        .route(
            "/api/teams/{team_id}/permissions/check",
            post(http::teams::check_permission),
        )
        // Queues
        .route(
            "/api/teams/{team_id}/queues",
            post(http::queues::create_queue).get(http::queues::list_queues),
        )
        .route(
            "/api/teams/{team_id}/queues/{queue_id}",
            axum::routing::delete(http::queues::deactivate_queue),
        )
        // Audit
        .route("/api/audit", get(http::audit::recent_entries))
        // Vault
        .route(
            "/api/teams/{team_id}/vault",
            post(http::vault::create_item).get(http::vault::list_items),
        )
        .route(
            "/api/teams/{team_id}/vault/{item_id}",
            get(http::vault::read_item)
                .put(http::vault::update_item)
                .delete(http::vault::delete_item),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
