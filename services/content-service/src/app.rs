use axum::{
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, cors_origins: Vec<String>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/roles", get(handlers::list_roles).post(handlers::create_role))
        .route(
            "/roles/:role_id",
            get(handlers::get_role).patch(handlers::update_role),
        )
        .route("/chat/completion", post(handlers::chat_completion))
        .route("/ai/media/image", post(handlers::generate_image))
        .route(
            "/ai/media/video-from-image",
            post(handlers::generate_video),
        )
        .route("/ai/media/save", post(handlers::save_asset))
        .route(
            "/explore/items",
            get(handlers::list_explore_items).post(handlers::create_explore_item),
        )
        .route("/explore/posts", get(handlers::list_explore_posts))
        .route("/explore/worlds", get(handlers::list_explore_worlds))
        .route("/daily-tasks", get(handlers::list_daily_tasks))
        .route(
            "/daily-tasks/complete/:task_id",
            post(handlers::complete_daily_task),
        )
        .route(
            "/admin/roles",
            get(handlers::admin_list_roles).post(handlers::admin_create_role),
        )
        .route("/admin/roles/:role_id", patch(handlers::admin_update_role))
        .route(
            "/admin/explore/items",
            get(handlers::admin_list_explore_items).post(handlers::admin_create_explore_item),
        )
        .route(
            "/admin/explore/items/:item_id",
            get(handlers::admin_get_explore_item)
                .patch(handlers::admin_update_explore_item)
                .delete(handlers::admin_delete_explore_item),
        )
        .route(
            "/admin/daily-templates",
            get(handlers::admin_list_daily_templates).post(handlers::admin_create_daily_template),
        )
        .route(
            "/admin/daily-templates/:template_id",
            patch(handlers::admin_update_daily_template)
                .delete(handlers::admin_delete_daily_template),
        )
        .route("/admin/daily-tasks", get(handlers::admin_list_daily_tasks))
        .route(
            "/admin/daily-tasks/generate",
            post(handlers::admin_generate_daily_tasks),
        )
        .route("/admin/upload", post(handlers::admin_upload_asset))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_origins))
        .with_state(state)
}

fn build_cors(origins: Vec<String>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}
