use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::auth;
use crate::models::{
    AssetSaveRequest, ChatCompletionRequest, DailyTemplateCreate, DailyTemplateUpdate,
    DayKeyParams, ExploreItemCreate, ExploreItemUpdate, ExploreListParams, GenerateTasksParams,
    HealthResponse, ImageGenerateRequest, PageParams, RoleCreate, RoleListParams, RoleUpdate,
    VideoGenerateRequest,
};
use crate::service;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

// ------------------- Public: roles -------------------

pub async fn list_roles(
    State(state): State<AppState>,
    Query(params): Query<RoleListParams>,
) -> impl IntoResponse {
    match service::list_roles(&state, params).await {
        Ok(roles) => (StatusCode::OK, Json(roles)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> impl IntoResponse {
    match service::get_role(&state, &role_id).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<RoleCreate>,
) -> impl IntoResponse {
    match service::create_role(&state, payload).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn update_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(payload): Json<RoleUpdate>,
) -> impl IntoResponse {
    match service::update_role(&state, &role_id, payload).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

// ------------------- Public: explore -------------------

pub async fn list_explore_items(
    State(state): State<AppState>,
    Query(params): Query<ExploreListParams>,
) -> impl IntoResponse {
    match service::list_explore_items(&state, params, 100).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_explore_posts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let params = ExploreListParams {
        item_type: Some("post".to_string()),
        limit: params.limit,
        offset: params.offset,
    };
    match service::list_explore_items(&state, params, 100).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn list_explore_worlds(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let params = ExploreListParams {
        item_type: Some("world".to_string()),
        limit: params.limit,
        offset: params.offset,
    };
    match service::list_explore_items(&state, params, 100).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn create_explore_item(
    State(state): State<AppState>,
    Json(payload): Json<ExploreItemCreate>,
) -> impl IntoResponse {
    match service::create_explore_item(&state, payload).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

// ------------------- Public: daily tasks -------------------

pub async fn list_daily_tasks(
    State(state): State<AppState>,
    Query(params): Query<DayKeyParams>,
) -> impl IntoResponse {
    match service::list_daily_tasks(&state, &params.day_key).await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn complete_daily_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    match service::complete_daily_task(&state, &task_id).await {
        Ok(task) => (StatusCode::OK, Json(task)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

// ------------------- Public: chat and media -------------------

pub async fn chat_completion(
    State(state): State<AppState>,
    Json(payload): Json<ChatCompletionRequest>,
) -> impl IntoResponse {
    match service::chat_completion(&state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_image(
    State(state): State<AppState>,
    Json(payload): Json<ImageGenerateRequest>,
) -> impl IntoResponse {
    match service::generate_image(&state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn generate_video(
    State(state): State<AppState>,
    Json(payload): Json<VideoGenerateRequest>,
) -> impl IntoResponse {
    match service::generate_video(&state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn save_asset(
    State(state): State<AppState>,
    Json(payload): Json<AssetSaveRequest>,
) -> impl IntoResponse {
    match service::save_asset(&state, payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

// ------------------- Admin -------------------

macro_rules! gate_admin {
    ($state:expr, $headers:expr) => {
        if let Err(err) = auth::require_admin(&$state.admin, &$headers) {
            return (err.status, Json(err.body)).into_response();
        }
    };
}

pub async fn admin_list_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::admin_list_roles(&state, params).await {
        Ok(roles) => (StatusCode::OK, Json(roles)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RoleCreate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::create_role(&state, payload).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
    Json(payload): Json<RoleUpdate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::update_role(&state, &role_id, payload).await {
        Ok(role) => (StatusCode::OK, Json(role)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_list_explore_items(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ExploreListParams>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::list_explore_items(&state, params, 200).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_get_explore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::get_explore_item(&state, &item_id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_create_explore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ExploreItemCreate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::create_explore_item(&state, payload).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_update_explore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
    Json(payload): Json<ExploreItemUpdate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::update_explore_item(&state, &item_id, payload).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_delete_explore_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(item_id): Path<String>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::delete_explore_item(&state, &item_id).await {
        Ok(deleted) => (StatusCode::OK, Json(deleted)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_list_daily_templates(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::list_daily_templates(&state, params).await {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_create_daily_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<DailyTemplateCreate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::create_daily_template(&state, payload).await {
        Ok(template) => (StatusCode::OK, Json(template)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_update_daily_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
    Json(payload): Json<DailyTemplateUpdate>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::update_daily_template(&state, &template_id, payload).await {
        Ok(template) => (StatusCode::OK, Json(template)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_delete_daily_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(template_id): Path<String>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::delete_daily_template(&state, &template_id).await {
        Ok(deleted) => (StatusCode::OK, Json(deleted)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_list_daily_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DayKeyParams>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::list_daily_tasks(&state, &params.day_key).await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_generate_daily_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<GenerateTasksParams>,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::generate_daily_tasks(&state, params).await {
        Ok(tasks) => (StatusCode::OK, Json(tasks)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

pub async fn admin_upload_asset(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> impl IntoResponse {
    gate_admin!(state, headers);
    match service::upload_asset(&state, multipart).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}
