use axum::extract::Multipart;
use axum::http::StatusCode;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::media::{self, MediaClient};
use crate::models::{
    AssetSaveRequest, AssetSaveResponse, ChatCompletionRequest, ChatCompletionResponse, ChatRole,
    DailyTemplateCreate, DailyTemplateUpdate, DeletedResponse, ErrorResponse, ExploreItemApi,
    ExploreItemCreate, ExploreItemRow, ExploreItemUpdate, ExploreListParams,
    GenerateTasksParams, ImageGenerateRequest, ImageGenerateResponse, PageParams, RoleApi,
    RoleCreate, RoleListParams, RoleRow, RoleUpdate, SavedAsset, UploadResponse,
    VideoGenerateRequest, VideoGenerateResponse,
};
use crate::state::AppState;

const MAX_CHAT_MESSAGES: usize = 30;
const CHAT_HISTORY_WINDOW: usize = 20;
const MAX_PAGE_SIZE: i64 = 500;
const DEFAULT_REWARD_POINTS: i64 = 5;
const DEFAULT_VIDEO_PROMPT: &str = "slow cinematic push-in, subtle breathing and blinking";

#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: ErrorResponse { code, message },
        }
    }
}

fn bad_request(message: &str) -> ServiceError {
    ServiceError::new(StatusCode::BAD_REQUEST, "invalid_input", message.to_string())
}

fn not_found(message: &str) -> ServiceError {
    ServiceError::new(StatusCode::NOT_FOUND, "not_found", message.to_string())
}

fn db_error(context: &str, err: String) -> ServiceError {
    tracing::error!(error = %err, context, "table request failed");
    ServiceError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "db_error",
        format!("{context} failed: {err}"),
    )
}

fn page(limit: Option<i64>, offset: Option<i64>, default_limit: i64) -> (i64, i64) {
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (offset, limit)
}

fn short_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &hex[..10])
}

fn asset_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Keep stored object paths to a safe character set.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(120)
        .collect();
    if safe.is_empty() {
        "upload".to_string()
    } else {
        safe
    }
}

// ------------------- Roles -------------------

fn role_from_value(row: Value) -> Result<RoleApi, ServiceError> {
    let row: RoleRow = serde_json::from_value(row)
        .map_err(|err| db_error("decode role row", err.to_string()))?;
    Ok(RoleApi::from(row))
}

async fn list_roles_inner(
    state: &AppState,
    include_unpublished: bool,
    limit: Option<i64>,
    offset: Option<i64>,
    default_limit: i64,
) -> Result<Vec<RoleApi>, ServiceError> {
    let (offset, limit) = page(limit, offset, default_limit);
    let mut query = state
        .db
        .table("roles")
        .order("name", false)
        .range(offset, limit);
    if !include_unpublished {
        query = query.eq("status", "published");
    }
    let rows = query
        .select()
        .await
        .map_err(|err| db_error("list roles", err))?;
    rows.into_iter().map(role_from_value).collect()
}

pub async fn list_roles(
    state: &AppState,
    params: RoleListParams,
) -> Result<Vec<RoleApi>, ServiceError> {
    list_roles_inner(
        state,
        params.include_unpublished,
        params.limit,
        params.offset,
        100,
    )
    .await
}

pub async fn admin_list_roles(
    state: &AppState,
    params: PageParams,
) -> Result<Vec<RoleApi>, ServiceError> {
    list_roles_inner(state, true, params.limit, params.offset, 200).await
}

pub async fn get_role(state: &AppState, role_id: &str) -> Result<RoleApi, ServiceError> {
    let row = state
        .db
        .table("roles")
        .eq("id", role_id)
        .select_single()
        .await
        .map_err(|err| db_error("get role", err))?;
    match row {
        Some(row) => role_from_value(row),
        None => Err(not_found("Role not found")),
    }
}

pub async fn create_role(state: &AppState, payload: RoleCreate) -> Result<RoleApi, ServiceError> {
    let role_id = payload
        .id
        .clone()
        .unwrap_or_else(|| short_id("role"));
    let row = payload.into_row(&role_id);
    let mut rows = state
        .db
        .table("roles")
        .insert(&json!([row]))
        .await
        .map_err(|err| db_error("create role", err))?;
    if rows.is_empty() {
        return Err(ServiceError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "db_error",
            "Failed to create role".to_string(),
        ));
    }
    role_from_value(rows.remove(0))
}

pub async fn update_role(
    state: &AppState,
    role_id: &str,
    payload: RoleUpdate,
) -> Result<RoleApi, ServiceError> {
    let changes = payload.changes();
    if changes.is_empty() {
        return Err(bad_request("No updates provided"));
    }
    let mut rows = state
        .db
        .table("roles")
        .eq("id", role_id)
        .update(&Value::Object(changes))
        .await
        .map_err(|err| db_error("update role", err))?;
    if rows.is_empty() {
        return Err(not_found("Role not found"));
    }
    role_from_value(rows.remove(0))
}

// ------------------- Explore items -------------------

fn explore_from_value(row: Value) -> Result<ExploreItemApi, ServiceError> {
    let row: ExploreItemRow = serde_json::from_value(row)
        .map_err(|err| db_error("decode explore row", err.to_string()))?;
    Ok(ExploreItemApi::from(row))
}

pub async fn list_explore_items(
    state: &AppState,
    params: ExploreListParams,
    default_limit: i64,
) -> Result<Vec<ExploreItemApi>, ServiceError> {
    let (offset, limit) = page(params.limit, params.offset, default_limit);
    let mut query = state
        .db
        .table("explore_items")
        .order("created_at", true)
        .range(offset, limit);
    if let Some(item_type) = params.item_type.as_deref() {
        query = query.eq("type", item_type);
    }
    let rows = query
        .select()
        .await
        .map_err(|err| db_error("list explore items", err))?;
    rows.into_iter().map(explore_from_value).collect()
}

pub async fn get_explore_item(
    state: &AppState,
    item_id: &str,
) -> Result<ExploreItemApi, ServiceError> {
    let row = state
        .db
        .table("explore_items")
        .eq("id", item_id)
        .select_single()
        .await
        .map_err(|err| db_error("get explore item", err))?;
    match row {
        Some(row) => explore_from_value(row),
        None => Err(not_found("Explore item not found")),
    }
}

pub async fn create_explore_item(
    state: &AppState,
    payload: ExploreItemCreate,
) -> Result<ExploreItemApi, ServiceError> {
    let item_id = payload
        .id
        .clone()
        .unwrap_or_else(|| short_id("explore"));
    let mut row = serde_json::to_value(&payload)
        .map_err(|err| db_error("encode explore item", err.to_string()))?;
    row["id"] = Value::String(item_id);
    let mut rows = state
        .db
        .table("explore_items")
        .insert(&json!([row]))
        .await
        .map_err(|err| db_error("create explore item", err))?;
    if rows.is_empty() {
        return Err(ServiceError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "db_error",
            "Failed to create explore item".to_string(),
        ));
    }
    explore_from_value(rows.remove(0))
}

pub async fn update_explore_item(
    state: &AppState,
    item_id: &str,
    payload: ExploreItemUpdate,
) -> Result<ExploreItemApi, ServiceError> {
    let changes = payload.changes();
    if changes.is_empty() {
        return Err(bad_request("No updates provided"));
    }
    let mut rows = state
        .db
        .table("explore_items")
        .eq("id", item_id)
        .update(&Value::Object(changes))
        .await
        .map_err(|err| db_error("update explore item", err))?;
    if rows.is_empty() {
        return Err(not_found("Explore item not found"));
    }
    explore_from_value(rows.remove(0))
}

pub async fn delete_explore_item(
    state: &AppState,
    item_id: &str,
) -> Result<DeletedResponse, ServiceError> {
    let rows = state
        .db
        .table("explore_items")
        .eq("id", item_id)
        .delete()
        .await
        .map_err(|err| db_error("delete explore item", err))?;
    if rows.is_empty() {
        return Err(not_found("Explore item not found"));
    }
    Ok(DeletedResponse {
        deleted: item_id.to_string(),
    })
}

// ------------------- Daily theater -------------------

pub async fn list_daily_tasks(state: &AppState, day_key: &str) -> Result<Vec<Value>, ServiceError> {
    state
        .db
        .table("daily_theater_tasks")
        .eq("day_key", day_key)
        .select()
        .await
        .map_err(|err| db_error("list daily tasks", err))
}

pub async fn complete_daily_task(state: &AppState, task_id: &str) -> Result<Value, ServiceError> {
    let mut rows = state
        .db
        .table("daily_theater_tasks")
        .eq("id", task_id)
        .update(&json!({"completed": true}))
        .await
        .map_err(|err| db_error("complete daily task", err))?;
    if rows.is_empty() {
        return Err(not_found("Task not found"));
    }
    Ok(rows.remove(0))
}

pub async fn list_daily_templates(
    state: &AppState,
    params: PageParams,
) -> Result<Vec<Value>, ServiceError> {
    let (offset, limit) = page(params.limit, params.offset, 200);
    state
        .db
        .table("daily_theater_templates")
        .order("created_at", true)
        .range(offset, limit)
        .select()
        .await
        .map_err(|err| db_error("list daily templates", err))
}

pub async fn create_daily_template(
    state: &AppState,
    payload: DailyTemplateCreate,
) -> Result<Value, ServiceError> {
    let template_id = payload
        .id
        .clone()
        .unwrap_or_else(|| short_id("template"));
    let mut row = serde_json::to_value(&payload)
        .map_err(|err| db_error("encode daily template", err.to_string()))?;
    row["id"] = Value::String(template_id);
    let mut rows = state
        .db
        .table("daily_theater_templates")
        .insert(&json!([row]))
        .await
        .map_err(|err| db_error("create daily template", err))?;
    if rows.is_empty() {
        return Err(ServiceError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "db_error",
            "Failed to create daily template".to_string(),
        ));
    }
    Ok(rows.remove(0))
}

pub async fn update_daily_template(
    state: &AppState,
    template_id: &str,
    payload: DailyTemplateUpdate,
) -> Result<Value, ServiceError> {
    let changes = payload.changes();
    if changes.is_empty() {
        return Err(bad_request("No updates provided"));
    }
    let mut rows = state
        .db
        .table("daily_theater_templates")
        .eq("id", template_id)
        .update(&Value::Object(changes))
        .await
        .map_err(|err| db_error("update daily template", err))?;
    if rows.is_empty() {
        return Err(not_found("Daily template not found"));
    }
    Ok(rows.remove(0))
}

pub async fn delete_daily_template(
    state: &AppState,
    template_id: &str,
) -> Result<DeletedResponse, ServiceError> {
    let rows = state
        .db
        .table("daily_theater_templates")
        .eq("id", template_id)
        .delete()
        .await
        .map_err(|err| db_error("delete daily template", err))?;
    if rows.is_empty() {
        return Err(not_found("Daily template not found"));
    }
    Ok(DeletedResponse {
        deleted: template_id.to_string(),
    })
}

/// Instantiate a fresh set of tasks for one day from randomly picked
/// templates, replacing whatever the day already had.
pub async fn generate_daily_tasks(
    state: &AppState,
    params: GenerateTasksParams,
) -> Result<Vec<Value>, ServiceError> {
    let day_key = NaiveDate::parse_from_str(&params.day_key, "%Y-%m-%d")
        .map_err(|_| bad_request("day_key must be YYYY-MM-DD"))?
        .to_string();
    let count = params.count.unwrap_or(3);
    if !(1..=10).contains(&count) {
        return Err(bad_request("count must be between 1 and 10"));
    }

    let mut templates = state
        .db
        .table("daily_theater_templates")
        .select()
        .await
        .map_err(|err| db_error("load daily templates", err))?;
    if templates.is_empty() {
        return Err(bad_request("No daily templates available"));
    }

    templates.shuffle(&mut rand::thread_rng());
    let selected = &templates[..count.min(templates.len())];

    state
        .db
        .table("daily_theater_tasks")
        .eq("day_key", &day_key)
        .delete()
        .await
        .map_err(|err| db_error("clear daily tasks", err))?;

    let payloads: Vec<Value> = selected
        .iter()
        .map(|template| {
            json!({
                "day_key": day_key,
                "template_id": template.get("id").cloned().unwrap_or(Value::Null),
                "title": template.get("title").cloned().unwrap_or(Value::Null),
                "description": template.get("description").cloned().unwrap_or(Value::Null),
                "scene": template.get("scene").cloned().unwrap_or(Value::Null),
                "target_role_id": template.get("target_role_id").cloned().unwrap_or(Value::Null),
                "kickoff_prompt": template.get("kickoff_prompt").cloned().unwrap_or(Value::Null),
                "difficulty": template.get("difficulty").cloned().unwrap_or(Value::Null),
                "target_words": template
                    .get("target_words")
                    .filter(|value| !value.is_null())
                    .cloned()
                    .unwrap_or_else(|| json!([])),
                "reward_points": template
                    .get("reward_points")
                    .and_then(Value::as_i64)
                    .unwrap_or(DEFAULT_REWARD_POINTS),
                "completed": false,
            })
        })
        .collect();

    state
        .db
        .table("daily_theater_tasks")
        .insert(&Value::Array(payloads))
        .await
        .map_err(|err| db_error("generate daily tasks", err))
}

// ------------------- Chat -------------------

pub async fn chat_completion(
    state: &AppState,
    payload: ChatCompletionRequest,
) -> Result<ChatCompletionResponse, ServiceError> {
    if payload.messages.is_empty() {
        return Err(bad_request("messages required"));
    }
    if payload.messages.len() > MAX_CHAT_MESSAGES {
        return Err(bad_request("too many messages"));
    }

    let role = if let Some(role) = payload.role {
        role
    } else if let Some(role_id) = payload.role_id.as_deref() {
        let row = state
            .db
            .table("roles")
            .eq("id", role_id)
            .select_single()
            .await
            .map_err(|err| db_error("get role for chat", err))?;
        let Some(row) = row else {
            return Err(not_found("Role not found"));
        };
        let row: RoleRow = serde_json::from_value(row)
            .map_err(|err| db_error("decode role row", err.to_string()))?;
        ChatRole {
            name: row.name,
            persona: row.persona,
            greeting: row.greeting,
        }
    } else {
        return Err(bad_request("role_id or role required"));
    };

    let system = crate::chat::build_system_prompt(&role);
    let start = payload.messages.len().saturating_sub(CHAT_HISTORY_WINDOW);
    let window = &payload.messages[start..];
    let content = state.chat.complete(&system, window).await?;
    Ok(ChatCompletionResponse { content })
}

// ------------------- Media generation -------------------

pub async fn generate_image(
    state: &AppState,
    payload: ImageGenerateRequest,
) -> Result<ImageGenerateResponse, ServiceError> {
    let prompt = payload.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(bad_request("prompt is required"));
    }
    let size = payload
        .size
        .as_deref()
        .map(str::trim)
        .filter(|size| !size.is_empty())
        .unwrap_or("1280*720")
        .to_string();

    let mut input = json!({"prompt": prompt});
    if let Some(negative) = payload.negative_prompt.as_deref().map(str::trim) {
        if !negative.is_empty() {
            input["negative_prompt"] = Value::String(negative.to_string());
        }
    }
    let mut parameters = json!({"size": size, "n": 1});
    if let Some(seed) = payload.seed {
        parameters["seed"] = Value::from(seed);
    }
    let body = json!({
        "model": state.media.image_model(),
        "input": input,
        "parameters": parameters,
    });

    let task_id = state.media.submit(media::IMAGE_SYNTHESIS_PATH, &body).await?;
    let result = state.media.poll(&task_id).await?;
    let image_url = media::extract_image_url(&result).ok_or_else(|| {
        ServiceError::new(
            StatusCode::BAD_GATEWAY,
            "provider_error",
            "image task did not return an image url".to_string(),
        )
    })?;

    let owner = sanitize_filename(payload.role_id.as_deref().unwrap_or("media"));
    let saved = if payload.save {
        Some(save_remote_asset(state, &image_url, &format!("roles/{owner}/images")).await?)
    } else {
        None
    };

    Ok(ImageGenerateResponse {
        task_id,
        status: "SUCCEEDED",
        image_url,
        saved,
        prompt,
        model: state.media.image_model().to_string(),
    })
}

pub async fn generate_video(
    state: &AppState,
    payload: VideoGenerateRequest,
) -> Result<VideoGenerateResponse, ServiceError> {
    let image_url = payload.image_url.trim().to_string();
    if image_url.is_empty() {
        return Err(bad_request("image_url is required"));
    }
    let duration = payload.duration.unwrap_or(5);
    if !(1..=10).contains(&duration) {
        return Err(bad_request("duration must be between 1 and 10 seconds"));
    }
    let resolution = payload
        .resolution
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("720P")
        .to_uppercase();
    let prompt = payload
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_VIDEO_PROMPT)
        .to_string();

    let body = json!({
        "model": state.media.video_model(),
        "input": {"img_url": image_url, "prompt": prompt},
        "parameters": {"resolution": resolution, "duration": duration},
    });

    let task_id = state.media.submit(media::VIDEO_SYNTHESIS_PATH, &body).await?;
    let result = state.media.poll(&task_id).await?;
    let video_url = media::extract_video_url(&result).ok_or_else(|| {
        ServiceError::new(
            StatusCode::BAD_GATEWAY,
            "provider_error",
            "video task did not return a video url".to_string(),
        )
    })?;

    let owner = sanitize_filename(payload.role_id.as_deref().unwrap_or("media"));
    let saved = if payload.save {
        Some(save_remote_asset(state, &video_url, &format!("roles/{owner}/videos")).await?)
    } else {
        None
    };
    let cover_image_url = media::extract_image_url(&result).or_else(|| {
        result
            .get("cover_image_url")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Ok(VideoGenerateResponse {
        task_id,
        status: "SUCCEEDED",
        video_url,
        cover_image_url,
        saved,
        prompt,
        model: state.media.video_model().to_string(),
        duration,
        resolution,
    })
}

pub async fn save_asset(
    state: &AppState,
    payload: AssetSaveRequest,
) -> Result<AssetSaveResponse, ServiceError> {
    let owner = sanitize_filename(payload.role_id.as_deref().unwrap_or("media"));
    let kind = sanitize_filename(payload.kind.as_deref().unwrap_or("assets"));
    let saved = save_remote_asset(state, &payload.url, &format!("roles/{owner}/{kind}")).await?;
    Ok(AssetSaveResponse { saved })
}

/// Download a remote asset and persist it to object storage under the given
/// prefix, returning the public URL.
async fn save_remote_asset(
    state: &AppState,
    remote_url: &str,
    prefix: &str,
) -> Result<SavedAsset, ServiceError> {
    if remote_url.trim().is_empty() {
        return Err(bad_request("url is required for saving"));
    }
    let Some(storage) = state.storage.as_ref() else {
        return Err(ServiceError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unconfigured",
            "object storage not configured".to_string(),
        ));
    };

    let (bytes, content_type) = state.media.download(remote_url).await?;
    let ext = media::guess_extension(remote_url, Some(&content_type));
    let path = format!("{}/{}{ext}", prefix.trim_end_matches('/'), asset_key());
    storage
        .put_object(&path, bytes, &content_type)
        .await
        .map_err(|err| {
            ServiceError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                format!("upload failed: {err}"),
            )
        })?;

    Ok(SavedAsset {
        url: storage.public_url(&path),
        path,
        bucket: storage.bucket().to_string(),
        content_type,
    })
}

pub async fn upload_asset(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadResponse, ServiceError> {
    let Some(storage) = state.storage.as_ref() else {
        return Err(ServiceError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "storage_unconfigured",
            "object storage not configured".to_string(),
        ));
    };

    let field = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(&format!("invalid multipart body: {err}")))?;
    let Some(field) = field else {
        return Err(bad_request("file field required"));
    };

    let filename = sanitize_filename(field.file_name().unwrap_or("upload"));
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|err| bad_request(&format!("invalid multipart body: {err}")))?;
    if bytes.is_empty() {
        return Err(bad_request("Empty file"));
    }

    let path = format!("admin/{}-{filename}", asset_key());
    storage
        .put_object(&path, bytes.to_vec(), &content_type)
        .await
        .map_err(|err| {
            ServiceError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                format!("upload failed: {err}"),
            )
        })?;

    Ok(UploadResponse {
        url: storage.public_url(&path),
        path,
        bucket: storage.bucket().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{page, sanitize_filename, short_id};

    #[test]
    fn sanitizes_unsafe_filename_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("路径.png"), "__.png");
    }

    #[test]
    fn filename_is_capped_at_120_chars() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_filename(&long).len(), 120);
    }

    #[test]
    fn short_ids_carry_prefix_and_ten_hex_chars() {
        let id = short_id("role");
        assert!(id.starts_with("role-"));
        assert_eq!(id.len(), "role-".len() + 10);
    }

    #[test]
    fn page_clamps_limit_and_offset() {
        assert_eq!(page(None, None, 100), (0, 100));
        assert_eq!(page(Some(9999), Some(-5), 100), (0, 500));
        assert_eq!(page(Some(0), Some(10), 100), (10, 1));
    }
}
