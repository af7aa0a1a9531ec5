use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ------------------- Roles -------------------

/// Row shape of the hosted `roles` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub hero_image_url: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub greeting: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub script: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Client-facing camelCase shape for roles.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleApi {
    pub id: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub hero_image: Option<String>,
    pub persona: Option<String>,
    pub mood: Option<String>,
    pub greeting: Option<String>,
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub script: Vec<String>,
    pub status: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<RoleRow> for RoleApi {
    fn from(row: RoleRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            avatar: row.avatar_url,
            hero_image: row.hero_image_url,
            persona: row.persona,
            mood: row.mood,
            greeting: row.greeting,
            title: row.title,
            city: row.city,
            description: row.description,
            tags: row.tags.unwrap_or_default(),
            script: row.script.unwrap_or_default(),
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleCreate {
    pub id: Option<String>,
    pub name: String,
    pub avatar_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub persona: Option<String>,
    pub mood: Option<String>,
    pub greeting: Option<String>,
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub script: Vec<String>,
}

impl RoleCreate {
    /// Insert payload restricted to the seeded table columns.
    pub fn into_row(self, id: &str) -> Value {
        let mut row = Map::new();
        row.insert("id".to_string(), Value::String(id.to_string()));
        row.insert("name".to_string(), Value::String(self.name));
        insert_opt(&mut row, "avatar_url", self.avatar_url);
        insert_opt(&mut row, "hero_image_url", self.hero_image_url);
        insert_opt(&mut row, "persona", self.persona);
        insert_opt(&mut row, "mood", self.mood);
        insert_opt(&mut row, "greeting", self.greeting);
        insert_opt(&mut row, "title", self.title);
        insert_opt(&mut row, "city", self.city);
        insert_opt(&mut row, "description", self.description);
        row.insert("tags".to_string(), Value::from(self.tags));
        row.insert("script".to_string(), Value::from(self.script));
        Value::Object(row)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub hero_image_url: Option<String>,
    pub persona: Option<String>,
    pub mood: Option<String>,
    pub greeting: Option<String>,
    pub title: Option<String>,
    pub city: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub script: Option<Vec<String>>,
    pub status: Option<String>,
}

impl RoleUpdate {
    pub fn changes(self) -> Map<String, Value> {
        let mut changes = Map::new();
        insert_opt(&mut changes, "name", self.name);
        insert_opt(&mut changes, "avatar_url", self.avatar_url);
        insert_opt(&mut changes, "hero_image_url", self.hero_image_url);
        insert_opt(&mut changes, "persona", self.persona);
        insert_opt(&mut changes, "mood", self.mood);
        insert_opt(&mut changes, "greeting", self.greeting);
        insert_opt(&mut changes, "title", self.title);
        insert_opt(&mut changes, "city", self.city);
        insert_opt(&mut changes, "description", self.description);
        if let Some(tags) = self.tags {
            changes.insert("tags".to_string(), Value::from(tags));
        }
        if let Some(script) = self.script {
            changes.insert("script".to_string(), Value::from(script));
        }
        insert_opt(&mut changes, "status", self.status);
        changes
    }
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::String(value));
    }
}

// ------------------- Explore items -------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExploreItemRow {
    pub id: String,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub world_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_label: Option<String>,
    #[serde(default)]
    pub author_avatar_url: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub cover_height: Option<i64>,
    #[serde(default)]
    pub stats: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub content: Option<Vec<String>>,
    #[serde(default)]
    pub world: Option<Value>,
    #[serde(default)]
    pub target_role_id: Option<String>,
    #[serde(default)]
    pub recommended_roles: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ExploreAuthor {
    pub name: Option<String>,
    pub label: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploreItemApi {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub post_type: Option<String>,
    pub world_type: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub author: ExploreAuthor,
    pub images: Vec<String>,
    pub cover_height: Option<i64>,
    pub stats: Value,
    pub created_at: Option<String>,
    pub content: Vec<String>,
    pub world: Value,
    pub target_role_id: Option<String>,
    pub recommended_roles: Vec<String>,
}

impl From<ExploreItemRow> for ExploreItemApi {
    fn from(row: ExploreItemRow) -> Self {
        Self {
            id: row.id,
            item_type: row.item_type,
            post_type: row.post_type,
            world_type: row.world_type,
            title: row.title,
            summary: row.summary,
            location: row.location,
            tags: row.tags.unwrap_or_default(),
            author: ExploreAuthor {
                name: row.author_name,
                label: row.author_label,
                avatar: row.author_avatar_url,
            },
            images: row.images.unwrap_or_default(),
            cover_height: row.cover_height,
            stats: row.stats.unwrap_or_else(empty_object),
            created_at: row.created_at,
            content: row.content.unwrap_or_default(),
            world: row.world.unwrap_or_else(empty_object),
            target_role_id: row.target_role_id,
            recommended_roles: row.recommended_roles.unwrap_or_default(),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExploreItemCreate {
    #[serde(skip_serializing)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    pub title: String,
    pub summary: Option<String>,
    pub post_type: Option<String>,
    pub world_type: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_name: Option<String>,
    pub author_label: Option<String>,
    pub author_avatar_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub cover_height: Option<i64>,
    #[serde(default = "empty_object")]
    pub stats: Value,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default = "empty_object")]
    pub world: Value,
    pub target_role_id: Option<String>,
    #[serde(default)]
    pub recommended_roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExploreItemUpdate {
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub post_type: Option<String>,
    pub world_type: Option<String>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author_name: Option<String>,
    pub author_label: Option<String>,
    pub author_avatar_url: Option<String>,
    pub images: Option<Vec<String>>,
    pub cover_height: Option<i64>,
    pub stats: Option<Value>,
    pub content: Option<Vec<String>>,
    pub world: Option<Value>,
    pub target_role_id: Option<String>,
    pub recommended_roles: Option<Vec<String>>,
}

impl ExploreItemUpdate {
    pub fn changes(self) -> Map<String, Value> {
        let mut changes = Map::new();
        insert_opt(&mut changes, "type", self.item_type);
        insert_opt(&mut changes, "title", self.title);
        insert_opt(&mut changes, "summary", self.summary);
        insert_opt(&mut changes, "post_type", self.post_type);
        insert_opt(&mut changes, "world_type", self.world_type);
        insert_opt(&mut changes, "location", self.location);
        if let Some(tags) = self.tags {
            changes.insert("tags".to_string(), Value::from(tags));
        }
        insert_opt(&mut changes, "author_name", self.author_name);
        insert_opt(&mut changes, "author_label", self.author_label);
        insert_opt(&mut changes, "author_avatar_url", self.author_avatar_url);
        if let Some(images) = self.images {
            changes.insert("images".to_string(), Value::from(images));
        }
        if let Some(cover_height) = self.cover_height {
            changes.insert("cover_height".to_string(), Value::from(cover_height));
        }
        if let Some(stats) = self.stats {
            changes.insert("stats".to_string(), stats);
        }
        if let Some(content) = self.content {
            changes.insert("content".to_string(), Value::from(content));
        }
        if let Some(world) = self.world {
            changes.insert("world".to_string(), world);
        }
        insert_opt(&mut changes, "target_role_id", self.target_role_id);
        if let Some(recommended_roles) = self.recommended_roles {
            changes.insert("recommended_roles".to_string(), Value::from(recommended_roles));
        }
        changes
    }
}

// ------------------- Daily theater -------------------

#[derive(Debug, Deserialize, Serialize)]
pub struct DailyTemplateCreate {
    #[serde(skip_serializing)]
    pub id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub scene: Option<String>,
    pub target_role_id: Option<String>,
    pub kickoff_prompt: Option<String>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub target_words: Vec<String>,
    pub reward_points: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DailyTemplateUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub scene: Option<String>,
    pub target_role_id: Option<String>,
    pub kickoff_prompt: Option<String>,
    pub difficulty: Option<String>,
    pub target_words: Option<Vec<String>>,
    pub reward_points: Option<i64>,
}

impl DailyTemplateUpdate {
    pub fn changes(self) -> Map<String, Value> {
        let mut changes = Map::new();
        insert_opt(&mut changes, "title", self.title);
        insert_opt(&mut changes, "description", self.description);
        insert_opt(&mut changes, "scene", self.scene);
        insert_opt(&mut changes, "target_role_id", self.target_role_id);
        insert_opt(&mut changes, "kickoff_prompt", self.kickoff_prompt);
        insert_opt(&mut changes, "difficulty", self.difficulty);
        if let Some(target_words) = self.target_words {
            changes.insert("target_words".to_string(), Value::from(target_words));
        }
        if let Some(reward_points) = self.reward_points {
            changes.insert("reward_points".to_string(), Value::from(reward_points));
        }
        changes
    }
}

// ------------------- Query parameters -------------------

#[derive(Debug, Default, Deserialize)]
pub struct RoleListParams {
    #[serde(default)]
    pub include_unpublished: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExploreListParams {
    pub item_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DayKeyParams {
    pub day_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTasksParams {
    pub day_key: String,
    pub count: Option<usize>,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub deleted: String,
}

// ------------------- Chat -------------------

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRole {
    pub name: Option<String>,
    pub persona: Option<String>,
    pub greeting: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub role_id: Option<String>,
    pub role: Option<ChatRole>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct ChatCompletionResponse {
    pub content: String,
}

// ------------------- Media generation -------------------

#[derive(Debug, Deserialize)]
pub struct ImageGenerateRequest {
    pub prompt: String,
    pub size: Option<String>,
    pub negative_prompt: Option<String>,
    pub seed: Option<u32>,
    pub role_id: Option<String>,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Deserialize)]
pub struct VideoGenerateRequest {
    pub image_url: String,
    pub prompt: Option<String>,
    pub duration: Option<u32>,
    pub resolution: Option<String>,
    pub role_id: Option<String>,
    #[serde(default)]
    pub save: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssetSaveRequest {
    pub url: String,
    pub role_id: Option<String>,
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAsset {
    pub url: String,
    pub path: String,
    pub bucket: String,
    pub content_type: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenerateResponse {
    pub task_id: String,
    pub status: &'static str,
    pub image_url: String,
    pub saved: Option<SavedAsset>,
    pub prompt: String,
    pub model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGenerateResponse {
    pub task_id: String,
    pub status: &'static str,
    pub video_url: String,
    pub cover_image_url: Option<String>,
    pub saved: Option<SavedAsset>,
    pub prompt: String,
    pub model: String,
    pub duration: u32,
    pub resolution: String,
}

#[derive(Serialize)]
pub struct AssetSaveResponse {
    pub saved: SavedAsset,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub path: String,
    pub bucket: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_create_row_skips_missing_fields() {
        let payload: RoleCreate = serde_json::from_value(json!({
            "name": "Antoine",
            "persona": "calm pianist",
        }))
        .unwrap();
        let row = payload.into_row("role-abc");
        assert_eq!(row["id"], "role-abc");
        assert_eq!(row["persona"], "calm pianist");
        assert!(row.get("avatar_url").is_none());
        assert_eq!(row["tags"], json!([]));
    }

    #[test]
    fn role_row_maps_to_camel_case_api() {
        let row: RoleRow = serde_json::from_value(json!({
            "id": "role-1",
            "name": "Edward",
            "avatar_url": "https://cdn.example/a.png",
            "hero_image_url": "https://cdn.example/h.png",
            "tags": ["calm"],
        }))
        .unwrap();
        let api = RoleApi::from(row);
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(value["avatar"], "https://cdn.example/a.png");
        assert_eq!(value["heroImage"], "https://cdn.example/h.png");
        assert_eq!(value["tags"], json!(["calm"]));
        assert_eq!(value["script"], json!([]));
    }

    #[test]
    fn update_changes_only_include_set_fields() {
        let update: RoleUpdate = serde_json::from_value(json!({
            "mood": "wistful",
            "tags": ["new"],
        }))
        .unwrap();
        let changes = update.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["mood"], "wistful");
    }

    #[test]
    fn explore_row_defaults_collections() {
        let row: ExploreItemRow = serde_json::from_value(json!({
            "id": "explore-1",
            "type": "post",
            "author_name": "June",
        }))
        .unwrap();
        let api = ExploreItemApi::from(row);
        let value = serde_json::to_value(&api).unwrap();
        assert_eq!(value["author"]["name"], "June");
        assert_eq!(value["stats"], json!({}));
        assert_eq!(value["world"], json!({}));
        assert_eq!(value["recommendedRoles"], json!([]));
    }
}
