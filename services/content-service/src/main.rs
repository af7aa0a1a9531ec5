mod app;
mod auth;
mod chat;
mod db;
mod handlers;
mod media;
mod models;
mod service;
mod state;
mod storage;

use std::time::Duration;

use mira_common::{bind_listener, env_or, init_tracing, shutdown_signal, split_csv};

use crate::auth::AdminCredentials;
use crate::chat::{ChatClient, ChatConfig};
use crate::db::TableClient;
use crate::media::{MediaClient, MediaConfig};
use crate::state::AppState;
use crate::storage::{StorageClient, StorageConfig};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let _guards = init_tracing("content-service");

    let port = env_or("PORT", 8080u16);
    // The hosted table API is required; everything else degrades gracefully.
    let base_url = std::env::var("SUPABASE_URL").expect("SUPABASE_URL is required");
    let api_key = std::env::var("SUPABASE_SERVICE_KEY")
        .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
        .expect("SUPABASE_SERVICE_KEY (or SUPABASE_ANON_KEY) is required");

    let http = reqwest::Client::new();
    let db = TableClient::new(http.clone(), &base_url, &api_key);

    let provider_key = std::env::var("DASHSCOPE_API_KEY")
        .or_else(|_| std::env::var("BAILIAN_API_KEY"))
        .unwrap_or_default();
    let provider_endpoint = std::env::var("DASHSCOPE_ENDPOINT")
        .unwrap_or_else(|_| "https://dashscope.aliyuncs.com".to_string())
        .trim_end_matches('/')
        .to_string();
    if provider_key.is_empty() {
        tracing::warn!("no generation provider key configured, chat and media endpoints will 503");
    }

    let chat = ChatClient::new(
        http.clone(),
        ChatConfig {
            endpoint: provider_endpoint.clone(),
            api_key: provider_key.clone(),
            model: std::env::var("DASHSCOPE_CHAT_MODEL")
                .unwrap_or_else(|_| "qwen-turbo".to_string()),
        },
    );
    let media = MediaClient::new(
        http.clone(),
        MediaConfig {
            endpoint: provider_endpoint,
            api_key: provider_key,
            image_model: std::env::var("MEDIA_IMAGE_MODEL")
                .unwrap_or_else(|_| "wan2.2-t2i-plus".to_string()),
            video_model: std::env::var("MEDIA_VIDEO_MODEL")
                .unwrap_or_else(|_| "wan2.2-i2v-plus".to_string()),
            poll_attempts: env_or("MEDIA_POLL_ATTEMPTS", 40u32),
            poll_interval: Duration::from_millis(env_or("MEDIA_POLL_INTERVAL_MS", 3000u64)),
        },
    );

    let storage = build_storage().await;
    let admin = AdminCredentials {
        user: std::env::var("ADMIN_USER").unwrap_or_default(),
        password: std::env::var("ADMIN_PASSWORD").unwrap_or_default(),
    };
    let cors_origins = std::env::var("CORS_ORIGINS")
        .map(|value| split_csv(&value))
        .unwrap_or_default();

    let state = AppState {
        db,
        chat,
        media,
        storage,
        admin,
    };
    let app = app::build_router(state, cors_origins);
    let listener = bind_listener(port).await;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}

async fn build_storage() -> Option<StorageClient> {
    let endpoint = std::env::var("STORAGE_ENDPOINT").ok()?;
    let access_key = std::env::var("STORAGE_ACCESS_KEY").ok()?;
    let secret_key = std::env::var("STORAGE_SECRET_KEY").ok()?;
    let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "mira-assets".to_string());
    let region = std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let force_path_style = std::env::var("STORAGE_FORCE_PATH_STYLE")
        .ok()
        .map(|value| value != "0")
        .unwrap_or(true);
    let public_base_url = std::env::var("STORAGE_PUBLIC_URL").ok();
    let config = StorageConfig {
        endpoint,
        access_key,
        secret_key,
        bucket,
        region,
        force_path_style,
        public_base_url,
    };
    match StorageClient::new(config).await {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(error = %err, "object storage client init failed");
            None
        }
    }
}
