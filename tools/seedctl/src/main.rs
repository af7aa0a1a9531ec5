mod extract;
mod rest;
mod seed;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use crate::rest::RestClient;

#[derive(Parser)]
#[command(name = "seedctl", about = "Seed and inspect the content database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upsert the JSON seed files into the database.
    Seed {
        /// Directory holding roles.json, explore_items.json, ...
        #[arg(long, default_value = "seed")]
        dir: PathBuf,
    },
    /// Scrape role definitions out of a JS bundle into a seed file.
    ExtractRoles {
        /// Source JS file to scan.
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "roles_from_mobile.json")]
        output: PathBuf,
        /// Role ids to extract.
        #[arg(long, required = true, num_args = 1..)]
        ids: Vec<String>,
    },
    /// Upload local avatar images and point the role rows at them.
    UploadAssets {
        /// Directory holding the image files.
        #[arg(long, default_value = "assets")]
        dir: PathBuf,
        /// JSON file mapping role id to file name.
        #[arg(long)]
        mapping: PathBuf,
    },
    /// Print every base table, grouped by schema.
    ListTables,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Seed { dir } => {
            let rest = RestClient::from_env()?;
            seed::run(&rest, &dir).await
        }
        Command::ExtractRoles { input, output, ids } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let roles = extract::extract_roles(&content, &ids);
            info!(found = roles.len(), requested = ids.len(), "extracted roles");
            extract::write_roles(&output, &roles)
        }
        Command::UploadAssets { dir, mapping } => {
            let rest = RestClient::from_env()?;
            upload_assets(&rest, &dir, &mapping).await
        }
        Command::ListTables => list_tables().await,
    }
}

async fn upload_assets(rest: &RestClient, dir: &std::path::Path, mapping: &std::path::Path) -> Result<()> {
    let bucket = std::env::var("ASSET_BUCKET").unwrap_or_else(|_| "mira-assets".to_string());
    let text = std::fs::read_to_string(mapping)
        .with_context(|| format!("reading {}", mapping.display()))?;
    let entries: BTreeMap<String, String> = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", mapping.display()))?;

    for (role_id, file_name) in entries {
        let source = dir.join(&file_name);
        let bytes = std::fs::read(&source)
            .with_context(|| format!("reading {}", source.display()))?;
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string());
        let path = format!("roles/{role_id}/avatar.{ext}");
        rest.upload_object(&bucket, &path, bytes, content_type_for(&ext))
            .await?;
        let url = rest.public_object_url(&bucket, &path);
        rest.update_by_id("roles", &role_id, &json!({"avatar_url": url.clone()}))
            .await?;
        info!(role_id, url, "uploaded avatar");
    }
    Ok(())
}

fn content_type_for(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

async fn list_tables() -> Result<()> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL is required")?;
    let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("database connection error: {e}");
        }
    });

    let rows = client
        .query(
            "SELECT table_schema, table_name FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' \
             AND table_schema NOT IN ('pg_catalog', 'information_schema') \
             ORDER BY table_schema, table_name",
            &[],
        )
        .await?;

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let schema: String = row.get(0);
        let table: String = row.get(1);
        grouped.entry(schema).or_default().push(table);
    }
    println!("{}", serde_json::to_string_pretty(&grouped)?);
    Ok(())
}
