use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Minimal REST client for the hosted table and storage APIs, scoped to what
/// the seeding commands need.
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("SUPABASE_URL")
            .context("SUPABASE_URL is required")?
            .trim_end_matches('/')
            .to_string();
        let api_key = std::env::var("SUPABASE_SERVICE_KEY")
            .or_else(|_| std::env::var("SUPABASE_ANON_KEY"))
            .context("SUPABASE_SERVICE_KEY (or SUPABASE_ANON_KEY) is required")?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    pub async fn upsert(
        &self,
        table: &str,
        rows: &[Value],
        on_conflict: Option<&str>,
    ) -> Result<()> {
        let mut request = self
            .http
            .post(format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows);
        if let Some(columns) = on_conflict {
            request = request.query(&[("on_conflict", columns)]);
        }
        let response = request.send().await?;
        check(response, &format!("upsert into {table}")).await
    }

    pub async fn update_by_id(&self, table: &str, id: &str, changes: &Value) -> Result<()> {
        let response = self
            .http
            .patch(format!("{}/rest/v1/{}", self.base_url, table))
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .json(changes)
            .send()
            .await?;
        check(response, &format!("update {table} id={id}")).await
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/storage/v1/object/{}/{}",
                self.base_url, bucket, path
            ))
            .bearer_auth(self.api_key.as_str())
            .header("x-upsert", "true")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;
        check(response, &format!("upload {bucket}/{path}")).await
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }
}

async fn check(response: reqwest::Response, context: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(300).collect();
    bail!("{context} failed: {} {detail}", status.as_u16());
}
