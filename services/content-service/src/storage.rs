use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Credentials, config::Region, Client};

#[derive(Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    pub force_path_style: bool,
    pub public_base_url: Option<String>,
}

/// Object-storage client for generated and uploaded assets.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    bucket: String,
    endpoint: String,
    public_base_url: Option<String>,
}

impl StorageClient {
    pub async fn new(config: StorageConfig) -> Result<Self, String> {
        let credentials = Credentials::new(
            config.access_key,
            config.secret_key,
            None,
            None,
            "mira",
        );
        let region = Region::new(config.region);
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint.clone())
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket,
            endpoint: config.endpoint,
            public_base_url: config.public_base_url,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), String> {
        self.ensure_bucket().await?;
        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .content_type(content_type)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|err| format!("put object failed: {err}"))?;
        Ok(())
    }

    /// Public URL for an uploaded key, preferring the configured CDN base.
    pub fn public_url(&self, key: &str) -> String {
        let base = self
            .public_base_url
            .as_deref()
            .unwrap_or(self.endpoint.as_str());
        object_url(base, &self.bucket, key)
    }

    async fn ensure_bucket(&self) -> Result<(), String> {
        let exists = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await
            .is_ok();
        if !exists {
            self.client
                .create_bucket()
                .bucket(self.bucket.as_str())
                .send()
                .await
                .map_err(|err| format!("create bucket failed: {err}"))?;
        }
        Ok(())
    }
}

pub fn object_url(base: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::object_url;

    #[test]
    fn joins_base_bucket_and_key() {
        assert_eq!(
            object_url("https://cdn.example/", "mira-assets", "roles/a/images/x.png"),
            "https://cdn.example/mira-assets/roles/a/images/x.png"
        );
    }
}
