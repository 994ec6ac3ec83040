// S3 Client Construction

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::Client;

/// Connection settings for one S3-compatible endpoint
///
/// Credentials come from the standard AWS provider chain (env vars, shared
/// config, instance metadata); only addressing is configured here.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO etc.); None for AWS
    pub endpoint: Option<String>,
    /// Path-style addressing, required by most S3-compatible stores
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            force_path_style: false,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self.force_path_style = true;
        self
    }
}

/// Build an S3 client from the provider chain plus the given addressing
pub async fn build_client(config: &S3Config) -> Client {
    let base = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&base)
        .force_path_style(config.force_path_style);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint);
    }

    Client::from_conf(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_endpoint_implies_path_style() {
        let config = S3Config::new("us-east-1").with_endpoint("http://localhost:9000");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.force_path_style);
    }

    #[test]
    fn aws_default_uses_virtual_hosting() {
        let config = S3Config::new("eu-west-1");
        assert!(config.endpoint.is_none());
        assert!(!config.force_path_style);
    }
}
