use serde::Deserialize;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    /// AWS region name, e.g. "us-east-1". Ignored by most S3-compatible servers.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, R2, ...). When absent, AWS endpoints are used.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Use `endpoint/bucket/key` URLs instead of virtual-host style.
    #[serde(default)]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".into()
}
