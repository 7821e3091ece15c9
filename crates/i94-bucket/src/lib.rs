//! Read access to the object storage holding the raw I94 datasets.
//!
//! A storage root is either an `s3://bucket/prefix` URI or a local directory.
//! Both are served through [`BucketStore`], keyed relative to the root.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

const S3_SCHEME: &str = "s3://";

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("sdk error: {0}")]
    Sdk(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BucketError {
    fn from_sdk(err: impl fmt::Display) -> Self {
        Self::Sdk(err.to_string())
    }
}

/// Where the raw datasets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageRoot {
    S3 { bucket: String, prefix: String },
    Local(PathBuf),
}

impl FromStr for StorageRoot {
    type Err = BucketError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(BucketError::Configuration(
                "storage root cannot be empty".into(),
            ));
        }

        match raw.strip_prefix(S3_SCHEME) {
            Some(rest) => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(BucketError::Configuration(format!(
                        "storage root {raw} has no bucket name"
                    )));
                }
                Ok(StorageRoot::S3 {
                    bucket: bucket.to_string(),
                    prefix: prefix.trim_matches('/').to_string(),
                })
            }
            None => Ok(StorageRoot::Local(PathBuf::from(raw))),
        }
    }
}

impl fmt::Display for StorageRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageRoot::S3 { bucket, prefix } if prefix.is_empty() => {
                write!(f, "{S3_SCHEME}{bucket}")
            }
            StorageRoot::S3 { bucket, prefix } => write!(f, "{S3_SCHEME}{bucket}/{prefix}"),
            StorageRoot::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Joins a dataset key onto a key prefix with exactly one separator.
pub fn join_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let key = key.trim_start_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetches the full object stored under `key`, relative to the store's root.
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError>;

    /// Human-readable location of `key`, used in logs and errors.
    fn locate(&self, key: &str) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

#[derive(Clone)]
pub struct S3BucketStore {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3BucketStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.bucket.is_empty() {
            return Err(BucketError::Configuration(
                "bucket name cannot be empty".into(),
            ));
        }
        if config.region.is_empty() {
            return Err(BucketError::Configuration("region cannot be empty".into()));
        }

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: config.prefix,
        })
    }
}

#[async_trait]
impl BucketStore for S3BucketStore {
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let full_key = join_key(&self.prefix, key);
        debug!(bucket = %self.bucket, key = %full_key, "fetching object");

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(service_err) => {
                    let message = service_err.err().to_string();
                    if message.contains("NoSuchKey") {
                        BucketError::NotFound(self.locate(key))
                    } else {
                        BucketError::from_sdk(message)
                    }
                }
                other => BucketError::from_sdk(other),
            })?;

        let data = output.body.collect().await.map_err(BucketError::from_sdk)?;
        Ok(data.into_bytes())
    }

    fn locate(&self, key: &str) -> String {
        format!("{S3_SCHEME}{}/{}", self.bucket, join_key(&self.prefix, key))
    }
}

/// Serves objects from a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBucketStore {
    root: PathBuf,
}

impl LocalBucketStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

#[async_trait]
impl BucketStore for LocalBucketStore {
    async fn get_object(&self, key: &str) -> Result<Bytes, BucketError> {
        let path = self.path_for(key);
        debug!(path = %path.display(), "reading object");

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BucketError::NotFound(path.display().to_string()))
            }
            Err(source) => Err(BucketError::Io { path, source }),
        }
    }

    fn locate(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// Opens the store for `root`. `s3` supplies region, endpoint and credentials
/// when the root is an S3 URI; its bucket and prefix are taken from the root.
pub async fn open_store(
    root: &StorageRoot,
    s3: S3Config,
) -> Result<Box<dyn BucketStore>, BucketError> {
    match root {
        StorageRoot::S3 { bucket, prefix } => {
            let config = S3Config {
                bucket: bucket.clone(),
                prefix: prefix.clone(),
                ..s3
            };
            Ok(Box::new(S3BucketStore::new(config).await?))
        }
        StorageRoot::Local(path) => {
            if !path.is_dir() {
                return Err(BucketError::Configuration(format!(
                    "local storage root {} is not a directory",
                    path.display()
                )));
            }
            Ok(Box::new(LocalBucketStore::new(path.clone())))
        }
    }
}
