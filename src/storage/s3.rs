use super::{ListPage, RemoteObject, Storage, StorageClass, LIST_PAGE_SIZE};
use crate::config::Credentials;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;

/// S3 连接参数
#[derive(Debug, Clone)]
pub struct S3Options {
    pub bucket: String,
    pub region: String,
    pub credentials: Option<Credentials>,
    /// 自定义 endpoint（COS、MinIO 等兼容服务）
    pub endpoint: Option<String>,
    /// 启用传输加速
    pub accelerate: bool,
}

pub struct S3Storage {
    client: Client,
    bucket: String,
    name: String,
}

impl S3Storage {
    pub async fn new(options: S3Options) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(options.region.clone()));

        // 未提供密钥时走默认凭证链
        if let Some(creds) = &options.credentials {
            loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
                creds.secret_id.clone(),
                creds.secret_key.clone(),
                None,
                None,
                "bucketsync",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).accelerate(options.accelerate);

        if let Some(ref ep) = options.endpoint {
            builder = builder.endpoint_url(ep).force_path_style(true);
        }

        let client = Client::from_conf(builder.build());
        let name = format!("s3://{}", options.bucket);

        Self {
            client,
            bucket: options.bucket,
            name,
        }
    }

    fn storage_class(class: StorageClass) -> aws_sdk_s3::types::StorageClass {
        match class {
            StorageClass::Standard => aws_sdk_s3::types::StorageClass::Standard,
            StorageClass::StandardIa => aws_sdk_s3::types::StorageClass::StandardIa,
            StorageClass::Archive => aws_sdk_s3::types::StorageClass::Glacier,
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(LIST_PAGE_SIZE);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }
        if let Some(token) = marker {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(e)))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                Some(RemoteObject {
                    key: obj.key()?.to_string(),
                    etag: obj.e_tag().unwrap_or_default().to_string(),
                })
            })
            .collect();

        let is_truncated = response.is_truncated().unwrap_or(false);
        Ok(ListPage {
            objects,
            is_truncated,
            next_marker: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn put_object(&self, key: &str, source: &Path, storage_class: StorageClass) -> Result<()> {
        // from_path 按块读取文件，不会把整个文件载入内存
        let body = ByteStream::from_path(source).await?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .storage_class(Self::storage_class(storage_class))
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        // S3 删除不存在的对象不会报错
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| anyhow!("{}", DisplayErrorContext(e)))?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
