pub mod memory;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub use memory::MemoryStorage;
pub use s3::S3Storage;

// ============ 公共常量 ============

/// 单次列表请求返回的最大条目数
pub const LIST_PAGE_SIZE: i32 = 1000;

/// 列表中的单个远程对象
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// 完整对象 key（包含前缀）
    pub key: String,
    /// 存储服务返回的内容标识（通常是 ETag）
    pub etag: String,
}

/// 一页列表结果
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<RemoteObject>,
    /// 是否还有后续页
    pub is_truncated: bool,
    /// 续页标记，仅在 is_truncated 为 true 时有意义
    pub next_marker: Option<String>,
}

/// 存储类型（耐久性/可用性等级）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    StandardIa,
    Archive,
}

impl std::str::FromStr for StorageClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STANDARD" => Ok(StorageClass::Standard),
            "STANDARD_IA" => Ok(StorageClass::StandardIa),
            "ARCHIVE" | "GLACIER" => Ok(StorageClass::Archive),
            other => Err(format!("未知的存储类型: {}", other)),
        }
    }
}

impl std::fmt::Display for StorageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageClass::Standard => write!(f, "STANDARD"),
            StorageClass::StandardIa => write!(f, "STANDARD_IA"),
            StorageClass::Archive => write!(f, "ARCHIVE"),
        }
    }
}

/// 对象存储抽象接口
///
/// bucket 与 region 在实例创建时确定，这里只传 key。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 列出 prefix 下的一页对象，marker 为上一页返回的续页标记
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage>;

    /// 以流的方式把本地文件上传到 key
    async fn put_object(&self, key: &str, source: &Path, storage_class: StorageClass) -> Result<()>;

    /// 删除对象
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建存储实例
pub async fn create_storage(config: &crate::config::SyncConfig) -> Result<Arc<dyn Storage>> {
    tracing::info!(
        "初始化S3存储: bucket={}, region={}, accelerate={}",
        config.bucket,
        config.region,
        config.accelerate
    );
    let storage = S3Storage::new(s3::S3Options {
        bucket: config.bucket.clone(),
        region: config.region.clone(),
        credentials: config.credentials(),
        endpoint: config.endpoint.clone(),
        accelerate: config.accelerate,
    })
    .await;
    Ok(Arc::new(storage) as Arc<dyn Storage>)
}
