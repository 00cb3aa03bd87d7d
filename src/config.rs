//! 同步配置模块

use crate::core::ExcludeFilter;
use crate::error::{Result, SyncError};
use crate::logging::LogConfig;
use crate::storage::StorageClass;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 访问密钥
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"***")
            .finish()
    }
}

/// 同步配置
///
/// 来源优先级：命令行 > 环境变量 > JSON 配置文件。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_id: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    pub bucket: String,
    pub region: String,
    /// 自定义 endpoint（S3 兼容服务）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub local_path: PathBuf,
    /// 远程前缀，空表示 bucket 根目录
    pub remote_path: String,
    /// 删除远程有而本地没有的对象
    pub clean: bool,
    /// 启用传输加速
    pub accelerate: bool,
    /// 最大并发传输数，1 表示严格顺序执行
    pub concurrency: usize,
    /// 排除规则（glob patterns），同时作用于本地和远程
    pub exclude: Vec<String>,
    /// 只比较，不上传也不删除
    pub dry_run: bool,
    pub storage_class: StorageClass,
    pub log: LogConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            secret_id: None,
            secret_key: None,
            bucket: String::new(),
            region: String::new(),
            endpoint: None,
            local_path: PathBuf::new(),
            remote_path: String::new(),
            clean: false,
            accelerate: false,
            concurrency: 1,
            exclude: Vec::new(),
            dry_run: false,
            storage_class: StorageClass::Standard,
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    /// 从 JSON 配置文件加载
    pub fn load(config_file: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_file).map_err(|e| {
            SyncError::Config(format!("无法读取配置文件 {}: {}", config_file.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            SyncError::Config(format!("配置文件格式错误 {}: {}", config_file.display(), e))
        })
    }

    /// 两个密钥都提供时返回静态凭证，否则使用默认凭证链
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.secret_id, &self.secret_key) {
            (Some(id), Some(key)) => Some(Credentials {
                secret_id: id.clone(),
                secret_key: key.clone(),
            }),
            _ => None,
        }
    }

    /// 编译排除规则
    pub fn exclude_filter(&self) -> Result<ExcludeFilter> {
        ExcludeFilter::new(&self.exclude)
            .map_err(|e| SyncError::Config(format!("排除规则无效: {}", e)))
    }

    /// 在任何 IO 之前检查必填项
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(SyncError::Config("缺少 bucket".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(SyncError::Config("缺少 region".to_string()));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(SyncError::Config("缺少 local_path".to_string()));
        }
        match (&self.secret_id, &self.secret_key) {
            (Some(_), None) => return Err(SyncError::Config("缺少 secret_key".to_string())),
            (None, Some(_)) => return Err(SyncError::Config("缺少 secret_id".to_string())),
            _ => {}
        }
        if self.concurrency == 0 {
            return Err(SyncError::Config("concurrency 必须大于 0".to_string()));
        }
        self.exclude_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> SyncConfig {
        SyncConfig {
            bucket: "site-1250000000".to_string(),
            region: "ap-guangzhou".to_string(),
            local_path: PathBuf::from("dist"),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_required_fields() {
        for config in [
            SyncConfig {
                bucket: String::new(),
                ..valid()
            },
            SyncConfig {
                region: " ".to_string(),
                ..valid()
            },
            SyncConfig {
                local_path: PathBuf::new(),
                ..valid()
            },
            SyncConfig {
                concurrency: 0,
                ..valid()
            },
            SyncConfig {
                secret_id: Some("id".to_string()),
                ..valid()
            },
        ] {
            assert!(matches!(config.validate(), Err(SyncError::Config(_))));
        }
    }

    #[test]
    fn test_credentials_pair() {
        let config = SyncConfig {
            secret_id: Some("id".to_string()),
            secret_key: Some("key".to_string()),
            ..valid()
        };
        let creds = config.credentials().unwrap();
        assert_eq!(creds.secret_id, "id");
        assert!(!format!("{:?}", creds).contains("\"key\""));
        assert!(valid().credentials().is_none());
    }

    #[test]
    fn test_load_json_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"{
                "bucket": "b",
                "region": "r",
                "localPath": "public",
                "remotePath": "/blog",
                "clean": true,
                "storageClass": "STANDARD_IA",
                "log": { "level": "debug" }
            }"#,
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.local_path, PathBuf::from("public"));
        assert_eq!(config.remote_path, "/blog");
        assert!(config.clean);
        assert!(!config.accelerate);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.storage_class, StorageClass::StandardIa);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"{ not json").unwrap();
        assert!(matches!(
            SyncConfig::load(file.path()),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_exclude_patterns_compile() {
        let config = SyncConfig {
            exclude: vec!["**/*.map".to_string(), "[draft]*".to_string()],
            ..valid()
        };
        assert!(config.validate().is_ok());
        assert!(config.exclude_filter().unwrap().is_excluded("js/app.js.map"));
    }
}
