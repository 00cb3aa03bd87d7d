//! 命令行接口
//!
//! 每个参数都可以通过 `INPUT_<NAME>` 环境变量提供，便于在 CI 的 action 中直接运行。

use crate::config::SyncConfig;
use crate::core::{SyncEngine, SyncReport};
use crate::error::Result;
use crate::storage::{create_storage, StorageClass};
use crate::SyncError;
use clap::Parser;
use std::path::PathBuf;

/// 把本地目录同步到对象存储 bucket，只上传新增或变化的文件
#[derive(Parser, Debug, Default)]
#[command(name = "bucketsync", version, about, long_about = None)]
pub struct Cli {
    /// JSON 配置文件，命令行参数和环境变量会覆盖其中的值
    #[arg(long = "config", env = "INPUT_CONFIG")]
    pub config_file: Option<PathBuf>,

    /// 访问密钥 ID
    #[arg(long, env = "INPUT_SECRET_ID")]
    pub secret_id: Option<String>,

    /// 访问密钥
    #[arg(long, env = "INPUT_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "INPUT_BUCKET")]
    pub bucket: Option<String>,

    #[arg(long, env = "INPUT_REGION")]
    pub region: Option<String>,

    /// 兼容旧 action 的输入名 cos_bucket
    #[arg(long, env = "INPUT_COS_BUCKET", hide = true)]
    pub cos_bucket: Option<String>,

    /// 兼容旧 action 的输入名 cos_region
    #[arg(long, env = "INPUT_COS_REGION", hide = true)]
    pub cos_region: Option<String>,

    /// 自定义 endpoint（S3 兼容服务）
    #[arg(long, env = "INPUT_ENDPOINT")]
    pub endpoint: Option<String>,

    /// 要同步的本地目录（或单个文件）
    #[arg(long, env = "INPUT_LOCAL_PATH")]
    pub local_path: Option<PathBuf>,

    /// 远程前缀
    #[arg(long, env = "INPUT_REMOTE_PATH")]
    pub remote_path: Option<String>,

    /// 删除远程有而本地没有的文件
    #[arg(long, env = "INPUT_CLEAN", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub clean: Option<bool>,

    /// 启用传输加速
    #[arg(long, env = "INPUT_ACCELERATE", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub accelerate: Option<bool>,

    /// 最大并发传输数
    #[arg(long, env = "INPUT_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// 排除规则，可重复或用逗号分隔
    #[arg(long, env = "INPUT_EXCLUDE", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// 只显示将要执行的操作
    #[arg(long, env = "INPUT_DRY_RUN", num_args = 0..=1, default_missing_value = "true", value_parser = parse_flag)]
    pub dry_run: Option<bool>,

    /// 上传对象的存储类型
    #[arg(long, env = "INPUT_STORAGE_CLASS")]
    pub storage_class: Option<StorageClass>,

    #[arg(long, env = "INPUT_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long, env = "INPUT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// 以 JSON 输出同步报告
    #[arg(long)]
    pub json: bool,
}

/// 只有 "true" 表示开启，其余值（包括空值）都视为关闭
fn parse_flag(s: &str) -> std::result::Result<bool, String> {
    Ok(s.trim().eq_ignore_ascii_case("true"))
}

impl Cli {
    /// 合并配置文件、环境变量和命令行参数
    pub fn into_config(self) -> Result<SyncConfig> {
        let mut config = match &self.config_file {
            Some(path) => SyncConfig::load(path)?,
            None => SyncConfig::default(),
        };

        if let Some(v) = self.secret_id {
            config.secret_id = Some(v);
        }
        if let Some(v) = self.secret_key {
            config.secret_key = Some(v);
        }
        if let Some(v) = self.bucket.or(self.cos_bucket) {
            config.bucket = v;
        }
        if let Some(v) = self.region.or(self.cos_region) {
            config.region = v;
        }
        if let Some(v) = self.endpoint {
            config.endpoint = Some(v);
        }
        if let Some(v) = self.local_path {
            config.local_path = v;
        }
        if let Some(v) = self.remote_path {
            config.remote_path = v;
        }
        if let Some(v) = self.clean {
            config.clean = v;
        }
        if let Some(v) = self.accelerate {
            config.accelerate = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        if let Some(v) = self.dry_run {
            config.dry_run = v;
        }
        if let Some(v) = self.storage_class {
            config.storage_class = v;
        }
        if let Some(v) = self.log_level {
            config.log.level = v;
        }
        if let Some(v) = self.log_file {
            config.log.file = Some(v);
        }

        config.validate()?;
        Ok(config)
    }
}

/// 创建存储并执行一次同步
pub async fn run(config: SyncConfig) -> Result<SyncReport> {
    let storage = create_storage(&config)
        .await
        .map_err(|e| SyncError::Config(format!("创建存储失败: {:#}", e)))?;
    SyncEngine::new(storage, config).run().await
}
