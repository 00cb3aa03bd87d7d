use super::comparator::compare_trees;
use super::listing::RemoteLister;
use super::paths;
use super::scanner::FileScanner;
use super::transfer::{TransferExecutor, TransferProgress};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::storage::Storage;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub start_time: i64,
    pub end_time: i64,
    /// 本地扫描到的文件数
    pub local_files: usize,
    /// 远程列出的文件数
    pub remote_files: usize,
    /// 需要上传的文件数
    pub to_upload: usize,
    /// 实际上传的文件数
    pub uploaded: usize,
    /// 需要删除的文件数，未开启清理时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_delete: Option<usize>,
    /// 实际删除的文件数，未开启清理时为 None
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
    pub dry_run: bool,
}

/// 同步引擎
///
/// 按顺序执行：扫描本地 -> 列出远程 -> 比较 -> 上传 -> 删除。
/// 任何阶段失败都会立即返回该错误，已完成的远程修改不会回滚。
pub struct SyncEngine {
    storage: Arc<dyn Storage>,
    config: SyncConfig,
    progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl SyncEngine {
    pub fn new(storage: Arc<dyn Storage>, config: SyncConfig) -> Self {
        Self {
            storage,
            config,
            progress_tx: None,
        }
    }

    /// 订阅每个传输操作完成后的进度
    pub fn with_progress(mut self, tx: mpsc::Sender<TransferProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// 运行同步任务
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("sync", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> Result<SyncReport> {
        let start_time = chrono::Utc::now().timestamp();
        let config = &self.config;
        config.validate()?;
        let filter = config.exclude_filter()?;

        // 根是单个文件时 key 就是前缀本身，前缀不能为空
        if paths::normalize_prefix(&config.remote_path).is_empty() {
            if let Ok(meta) = tokio::fs::metadata(&config.local_path).await {
                if !meta.is_dir() {
                    return Err(SyncError::Config(format!(
                        "{} 是单个文件，必须指定 remote_path 作为对象 key",
                        config.local_path.display()
                    )));
                }
            }
        }

        info!(
            ">> upload files from {} to {}{}",
            config.local_path.display(),
            config.remote_path,
            if config.clean { " and clean" } else { "" }
        );

        let local = FileScanner::new(&config.local_path)
            .with_filter(filter.clone())
            .scan()
            .await?;
        info!(">> {} local files collected", local.len());

        let remote = RemoteLister::new(self.storage.as_ref(), &config.remote_path)
            .with_filter(filter)
            .list()
            .await?;
        info!(">> {} remote files collected", remote.len());

        let diff = compare_trees(&local, &remote, config.clean);
        // 索引只用于比较，比较完即可释放
        let (local_files, remote_files) = (local.len(), remote.len());
        drop(local);
        drop(remote);

        info!("{} files to be uploaded", diff.to_upload.len());
        if config.clean && !diff.to_delete.is_empty() {
            info!("{} files to be cleaned", diff.to_delete.len());
        }

        let mut report = SyncReport {
            run_id,
            start_time,
            end_time: start_time,
            local_files,
            remote_files,
            to_upload: diff.to_upload.len(),
            uploaded: 0,
            to_delete: config.clean.then_some(diff.to_delete.len()),
            deleted: config.clean.then_some(0),
            dry_run: config.dry_run,
        };

        if config.dry_run {
            for path in &diff.to_upload {
                info!("[dry-run] upload {}", path);
            }
            for path in &diff.to_delete {
                info!("[dry-run] clean {}", path);
            }
            report.end_time = chrono::Utc::now().timestamp();
            return Ok(report);
        }

        let mut executor =
            TransferExecutor::new(self.storage.clone(), &config.local_path, &config.remote_path)
                .with_storage_class(config.storage_class)
                .with_concurrency(config.concurrency);
        if let Some(tx) = &self.progress_tx {
            executor = executor.with_progress(tx.clone());
        }

        // 上传失败时直接返回，不进入删除阶段
        report.uploaded = executor.upload_all(&diff.to_upload).await?;

        if config.clean {
            report.deleted = Some(executor.delete_all(&diff.to_delete).await?);
        }

        report.end_time = chrono::Utc::now().timestamp();
        match report.deleted {
            Some(n) if n > 0 => info!("uploaded {} files, cleaned {} files", report.uploaded, n),
            _ => info!("uploaded {} files", report.uploaded),
        }

        Ok(report)
    }
}
