//! 传输执行器 - 把比较结果应用到远程存储

use super::paths;
use crate::error::{Result, SyncError};
use crate::storage::{Storage, StorageClass};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info};

/// 传输阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferPhase {
    Upload,
    Delete,
}

impl TransferPhase {
    fn verb(self) -> &'static str {
        match self {
            TransferPhase::Upload => "uploaded",
            TransferPhase::Delete => "cleaned",
        }
    }
}

/// 单个操作完成后的进度（仅供观察，不影响正确性）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferProgress {
    pub phase: TransferPhase,
    pub completed: usize,
    pub total: usize,
    /// 向下取整的百分比
    pub percent: u32,
    pub path: String,
}

impl TransferProgress {
    fn new(phase: TransferPhase, completed: usize, total: usize, path: String) -> Self {
        let percent = if total == 0 {
            100
        } else {
            (completed * 100 / total) as u32
        };
        Self {
            phase,
            completed,
            total,
            percent,
            path,
        }
    }
}

/// 传输执行器
///
/// 同一阶段内最多 max_concurrent 个操作同时进行；任何一个失败后不再派发新操作，
/// 已经派发的操作允许完成，最终只报告第一个错误。已完成的操作不会回滚。
pub struct TransferExecutor {
    storage: Arc<dyn Storage>,
    local_root: PathBuf,
    prefix: String,
    storage_class: StorageClass,
    max_concurrent: usize,
    progress_tx: Option<mpsc::Sender<TransferProgress>>,
}

impl TransferExecutor {
    pub fn new(storage: Arc<dyn Storage>, local_root: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            storage,
            local_root: local_root.into(),
            prefix: paths::normalize_prefix(prefix),
            storage_class: StorageClass::Standard,
            max_concurrent: 1,
            progress_tx: None,
        }
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<TransferProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// 本地文件路径；相对路径为空时就是根本身
    fn local_path(&self, relative: &str) -> PathBuf {
        if relative.is_empty() {
            self.local_root.clone()
        } else {
            self.local_root.join(relative)
        }
    }

    /// 上传集合中的所有文件，返回成功数
    pub async fn upload_all(&self, paths: &BTreeSet<String>) -> Result<usize> {
        self.run_phase(TransferPhase::Upload, paths).await
    }

    /// 删除集合中的所有远程对象，返回成功数
    pub async fn delete_all(&self, paths: &BTreeSet<String>) -> Result<usize> {
        self.run_phase(TransferPhase::Delete, paths).await
    }

    async fn run_phase(&self, phase: TransferPhase, paths: &BTreeSet<String>) -> Result<usize> {
        let total = paths.len();
        if total == 0 {
            return Ok(0);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<SyncError>>> = Arc::new(Mutex::new(None));
        let mut handles = Vec::with_capacity(total);

        for relative in paths {
            if failed.load(Ordering::SeqCst) {
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            // 等待许可期间可能已有操作失败
            if failed.load(Ordering::SeqCst) {
                break;
            }

            let storage = self.storage.clone();
            let key = paths::join_key(&self.prefix, relative);
            let source = self.local_path(relative);
            let display_path = match phase {
                TransferPhase::Upload => source.display().to_string(),
                TransferPhase::Delete => key.clone(),
            };
            let storage_class = self.storage_class;
            let completed = completed.clone();
            let failed = failed.clone();
            let first_error = first_error.clone();
            let progress_tx = self.progress_tx.clone();

            handles.push(tokio::spawn(async move {
                let result =
                    Self::execute(storage.as_ref(), phase, &key, &source, storage_class).await;

                match result {
                    Ok(()) => {
                        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                        let progress = TransferProgress::new(phase, done, total, display_path);
                        info!(
                            ">> [{}/{}, {}%] {} {}",
                            progress.completed,
                            progress.total,
                            progress.percent,
                            phase.verb(),
                            progress.path
                        );
                        if let Some(tx) = progress_tx {
                            let _ = tx.send(progress).await;
                        }
                    }
                    Err(e) => {
                        error!("{}", e);
                        failed.store(true, Ordering::SeqCst);
                        let mut slot = first_error.lock().unwrap();
                        if slot.is_none() {
                            *slot = Some(e);
                        }
                    }
                }

                drop(permit);
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                // 任务 panic 也按该阶段的失败处理
                let mut slot = first_error.lock().unwrap();
                if slot.is_none() {
                    *slot = Some(Self::phase_error(phase, "<task>", anyhow::anyhow!(e)));
                }
            }
        }

        if let Some(e) = first_error.lock().unwrap().take() {
            return Err(e);
        }

        Ok(completed.load(Ordering::SeqCst))
    }

    async fn execute(
        storage: &dyn Storage,
        phase: TransferPhase,
        key: &str,
        source: &Path,
        storage_class: StorageClass,
    ) -> Result<()> {
        let result = match phase {
            TransferPhase::Upload => {
                debug!("上传: {} -> {} ({})", source.display(), key, storage_class);
                storage.put_object(key, source, storage_class).await
            }
            TransferPhase::Delete => {
                debug!("删除: {}", key);
                storage.delete_object(key).await
            }
        };
        result.map_err(|e| Self::phase_error(phase, key, e))
    }

    fn phase_error(phase: TransferPhase, key: &str, source: anyhow::Error) -> SyncError {
        match phase {
            TransferPhase::Upload => SyncError::Upload {
                key: key.to_string(),
                source,
            },
            TransferPhase::Delete => SyncError::Delete {
                key: key.to_string(),
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::StorageOp;
    use crate::storage::MemoryStorage;
    use std::fs;
    use tempfile::TempDir;

    fn create_files(names: &[&str]) -> (TempDir, BTreeSet<String>) {
        let temp = TempDir::new().unwrap();
        for name in names {
            let path = temp.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&path, name.as_bytes()).unwrap();
        }
        let set = names.iter().map(|s| s.to_string()).collect();
        (temp, set)
    }

    #[tokio::test]
    async fn test_upload_in_sorted_order_with_prefix() {
        let (temp, paths) = create_files(&["b.txt", "a.txt", "sub/c.txt"]);
        let storage = Arc::new(MemoryStorage::new());
        let executor = TransferExecutor::new(storage.clone(), temp.path(), "/site/");

        let uploaded = executor.upload_all(&paths).await.unwrap();

        assert_eq!(uploaded, 3);
        assert_eq!(
            storage.ops(),
            vec![
                StorageOp::Put("site/a.txt".to_string()),
                StorageOp::Put("site/b.txt".to_string()),
                StorageOp::Put("site/sub/c.txt".to_string()),
            ]
        );
        let stored = storage.get("site/sub/c.txt").unwrap();
        assert_eq!(stored.data, b"sub/c.txt");
        assert_eq!(stored.storage_class, StorageClass::Standard);
    }

    #[tokio::test]
    async fn test_first_failure_stops_phase() {
        let (temp, paths) = create_files(&["1", "2", "3", "4", "5"]);
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_on("3");
        let executor = TransferExecutor::new(storage.clone(), temp.path(), "");

        let err = executor.upload_all(&paths).await.unwrap_err();

        assert!(matches!(err, SyncError::Upload { ref key, .. } if key == "3"));
        assert_eq!(
            storage.ops(),
            vec![
                StorageOp::Put("1".to_string()),
                StorageOp::Put("2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_failure_reports_once() {
        let names: Vec<String> = (0..20).map(|i| format!("f{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (temp, paths) = create_files(&refs);
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_on("f05");
        let executor = TransferExecutor::new(storage.clone(), temp.path(), "").with_concurrency(4);

        let err = executor.upload_all(&paths).await.unwrap_err();

        assert!(matches!(err, SyncError::Upload { ref key, .. } if key == "f05"));
        // 失败之后最多只有已派发的操作完成
        assert!(storage.ops().len() < 20);
    }

    #[tokio::test]
    async fn test_concurrent_upload_waits_for_every_task() {
        let names: Vec<String> = (0..12).map(|i| format!("f{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (temp, paths) = create_files(&refs);
        let storage = Arc::new(MemoryStorage::new());
        let executor = TransferExecutor::new(storage.clone(), temp.path(), "").with_concurrency(4);

        let uploaded = executor.upload_all(&paths).await.unwrap();

        assert_eq!(uploaded, 12);
        assert_eq!(storage.keys().len(), 12);
    }

    #[tokio::test]
    async fn test_progress_events() {
        let (temp, paths) = create_files(&["a", "b", "c"]);
        let storage = Arc::new(MemoryStorage::new());
        let (tx, mut rx) = mpsc::channel(16);
        let executor = TransferExecutor::new(storage, temp.path(), "").with_progress(tx);

        executor.upload_all(&paths).await.unwrap();
        drop(executor);

        let mut events = Vec::new();
        while let Some(p) = rx.recv().await {
            events.push((p.completed, p.total, p.percent));
        }
        assert_eq!(events, vec![(1, 3, 33), (2, 3, 66), (3, 3, 100)]);
    }

    #[tokio::test]
    async fn test_delete_uses_remote_keys() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert("site/old.txt", "h");
        let executor = TransferExecutor::new(storage.clone(), "/unused", "site");

        let paths: BTreeSet<String> = ["old.txt".to_string()].into_iter().collect();
        let deleted = executor.delete_all(&paths).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_upload_error() {
        let temp = TempDir::new().unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let executor = TransferExecutor::new(storage, temp.path(), "");

        let paths: BTreeSet<String> = ["vanished.txt".to_string()].into_iter().collect();
        let err = executor.upload_all(&paths).await.unwrap_err();
        assert!(matches!(err, SyncError::Upload { .. }));
    }
}
