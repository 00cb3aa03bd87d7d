use super::filter::ExcludeFilter;
use super::fingerprint::fingerprint_file;
use super::index::FileIndex;
use super::paths;
use crate::error::{Result, SyncError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 本地文件扫描器
///
/// 深度优先遍历根目录，为每个普通文件计算内容指纹。根本身不是目录时，
/// 它作为单个文件处理，相对路径为空。
///
/// 符号链接不跟随进入：指向文件的链接按目标内容计算指纹（上传时同样读取目标），
/// 指向目录的链接会被跳过并记录警告。
pub struct FileScanner {
    root: PathBuf,
    filter: ExcludeFilter,
}

impl FileScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            filter: ExcludeFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ExcludeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// 扫描并返回本地索引；任何读取错误都会中止扫描
    pub async fn scan(&self) -> Result<FileIndex> {
        info!("开始扫描本地目录: {}", self.root.display());

        let root = self.root.clone();
        let filter = self.filter.clone();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let index = tokio::task::spawn_blocking(move || Self::scan_blocking(&root, &filter))
            .await
            .map_err(|e| SyncError::local_io(&self.root, std::io::Error::other(e)))??;

        info!("扫描完成: {} 个本地文件", index.len());
        Ok(index)
    }

    fn scan_blocking(root: &Path, filter: &ExcludeFilter) -> Result<FileIndex> {
        let mut entries = Vec::new();
        let mut excluded_count = 0usize;

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("文件系统遍历失败"));
                SyncError::local_io(path, source)
            })?;

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                continue;
            }

            if file_type.is_symlink() {
                // 跟随链接检查目标类型，断开的链接按读取错误处理
                let target = std::fs::metadata(path).map_err(|e| SyncError::local_io(path, e))?;
                if target.is_dir() {
                    warn!("跳过指向目录的符号链接: {}", path.display());
                    continue;
                }
            }

            let relative = Self::relative_path(root, path)?;

            if filter.is_excluded(&relative) {
                debug!("排除文件: {}", relative);
                excluded_count += 1;
                continue;
            }

            let hash = fingerprint_file(path).map_err(|e| SyncError::local_io(path, e))?;
            debug!("本地文件: {} ({})", relative, hash);
            entries.push((relative, hash));
        }

        if excluded_count > 0 {
            info!("{} 个本地文件被排除", excluded_count);
        }

        Ok(entries.into_iter().collect())
    }

    /// 去掉根前缀和开头的分隔符，得到相对路径
    fn relative_path(root: &Path, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(root).unwrap_or(path);
        paths::relative_from_path(relative).ok_or_else(|| {
            SyncError::local_io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "路径不是有效的 UTF-8"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn create_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("sub/deep")).unwrap();
        fs::write(temp.path().join("a.txt"), b"alpha").unwrap();
        fs::write(temp.path().join("sub/b.txt"), b"beta").unwrap();
        fs::write(temp.path().join("sub/deep/c.map"), b"gamma").unwrap();
        temp
    }

    #[tokio::test]
    async fn test_scan_nested_tree() {
        let temp = create_tree();
        let index = FileScanner::new(temp.path()).scan().await.unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get("a.txt"), Some(fingerprint_bytes(b"alpha").as_str()));
        assert_eq!(index.get("sub/b.txt"), Some(fingerprint_bytes(b"beta").as_str()));
        assert!(index.contains("sub/deep/c.map"));
        // 目录本身不进入索引
        assert!(!index.contains("sub"));
    }

    #[tokio::test]
    async fn test_scan_empty_directory() {
        let temp = TempDir::new().unwrap();
        let index = FileScanner::new(temp.path()).scan().await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_root_file_is_single_entry() {
        let temp = create_tree();
        let index = FileScanner::new(temp.path().join("a.txt")).scan().await.unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(""), Some(fingerprint_bytes(b"alpha").as_str()));
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let err = FileScanner::new(temp.path().join("nope"))
            .scan()
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::LocalIo { .. }));
    }

    #[tokio::test]
    async fn test_exclude_filter() {
        let temp = create_tree();
        let filter = ExcludeFilter::new(&["*.map".to_string()]).unwrap();
        let index = FileScanner::new(temp.path())
            .with_filter(filter)
            .scan()
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        assert!(!index.contains("sub/deep/c.map"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinks() {
        let temp = create_tree();
        std::os::unix::fs::symlink(temp.path().join("a.txt"), temp.path().join("link.txt"))
            .unwrap();
        std::os::unix::fs::symlink(temp.path().join("sub"), temp.path().join("linkdir")).unwrap();

        let index = FileScanner::new(temp.path()).scan().await.unwrap();

        assert_eq!(index.get("link.txt"), index.get("a.txt"));
        assert!(index.paths().all(|p| !p.starts_with("linkdir")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_backslash_in_file_name_is_kept() {
        let temp = create_tree();
        fs::write(temp.path().join("sub/a\\b.txt"), b"slash").unwrap();

        let index = FileScanner::new(temp.path()).scan().await.unwrap();

        assert_eq!(index.get("sub/a\\b.txt"), Some(fingerprint_bytes(b"slash").as_str()));
        assert!(!index.contains("sub/a/b.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_symlink_is_fatal() {
        let temp = create_tree();
        std::os::unix::fs::symlink(temp.path().join("gone"), temp.path().join("dangling"))
            .unwrap();

        let err = FileScanner::new(temp.path()).scan().await.unwrap_err();
        assert!(matches!(err, SyncError::LocalIo { .. }));
    }
}
