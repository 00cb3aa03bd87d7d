use super::filter::ExcludeFilter;
use super::fingerprint::normalize_etag;
use super::index::FileIndex;
use super::paths;
use crate::error::{Result, SyncError};
use crate::storage::Storage;
use tracing::{debug, info};

/// 远程列表客户端
///
/// 按页拉取前缀下的所有对象，直到服务端返回未截断为止。
pub struct RemoteLister<'a> {
    storage: &'a dyn Storage,
    prefix: String,
    filter: ExcludeFilter,
}

impl<'a> RemoteLister<'a> {
    pub fn new(storage: &'a dyn Storage, prefix: &str) -> Self {
        Self {
            storage,
            prefix: paths::normalize_prefix(prefix),
            filter: ExcludeFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: ExcludeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// 列出远程索引；任何一页失败都直接返回错误，不返回部分结果
    pub async fn list(&self) -> Result<FileIndex> {
        info!("开始列出远程文件: {}, prefix: {:?}", self.storage.name(), self.prefix);

        let mut entries = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .storage
                .list_page(&self.prefix, marker.as_deref())
                .await
                .map_err(SyncError::Listing)?;
            pages += 1;

            for object in page.objects {
                // 跳过目录占位对象
                if object.key.ends_with('/') {
                    continue;
                }
                let Some(relative) = paths::strip_prefix(&self.prefix, &object.key) else {
                    continue;
                };
                if self.filter.is_excluded(&relative) {
                    debug!("排除远程文件: {}", relative);
                    continue;
                }
                entries.push((relative, normalize_etag(&object.etag)));
            }

            if !page.is_truncated {
                break;
            }
            marker = match page.next_marker {
                Some(m) => Some(m),
                None => {
                    return Err(SyncError::Listing(anyhow::anyhow!(
                        "列表被截断但没有返回续页标记"
                    )))
                }
            };
        }

        let index: FileIndex = entries.into_iter().collect();
        info!("列表完成: {} 个远程文件, {} 页", index.len(), pages);
        Ok(index)
    }
}
