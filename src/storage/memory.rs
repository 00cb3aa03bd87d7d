//! 内存对象存储，主要用于测试

use super::{ListPage, RemoteObject, Storage, StorageClass};
use crate::core::fingerprint;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

/// 存储的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub etag: String,
    pub data: Vec<u8>,
    pub storage_class: StorageClass,
}

/// 记录下来的写操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Put(String),
    Delete(String),
}

pub struct MemoryStorage {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    ops: RwLock<Vec<StorageOp>>,
    page_size: usize,
    list_calls: RwLock<usize>,
    fail_keys: RwLock<HashSet<String>>,
    fail_listing: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_page_size(1000)
    }

    /// 指定每页条目数，便于测试分页
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            ops: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
            list_calls: RwLock::new(0),
            fail_keys: RwLock::new(HashSet::new()),
            fail_listing: false,
        }
    }

    /// 所有列表请求都返回错误
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// 预置一个对象（只有 etag，无内容）
    pub fn insert(&self, key: &str, etag: &str) {
        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                etag: etag.to_string(),
                data: Vec::new(),
                storage_class: StorageClass::Standard,
            },
        );
    }

    /// 针对某个 key 的 put/delete 返回错误
    pub fn fail_on(&self, key: &str) {
        self.fail_keys.write().unwrap().insert(key.to_string());
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().unwrap().keys().cloned().collect()
    }

    /// 按发生顺序返回成功的写操作
    pub fn ops(&self) -> Vec<StorageOp> {
        self.ops.read().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.read().unwrap()
    }

    fn check_fail(&self, key: &str) -> Result<()> {
        if self.fail_keys.read().unwrap().contains(key) {
            return Err(anyhow!("injected failure for {}", key));
        }
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<ListPage> {
        *self.list_calls.write().unwrap() += 1;
        if self.fail_listing {
            return Err(anyhow!("AccessDenied"));
        }

        let objects = self.objects.read().unwrap();
        // marker 是上一页最后一个 key
        let mut matching = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| marker.map_or(true, |m| key.as_str() > m));

        let page: Vec<RemoteObject> = matching
            .by_ref()
            .take(self.page_size)
            .map(|(key, obj)| RemoteObject {
                key: key.clone(),
                etag: format!("\"{}\"", obj.etag),
            })
            .collect();
        let is_truncated = matching.next().is_some();

        Ok(ListPage {
            next_marker: if is_truncated {
                page.last().map(|o| o.key.clone())
            } else {
                None
            },
            objects: page,
            is_truncated,
        })
    }

    async fn put_object(&self, key: &str, source: &Path, storage_class: StorageClass) -> Result<()> {
        self.check_fail(key)?;
        let data = tokio::fs::read(source).await?;
        let etag = fingerprint::fingerprint_bytes(&data);

        self.objects.write().unwrap().insert(
            key.to_string(),
            StoredObject {
                etag,
                data,
                storage_class,
            },
        );
        self.ops.write().unwrap().push(StorageOp::Put(key.to_string()));
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.check_fail(key)?;
        self.objects.write().unwrap().remove(key);
        self.ops
            .write()
            .unwrap()
            .push(StorageOp::Delete(key.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pagination_marker() {
        let storage = MemoryStorage::with_page_size(2);
        for key in ["p/a", "p/b", "p/c", "q/d"] {
            storage.insert(key, "x");
        }

        let first = storage.list_page("p/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert!(first.is_truncated);
        assert_eq!(first.next_marker.as_deref(), Some("p/b"));

        let second = storage
            .list_page("p/", first.next_marker.as_deref())
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "p/c");
        assert!(!second.is_truncated);
        assert!(second.next_marker.is_none());
    }
}
