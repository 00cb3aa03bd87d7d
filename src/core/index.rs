//! 路径 -> 指纹 索引

use std::collections::HashMap;

/// 不可变的路径索引快照
///
/// 构建完成后不再修改；本地和远程各一份。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileIndex {
    entries: HashMap<String, String>,
}

impl FileIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for FileIndex {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for FileIndex {
    fn from(entries: [(&str, &str); N]) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
