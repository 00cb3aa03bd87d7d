use super::index::FileIndex;
use std::collections::BTreeSet;

/// 比较结果：需要上传和需要删除的相对路径
///
/// 两个集合不相交，按路径排序以保证执行顺序稳定。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub to_upload: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// 比较本地索引和远程索引
///
/// - 本地路径在远程存在且指纹完全相同时跳过，否则上传
/// - 仅在 cleanup 为 true 时，远程有而本地没有的路径进入删除集合
///
/// 纯函数，不做任何 IO，也不修改输入。
pub fn compare_trees(local: &FileIndex, remote: &FileIndex, cleanup: bool) -> DiffResult {
    let to_upload = local
        .iter()
        .filter(|(path, hash)| remote.get(path) != Some(*hash))
        .map(|(path, _)| path.to_string())
        .collect();

    let to_delete = if cleanup {
        remote
            .paths()
            .filter(|path| !local.contains(path))
            .map(str::to_string)
            .collect()
    } else {
        BTreeSet::new()
    };

    DiffResult {
        to_upload,
        to_delete,
    }
}
