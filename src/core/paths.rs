//! 相对路径规范化与远程 key 拼接

use std::path::{Component, Path};

/// 把本地相对路径转换为以 / 分隔的形式
///
/// 只按平台的路径组件拆分，文件名中的 `\` 在 Unix 上是普通字符，原样保留。
/// 组件不是有效 UTF-8 时返回 None。
pub fn relative_from_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_str()?);
        }
    }
    Some(parts.join("/"))
}

/// 规范化远程前缀：去掉首尾的 /
pub fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

/// 前缀与相对路径拼接成对象 key
///
/// 相对路径为空表示根本身就是一个文件，此时 key 就是前缀。
pub fn join_key(prefix: &str, relative: &str) -> String {
    match (prefix.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, relative),
    }
}

/// 把对象 key 还原为相对路径；不属于该前缀的 key 返回 None
///
/// `site` 前缀只匹配 `site` 和 `site/...`，不匹配 `site2/...`。
/// 除了前缀和开头的 / 之外，key 保持原样。
pub fn strip_prefix(prefix: &str, key: &str) -> Option<String> {
    if prefix.is_empty() {
        return Some(key.trim_start_matches('/').to_string());
    }
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_start_matches('/').to_string())
    } else {
        None
    }
}
