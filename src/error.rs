//! 同步错误类型

use std::path::PathBuf;
use thiserror::Error;

/// 同步过程中的致命错误
///
/// 任何阶段出现的第一个错误都会终止整个运行，不会被吞掉或降级。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置缺失或非法，在任何 IO 之前报告
    #[error("配置错误: {0}")]
    Config(String),

    /// 本地扫描或计算指纹时的读取失败
    #[error("读取本地文件失败 {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 列出远程对象失败
    #[error("列出远程文件失败: {0:#}")]
    Listing(#[source] anyhow::Error),

    /// 上传单个对象失败
    #[error("上传 {key} 失败: {source:#}")]
    Upload {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// 删除单个对象失败
    #[error("删除 {key} 失败: {source:#}")]
    Delete {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    pub(crate) fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::LocalIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
