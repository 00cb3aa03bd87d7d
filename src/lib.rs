//! bucketsync - 把本地目录镜像到对象存储 bucket，只上传新增或变化的文件

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::SyncConfig;
pub use crate::core::{SyncEngine, SyncReport};
pub use error::SyncError;
