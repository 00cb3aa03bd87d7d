//! 日志模块 - 控制台日志和带大小限制的文件日志

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 是否启用日志记录
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 额外写入的日志文件
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    /// 日志文件最大大小（MB），超过后轮转
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5 // 默认 5MB
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            level: default_level(),
            file: None,
            max_size_mb: default_max_size_mb(),
        }
    }
}

impl LogConfig {
    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// 带大小限制的日志写入器
///
/// 文件超过上限时重命名为 `<file>.old`（覆盖旧备份），然后重新打开。
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    written: u64,
    writer: BufWriter<File>,
}

impl SizeRotatingWriter {
    pub fn new(file_path: &Path, max_size_mb: u32) -> io::Result<Self> {
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let max_size = (max_size_mb.max(1) as u64) * 1024 * 1024;

        // 检查现有文件大小，如果超过限制则先轮转
        if fs::metadata(file_path).map(|m| m.len() > max_size).unwrap_or(false) {
            Self::rotate_log(file_path)?;
        }
        let (writer, written) = Self::open_file(file_path)?;

        Ok(Self {
            file_path: file_path.to_path_buf(),
            max_size,
            written,
            writer,
        })
    }

    fn open_file(file_path: &Path) -> io::Result<(BufWriter<File>, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let len = file.metadata()?.len();
        Ok((BufWriter::new(file), len))
    }

    fn backup_path(file_path: &Path) -> PathBuf {
        let mut name = file_path.as_os_str().to_owned();
        name.push(".old");
        PathBuf::from(name)
    }

    /// 轮转日志文件
    fn rotate_log(file_path: &Path) -> io::Result<()> {
        let backup_path = Self::backup_path(file_path);
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        Self::rotate_log(&self.file_path)?;
        let (writer, written) = Self::open_file(&self.file_path)?;
        self.writer = writer;
        self.written = written;
        Ok(())
    }
}

impl Write for SizeRotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let n = self.writer.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// 初始化日志系统
///
/// 返回的 guard 需要保持到进程结束，否则文件日志可能丢失最后几行。
pub fn init_logging(config: &LogConfig) -> Option<WorkerGuard> {
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return None;
    }

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.tracing_level()).into())
        .from_env_lossy()
        .add_directive("aws_config=warn".parse().unwrap())
        .add_directive("aws_smithy_runtime=warn".parse().unwrap())
        .add_directive("hyper=warn".parse().unwrap());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let mut guard = None;
    let file_layer = config.file.as_ref().and_then(|path| {
        match SizeRotatingWriter::new(path, config.max_size_mb) {
            Ok(writer) => {
                let (non_blocking, g) = tracing_appender::non_blocking(writer);
                guard = Some(g);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(false),
                )
            }
            Err(e) => {
                // 文件日志创建失败，回退到只输出控制台
                eprintln!("无法打开日志文件 {}: {}", path.display(), e);
                None
            }
        }
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    guard
}
