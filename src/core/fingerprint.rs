//! 内容指纹
//!
//! 本地指纹是文件内容的 MD5（小写十六进制），与 S3 兼容服务对单次上传对象返回的
//! ETag 一致。分片上传或服务端 KMS 加密的对象 ETag 不是内容 MD5，这类对象永远
//! 比较为不同，每次都会被重新上传。

use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;

/// 读取缓冲区大小
const BUFFER_SIZE: usize = 64 * 1024;

/// 流式计算文件指纹
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// 计算内存数据的指纹
pub fn fingerprint_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// 规范化服务端返回的 ETag：去掉引号，转小写
pub fn normalize_etag(etag: &str) -> String {
    etag.trim().trim_matches('"').to_ascii_lowercase()
}
