//! # 本地文件读取（上传入口）
//!
//! 上传前先在本地做三项检查：文件存在、体积不超过配置上限、文件签名是图片。
//! 通过检查的原始字节再交给外部服务转换为规范格式。

use std::fs;
use std::path::Path;

use bytes::Bytes;

use crate::config::AppConfig;
use crate::error::AppError;

/// 已读入内存、待上传的文件
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Bytes,
    /// `infer` 嗅探出的 MIME
    pub mime_type: &'static str,
}

/// 读取本地图片文件。
pub fn load_from_file(path: &Path, config: &AppConfig) -> Result<UploadFile, AppError> {
    log::info!("📁 开始读取本地图片 - 路径: {}", path.display());

    if !path.exists() {
        return Err(AppError::invalid(format!("File not found: {}", path.display())));
    }

    let metadata = fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(AppError::invalid(format!("Not a file: {}", path.display())));
    }
    if metadata.len() > config.max_upload_bytes {
        return Err(AppError::invalid(format!(
            "File is too large: {:.2} MB (limit: {:.2} MB).",
            metadata.len() as f64 / 1024.0 / 1024.0,
            config.max_upload_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    let bytes = fs::read(path)?;
    let mime_type = validate_image_signature(&bytes)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    log::debug!("✅ 读取完成 - {} bytes, 类型: {}", bytes.len(), mime_type);
    Ok(UploadFile { file_name, bytes: Bytes::from(bytes), mime_type })
}

/// 通过文件签名（magic bytes）校验内容是否为图片。
fn validate_image_signature(bytes: &[u8]) -> Result<&'static str, AppError> {
    if bytes.is_empty() {
        return Err(AppError::invalid("File is empty."));
    }
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(kind.mime_type()),
        Some(kind) => Err(AppError::invalid(format!(
            "File is not an image: {}",
            kind.mime_type()
        ))),
        None => Err(AppError::invalid("Unrecognized file type.")),
    }
}
