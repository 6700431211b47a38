//! # 外部变换服务边界
//!
//! ## 设计思路
//!
//! 真正的像素运算、直方图计算、元数据提取都由外部服务完成。核心只依赖
//! `TransformationService` trait，生产环境使用 `http::HttpTransformationService`，
//! 测试注入进程内假实现。
//!
//! ## 约束
//!
//! - 每次调用只尝试一次，不重试、不缓存。
//! - 非 2xx、传输失败、超时、响应体无法解析统一视为 `ServiceError`，
//!   在会话层被上转为 `AppError::Transformation`。

use std::time::Instant;

use bytes::Bytes;

use crate::db::{ImageMetadata, ImageTriple};
use crate::operations::{CreateImageRequest, MultiOperationDescriptor, OperationDescriptor};

pub mod http;

pub use http::HttpTransformationService;

/// 外部服务错误
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("请求超时：{endpoint}（{secs}秒）")]
    Timeout { endpoint: String, secs: u64 },

    #[error("服务返回错误状态：{endpoint} HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("响应无法解析：{0}")]
    InvalidResponse(String),
}

/// 外部变换服务
///
/// 所有方法都是单次请求 / 响应，失败即返回错误。
#[allow(async_fn_in_trait)]
pub trait TransformationService {
    /// 单图变换。
    async fn transform(
        &self,
        image: &Bytes,
        descriptor: &OperationDescriptor,
    ) -> Result<Bytes, ServiceError>;

    /// 多图组合变换，`images` 顺序即发送顺序。
    async fn transform_multi(
        &self,
        images: &[Bytes],
        descriptor: &MultiOperationDescriptor,
    ) -> Result<Bytes, ServiceError>;

    async fn derive_histogram(&self, image: &Bytes) -> Result<Bytes, ServiceError>;

    async fn derive_metadata(&self, image: &Bytes) -> Result<ImageMetadata, ServiceError>;

    /// 将任意上传文件转换为规范格式（PNG）。
    async fn to_canonical_format(&self, raw: Bytes, file_name: &str) -> Result<Bytes, ServiceError>;

    /// 生成纯色空白图。
    async fn create_image(&self, request: &CreateImageRequest) -> Result<Bytes, ServiceError>;
}

/// 为新图片补齐直方图与元数据，组成完整三元组。
///
/// 任一步失败都不会产生半成品三元组。
pub async fn complete_triple<S: TransformationService>(
    service: &S,
    image: Bytes,
) -> Result<ImageTriple, ServiceError> {
    let histogram_start = Instant::now();
    let histogram = service.derive_histogram(&image).await?;
    let histogram_ms = histogram_start.elapsed().as_millis();

    let metadata_start = Instant::now();
    let metadata = service.derive_metadata(&image).await?;
    let metadata_ms = metadata_start.elapsed().as_millis();

    log::info!(
        "📊 派生完成 - 直方图: {}ms, 元数据: {}ms, 图片大小: {} bytes",
        histogram_ms,
        metadata_ms,
        image.len()
    );

    Ok(ImageTriple { image, histogram, metadata })
}
