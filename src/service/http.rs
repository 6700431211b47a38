//! # HTTP 服务客户端
//!
//! ## 实现思路
//!
//! - 单个 `reqwest::Client`，连接超时与请求总超时取自 `AppConfig`。
//! - 图片以 multipart 上传（单图字段 `file`，多图字段 `files` 按顺序重复），
//!   操作描述以 JSON 字符串放在 `operation_data` 字段。
//! - 图片响应用 `infer` 校验文件签名，元数据响应必须是 JSON 对象。

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::{ServiceError, TransformationService};
use crate::config::AppConfig;
use crate::db::ImageMetadata;
use crate::operations::{CreateImageRequest, MultiOperationDescriptor, OperationDescriptor};

const UPLOAD_FILE_NAME: &str = "image.png";

/// 基于 HTTP 的外部服务实现
#[derive(Debug, Clone)]
pub struct HttpTransformationService {
    client: reqwest::Client,
    config: AppConfig,
}

impl HttpTransformationService {
    pub fn new(config: &AppConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;
        Ok(Self { client, config: config.clone() })
    }

    fn image_part(image: &Bytes, file_name: &str) -> Result<Part, ServiceError> {
        Part::bytes(image.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| ServiceError::Network(format!("构造上传字段失败：{}", e)))
    }

    /// 发送请求并返回成功响应体；非 2xx 直接报错。
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Bytes, ServiceError> {
        let start = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, endpoint))?;

        let status = response.status();
        if !status.is_success() {
            log::error!("❌ 服务返回错误 - {} HTTP {}", endpoint, status.as_u16());
            return Err(ServiceError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_reqwest_error(e, endpoint))?;
        log::debug!(
            "🌐 {} 完成 - {} bytes, 耗时 {}ms",
            endpoint,
            body.len(),
            start.elapsed().as_millis()
        );
        Ok(body)
    }

    async fn post_image(&self, endpoint: &str, form: Form) -> Result<Bytes, ServiceError> {
        let url = self.config.endpoint_url(endpoint);
        let body = self.send(endpoint, self.client.post(url).multipart(form)).await?;
        validate_image_body(endpoint, body)
    }

    fn map_reqwest_error(&self, e: reqwest::Error, endpoint: &str) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout {
                endpoint: endpoint.to_string(),
                secs: self.config.request_timeout_secs,
            }
        } else if e.is_connect() {
            ServiceError::Network(format!("无法连接服务：{}", e))
        } else {
            ServiceError::Network(format!("请求失败：{}", e))
        }
    }
}

/// 响应体必须是可识别的图片。
fn validate_image_body(endpoint: &str, body: Bytes) -> Result<Bytes, ServiceError> {
    if body.is_empty() {
        return Err(ServiceError::InvalidResponse(format!("{} 返回空内容", endpoint)));
    }
    match infer::get(&body) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(body),
        _ => Err(ServiceError::InvalidResponse(format!("{} 返回的不是图片", endpoint))),
    }
}

impl TransformationService for HttpTransformationService {
    async fn transform(
        &self,
        image: &Bytes,
        descriptor: &OperationDescriptor,
    ) -> Result<Bytes, ServiceError> {
        let form = Form::new()
            .part("file", Self::image_part(image, UPLOAD_FILE_NAME)?)
            .text("operation_data", descriptor.to_wire_json().to_string());
        self.post_image(&self.config.endpoints.transform, form).await
    }

    async fn transform_multi(
        &self,
        images: &[Bytes],
        descriptor: &MultiOperationDescriptor,
    ) -> Result<Bytes, ServiceError> {
        let mut form = Form::new();
        for (index, image) in images.iter().enumerate() {
            form = form.part("files", Self::image_part(image, &format!("image-{}.png", index + 1))?);
        }
        let form = form.text("operation_data", descriptor.to_wire_json().to_string());
        self.post_image(&self.config.endpoints.transform_multi, form).await
    }

    async fn derive_histogram(&self, image: &Bytes) -> Result<Bytes, ServiceError> {
        let form = Form::new().part("file", Self::image_part(image, UPLOAD_FILE_NAME)?);
        self.post_image(&self.config.endpoints.histogram, form).await
    }

    async fn derive_metadata(&self, image: &Bytes) -> Result<ImageMetadata, ServiceError> {
        let endpoint = &self.config.endpoints.metadata;
        let form = Form::new().part("file", Self::image_part(image, UPLOAD_FILE_NAME)?);
        let url = self.config.endpoint_url(endpoint);
        let body = self.send(endpoint, self.client.post(url).multipart(form)).await?;

        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ServiceError::InvalidResponse(format!("元数据不是合法 JSON：{}", e)))?;
        ImageMetadata::from_value(value)
            .ok_or_else(|| ServiceError::InvalidResponse("元数据必须是 JSON 对象".to_string()))
    }

    async fn to_canonical_format(&self, raw: Bytes, file_name: &str) -> Result<Bytes, ServiceError> {
        let form = Form::new().part("file", Self::image_part(&raw, file_name)?);
        self.post_image(&self.config.endpoints.to_png, form).await
    }

    async fn create_image(&self, request: &CreateImageRequest) -> Result<Bytes, ServiceError> {
        let endpoint = &self.config.endpoints.create_image;
        let payload = json!({
            "operation_type": "create_image",
            "width": request.width,
            "height": request.height,
            "color": request.color,
        });
        let url = self.config.endpoint_url(endpoint);
        let body = self.send(endpoint, self.client.post(url).json(&payload)).await?;
        validate_image_body(endpoint, body)
    }
}
