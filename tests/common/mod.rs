//! 集成测试共用的进程内假服务
//!
//! 用 `image` 真实编解码 PNG，元数据里的尺寸与图片一致；
//! 可切换为“下一次变换失败”，并记录每次调用。

#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use serde_json::{Value, json};

use image_workbench::config::AppConfig;
use image_workbench::db::{ImageMetadata, ImageStore, ImageTriple};
use image_workbench::operations::{CreateImageRequest, MultiOperationDescriptor, OperationDescriptor, color_rgb};
use image_workbench::service::{ServiceError, TransformationService};
use image_workbench::session::EditorSession;

#[derive(Default)]
pub struct FakeService {
    fail_transforms: AtomicBool,
    calls: Mutex<Vec<String>>,
    multi_inputs: Mutex<Vec<Vec<Bytes>>>,
    wire_payloads: Mutex<Vec<Value>>,
}

impl FakeService {
    pub fn fail_transforms(&self, fail: bool) {
        self.fail_transforms.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == name).count()
    }

    pub fn multi_inputs(&self) -> Vec<Vec<Bytes>> {
        self.multi_inputs.lock().expect("inputs lock").clone()
    }

    pub fn wire_payloads(&self) -> Vec<Value> {
        self.wire_payloads.lock().expect("payload lock").clone()
    }

    fn record(&self, name: &str) {
        self.calls.lock().expect("calls lock").push(name.to_string());
    }

    fn check_failure(&self, endpoint: &str) -> Result<(), ServiceError> {
        if self.fail_transforms.load(Ordering::SeqCst) {
            return Err(ServiceError::Status { endpoint: endpoint.to_string(), status: 500 });
        }
        Ok(())
    }
}

pub fn encode_png(image: &DynamicImage) -> Bytes {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    Bytes::from(buf.into_inner())
}

pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Bytes {
    encode_png(&DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb(rgb))))
}

fn decode(bytes: &Bytes) -> Result<DynamicImage, ServiceError> {
    image::load_from_memory(bytes).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
}

impl TransformationService for FakeService {
    async fn transform(
        &self,
        image: &Bytes,
        descriptor: &OperationDescriptor,
    ) -> Result<Bytes, ServiceError> {
        self.record("transform");
        self.wire_payloads.lock().expect("payload lock").push(descriptor.to_wire_json());
        self.check_failure("/transform")?;

        let decoded = decode(image)?;
        let result = match descriptor.kind.as_str() {
            "grayscale" => DynamicImage::ImageLuma8(decoded.to_luma8()),
            _ => {
                let mut inverted = decoded;
                inverted.invert();
                inverted
            }
        };
        Ok(encode_png(&result))
    }

    async fn transform_multi(
        &self,
        images: &[Bytes],
        descriptor: &MultiOperationDescriptor,
    ) -> Result<Bytes, ServiceError> {
        self.record("transform_multi");
        self.multi_inputs.lock().expect("inputs lock").push(images.to_vec());
        self.wire_payloads.lock().expect("payload lock").push(descriptor.to_wire_json());
        self.check_failure("/transform_multi")?;

        let first = images
            .first()
            .ok_or_else(|| ServiceError::InvalidResponse("no images".to_string()))?;
        Ok(encode_png(&decode(first)?))
    }

    async fn derive_histogram(&self, image: &Bytes) -> Result<Bytes, ServiceError> {
        self.record("histogram");
        decode(image)?;
        Ok(solid_png(256, 100, [0, 0, 0]))
    }

    async fn derive_metadata(&self, image: &Bytes) -> Result<ImageMetadata, ServiceError> {
        self.record("metadata");
        let decoded = decode(image)?;
        ImageMetadata::from_value(json!({
            "format": "PNG",
            "dimensions": { "width": decoded.width(), "height": decoded.height() }
        }))
        .ok_or_else(|| ServiceError::InvalidResponse("metadata".to_string()))
    }

    async fn to_canonical_format(&self, raw: Bytes, _file_name: &str) -> Result<Bytes, ServiceError> {
        self.record("to_png");
        Ok(encode_png(&decode(&raw)?))
    }

    async fn create_image(&self, request: &CreateImageRequest) -> Result<Bytes, ServiceError> {
        self.record("create_image");
        let rgb = color_rgb(&request.color)
            .ok_or_else(|| ServiceError::InvalidResponse("color".to_string()))?;
        Ok(solid_png(request.width, request.height, rgb))
    }
}

pub fn new_session() -> EditorSession<FakeService> {
    let store = ImageStore::open_in_memory().expect("open in-memory store");
    EditorSession::init(AppConfig::default(), store, FakeService::default()).expect("init session")
}

/// 直接写入一条指定尺寸的纯色记录，返回 id。
pub fn seed_record(session: &EditorSession<FakeService>, width: u32, height: u32, rgb: [u8; 3]) -> i64 {
    let triple = ImageTriple {
        image: solid_png(width, height, rgb),
        histogram: solid_png(256, 100, [0, 0, 0]),
        metadata: ImageMetadata::from_value(json!({
            "dimensions": { "width": width, "height": height }
        }))
        .expect("object metadata"),
    };
    session.store().insert(&triple).expect("seed record")
}

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock error")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("image-workbench-{tag}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
