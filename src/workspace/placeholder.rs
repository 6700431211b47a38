//! 空白占位三元组
//!
//! 工作区启动时与重置后都显示同一张确定性的纯色 PNG，直方图位置显示同色小图，
//! 元数据为空。占位图在本地用 `image` 生成，不依赖外部服务。

use std::io::Cursor;

use bytes::Bytes;

use crate::config::AppConfig;
use crate::db::{ImageMetadata, ImageTriple};
use crate::error::AppError;
use crate::operations::parse_hex_color;

/// 按配置生成占位三元组。
pub fn build_placeholder(config: &AppConfig) -> Result<ImageTriple, AppError> {
    let color = parse_hex_color(&config.placeholder_color).ok_or_else(|| {
        AppError::Config(format!("placeholder_color 不合法: {}", config.placeholder_color))
    })?;

    let image = solid_png(config.placeholder_width, config.placeholder_height, color)?;
    let histogram = solid_png(
        config.histogram_placeholder_width,
        config.histogram_placeholder_height,
        color,
    )?;

    Ok(ImageTriple { image, histogram, metadata: ImageMetadata::default() })
}

fn solid_png(width: u32, height: u32, [r, g, b]: [u8; 3]) -> Result<Bytes, AppError> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([r, g, b]));

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| AppError::Config(format!("编码占位图 PNG 失败: {}", e)))?;
    Ok(Bytes::from(buf.into_inner()))
}
