//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `AppConfig`：外部服务地址与超时、上传体积上限、
//! 空白占位图规格、导出文件名、数据库目录。配置以 JSON 文件持久化在数据目录中。
//!
//! ## 实现思路
//!
//! - 每个字段都有 `#[serde(default)]`，旧配置文件缺字段时自动补默认值。
//! - 配置文件不存在或无法解析时回退到默认配置（记录 warn），绝不阻塞启动。
//! - `validate` 拒绝明显不合理的配置（零超时、零尺寸、非法颜色）。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::operations::parse_hex_color;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "images.db";
const APP_DIR_NAME: &str = "image-workbench";

/// 外部服务各端点路径
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub to_png: String,
    pub create_image: String,
    pub histogram: String,
    pub metadata: String,
    pub transform: String,
    pub transform_multi: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            to_png: "/to_png".to_string(),
            create_image: "/create_image".to_string(),
            histogram: "/histogram".to_string(),
            metadata: "/metadata".to_string(),
            transform: "/transform".to_string(),
            transform_multi: "/transform_multi".to_string(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// 外部图片处理服务的根地址。
    pub service_base_url: String,
    pub endpoints: EndpointConfig,
    /// 建立连接超时（秒）。
    pub connect_timeout_secs: u64,
    /// 单次请求总超时（秒），超时即视为变换失败，不重试。
    pub request_timeout_secs: u64,
    /// 上传文件体积上限（字节）。
    pub max_upload_bytes: u64,
    /// 自定义数据库目录；为空时使用数据目录。
    pub db_dir: Option<String>,
    /// 空白占位图尺寸与颜色。
    pub placeholder_width: u32,
    pub placeholder_height: u32,
    pub histogram_placeholder_width: u32,
    pub histogram_placeholder_height: u32,
    pub placeholder_color: String,
    /// 保存工作区时导出的文件名。
    pub download_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_base_url: "http://127.0.0.1:8000".to_string(),
            endpoints: EndpointConfig::default(),
            connect_timeout_secs: 8,
            request_timeout_secs: 30,
            max_upload_bytes: 50 * 1024 * 1024,
            db_dir: None,
            placeholder_width: 500,
            placeholder_height: 500,
            histogram_placeholder_width: 256,
            histogram_placeholder_height: 100,
            placeholder_color: "#cccccc".to_string(),
            download_file_name: "workspace-image.png".to_string(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置，失败时回退到默认值。
    pub fn load_from_path(config_path: &Path) -> Self {
        if !config_path.exists() {
            return Self::default();
        }
        match fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("配置文件解析失败，使用默认配置: {}", err);
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!("读取配置文件失败，使用默认配置: {}", err);
                Self::default()
            }
        }
    }

    /// 从数据目录加载 `config.json`。
    pub fn load(data_dir: &Path) -> Self {
        Self::load_from_path(&data_dir.join(CONFIG_FILE_NAME))
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<(), AppError> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("创建配置目录失败: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("序列化配置失败: {}", e)))?;
        fs::write(config_path, content)
            .map_err(|e| AppError::Config(format!("写入配置文件失败: {}", e)))?;
        Ok(())
    }

    pub fn save(&self, data_dir: &Path) -> Result<(), AppError> {
        self.save_to_path(&data_dir.join(CONFIG_FILE_NAME))
    }

    /// 校验配置取值。
    pub fn validate(&self) -> Result<(), AppError> {
        if self.service_base_url.trim().is_empty() {
            return Err(AppError::Config("service_base_url 不能为空".to_string()));
        }
        if !(1..=120).contains(&self.connect_timeout_secs) {
            return Err(AppError::Config("connect_timeout_secs 必须在 1~120 秒之间".to_string()));
        }
        if !(1..=600).contains(&self.request_timeout_secs) {
            return Err(AppError::Config("request_timeout_secs 必须在 1~600 秒之间".to_string()));
        }
        if self.max_upload_bytes == 0 {
            return Err(AppError::Config("max_upload_bytes 不能为 0".to_string()));
        }
        if self.placeholder_width == 0
            || self.placeholder_height == 0
            || self.histogram_placeholder_width == 0
            || self.histogram_placeholder_height == 0
        {
            return Err(AppError::Config("占位图尺寸必须大于 0".to_string()));
        }
        if parse_hex_color(&self.placeholder_color).is_none() {
            return Err(AppError::Config(format!(
                "placeholder_color 必须是 #rrggbb 格式：{}",
                self.placeholder_color
            )));
        }
        if self.download_file_name.trim().is_empty() {
            return Err(AppError::Config("download_file_name 不能为空".to_string()));
        }
        Ok(())
    }

    /// 解析数据库文件路径：优先使用 `db_dir`，否则落在数据目录下。
    pub fn resolve_db_path(&self, data_dir: &Path) -> PathBuf {
        match self.db_dir.as_deref() {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(DB_FILE_NAME),
            _ => data_dir.join(DB_FILE_NAME),
        }
    }

    /// 拼接服务端点完整 URL。
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.service_base_url.trim_end_matches('/'), path)
    }
}

/// 默认数据目录：平台数据目录下的 `image-workbench`。
pub fn default_data_dir() -> Result<PathBuf, AppError> {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| AppError::Config("无法确定用户数据目录".to_string()))
}
