//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，所有用户动作（上传、创建、加载、变换、保存……）
//! 统一返回 `Result<T, AppError>`，调用方可按分支匹配，也可直接展示给用户。
//!
//! 错误分类与处理策略：
//!
//! | 分类 | 含义 | 状态影响 |
//! |------|------|----------|
//! | `Validation` | 用户输入不合法，逐条列出 | 无 |
//! | `Storage` | 持久层不可用或拒绝写入 | 存储保持原状 |
//! | `Transformation` | 外部服务错误 / 传输失败 | 工作区、存储保持原状 |
//! | `NotFound` | 引用了不存在的记录 id | 视为 no-op，仅提示 |
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `ServiceError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，方便前端直接展示。

use serde::Serialize;

use crate::service::ServiceError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 输入校验失败，携带按顺序累积的全部违规项
    #[error("Invalid operation: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// 持久层错误（数据库打开、写入、读取失败）
    #[error("存储错误: {0}")]
    Storage(String),

    /// 外部变换服务错误（含传输失败、非 2xx 响应）
    #[error("{0}")]
    Transformation(#[from] ServiceError),

    /// 引用的记录不存在
    #[error("记录不存在: id={0}")]
    NotFound(i64),

    /// 已有变换请求在途，拒绝再次发起
    #[error("已有变换请求正在处理，请等待其完成")]
    WorkspaceBusy,

    /// 工作区仍是空白占位图，没有可变换的图片
    #[error("工作区中没有可操作的图片")]
    WorkspaceEmpty,

    /// 请求在途期间工作区已被重置或重新加载，结果被丢弃
    #[error("变换结果已过期：请求期间工作区已变更")]
    StaleTransformation,

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件不合法
    #[error("配置错误: {0}")]
    Config(String),
}

impl AppError {
    /// 便捷构造：单条校验错误
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// 稳定的机器可读错误码，供前端或日志分类使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
            Self::Transformation(_) => "transformation",
            Self::NotFound(_) => "not_found",
            Self::WorkspaceBusy => "busy",
            Self::WorkspaceEmpty => "workspace_empty",
            Self::StaleTransformation => "stale",
            Self::Io(_) => "io",
            Self::Config(_) => "config",
        }
    }

    /// 校验错误的逐条消息；其他错误返回空切片。
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Validation(items) => items,
            _ => &[],
        }
    }
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
