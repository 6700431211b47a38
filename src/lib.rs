//! # 图片工作台 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            交互层 (main.rs 命令循环 / 任意前端)           │
//! │                    commands ── 文本命令                   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕                核心 (Rust)                        │
//! │                                                          │
//! │  session ──── EditorSession (显式应用状态)                │
//! │  │                                                       │
//! │  ├─ operations ── 声明式约束表 → 规范化操作描述            │
//! │  ├─ workspace ─── 暂存状态机 + 单飞守卫 + 占位图           │
//! │  ├─ selection ─── 多图选择与数量规则                       │
//! │  ├─ handles ───── 显示句柄申请 / 释放                      │
//! │  ├─ db ────────── SQLite (rusqlite) 图片仓库               │
//! │  └─ loader ────── 本地文件读取与签名校验                   │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ service::TransformationService
//! ┌───────┼──────────────────────────────────────────────────┐
//! │   外部图片处理服务 (reqwest multipart / JSON)             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`config`] | `AppConfig` 加载、保存、校验 |
//! | [`db`] | 图片记录的持久化与读取 |
//! | [`handles`] | 显示句柄生命周期 |
//! | [`operations`] | 请求校验与规范化管线 |
//! | [`workspace`] | 工作区暂存引擎 |
//! | [`selection`] | 多图选择子系统 |
//! | [`service`] | 外部变换服务边界与 HTTP 实现 |
//! | [`loader`] | 上传文件读取 |
//! | [`session`] | 用户动作编排 |
//! | [`commands`] | 文本命令解析与分派 |

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod handles;
pub mod loader;
pub mod operations;
pub mod selection;
pub mod service;
pub mod session;
pub mod workspace;
