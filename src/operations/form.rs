//! # 原始表单输入
//!
//! 表单值一律按字符串接收（与界面输入框一致），空白字符串视为“未填写”。
//! 复选框类字段以 `true` / `on` / `1` / `yes` 表示勾选，其余视为未勾选。

use std::collections::HashMap;

/// 一次操作请求的原始表单
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    values: HashMap<String, String>,
}

impl FormInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式写入字段，便于调用方与测试构造表单。
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.trim().to_lowercase(), value.into());
    }

    /// 解析 `key=value` 形式的片段列表（命令行输入）。
    ///
    /// 没有 `=` 的片段按 `key=true` 处理，便于书写开关类字段。
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Self {
        let mut form = Self::new();
        for pair in pairs {
            match pair.split_once('=') {
                Some((key, value)) => form.set(key, value),
                None => form.set(pair, "true"),
            }
        }
        form
    }

    /// 已裁剪的非空字段值。
    pub fn text(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// 小写化后的字段值，用于枚举选项比较。
    pub fn choice(&self, key: &str) -> Option<String> {
        self.text(key).map(str::to_lowercase)
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.text(key).is_some()
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(
            self.choice(key).as_deref(),
            Some("true" | "on" | "1" | "yes" | "checked")
        )
    }
}
