//! # 操作种类
//!
//! 单图操作九种、多图组合操作三种。字符串形式与外部服务的 `operation_type`
//! / `operation` 字段一致，解析时忽略大小写与首尾空白。

use std::fmt;

/// 单图变换种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Grayscale,
    Halftoning,
    HistogramEqualization,
    HistogramSmoothing,
    BasicEdgeDetection,
    AdvancedEdgeDetection,
    Filtering,
    HistogramSegmentation,
    SingleImageOperation,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        Self::Grayscale,
        Self::Halftoning,
        Self::HistogramEqualization,
        Self::HistogramSmoothing,
        Self::BasicEdgeDetection,
        Self::AdvancedEdgeDetection,
        Self::Filtering,
        Self::HistogramSegmentation,
        Self::SingleImageOperation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Halftoning => "halftoning",
            Self::HistogramEqualization => "histogram_equalization",
            Self::HistogramSmoothing => "histogram_smoothing",
            Self::BasicEdgeDetection => "basic_edge_detection",
            Self::AdvancedEdgeDetection => "advanced_edge_detection",
            Self::Filtering => "filtering",
            Self::HistogramSegmentation => "histogram_based_segmentation",
            Self::SingleImageOperation => "single_image_operation",
        }
    }

    /// 解析外部字符串；未知种类返回 `None`。
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    /// 历史记录中使用的展示名，如 `Histogram Equalization`。
    pub fn title(self) -> String {
        title_case(self.as_str())
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 多图组合操作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiOperationKind {
    Add,
    Subtract,
    CutAndPaste,
}

impl MultiOperationKind {
    pub const ALL: [MultiOperationKind; 3] = [Self::Add, Self::Subtract, Self::CutAndPaste];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::CutAndPaste => "cut_and_paste",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase();
        Self::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }

    pub fn title(self) -> String {
        title_case(self.as_str())
    }

    /// add / subtract 要求所有图片与工作区尺寸一致。
    pub fn requires_matching_dimensions(self) -> bool {
        matches!(self, Self::Add | Self::Subtract)
    }
}

impl fmt::Display for MultiOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 首字母大写：`error_diffusion` -> `Error_diffusion`。
pub(crate) fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 下划线分词后逐词首字母大写：`cut_and_paste` -> `Cut And Paste`。
pub(crate) fn title_case(value: &str) -> String {
    value
        .split('_')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}
