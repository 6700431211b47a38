//! # 多图组合操作校验
//!
//! add / subtract 要求每张选中图片与工作区图片尺寸完全一致；cut_and_paste 要求恰好两张图片
//! （源、目标）以及源区域、目标位置两组整数。违规项全部累积，按图片位置逐条报告。

use crate::db::Dimensions;
use crate::error::AppError;

use super::descriptor::{MultiOperationDescriptor, ParamValue, Parameters};
use super::kind::MultiOperationKind;

/// 选择弹窗中确认的一张图片
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedImage {
    pub id: i64,
    /// 记录元数据中的尺寸，缺失时为 `None`
    pub dimensions: Option<Dimensions>,
}

/// 多图操作的原始请求
#[derive(Debug, Clone, Default)]
pub struct MultiOperationRequest {
    pub kind: String,
    pub images: Vec<SelectedImage>,
    /// `x,y,w,h`
    pub src_region: Option<String>,
    /// `x,y`
    pub dest_position: Option<String>,
}

/// 校验多图请求并生成描述。
///
/// `workspace` 为工作区图片尺寸，add / subtract 需要它做尺寸比对。
pub fn validate_multi(
    request: &MultiOperationRequest,
    workspace: Option<Dimensions>,
) -> Result<MultiOperationDescriptor, AppError> {
    let mut violations = Vec::new();

    if request.images.is_empty() {
        violations.push("At least one image must be provided.".to_string());
    }

    let kind = MultiOperationKind::parse(&request.kind);
    if kind.is_none() {
        violations.push("Operation must be one of {add, subtract, cut_and_paste}.".to_string());
    }

    let src_region = non_blank(request.src_region.as_deref());
    let dest_position = non_blank(request.dest_position.as_deref());
    let mut parameters = Parameters::new();

    match kind {
        Some(MultiOperationKind::CutAndPaste) => {
            if request.images.len() != 2 {
                violations.push(
                    "Operation 'cut_and_paste' requires exactly two images (source and destination)."
                        .to_string(),
                );
            }
            match src_region.and_then(|raw| parse_int_tuple(raw, 4)) {
                Some(region) => parameters.insert("src_region", ParamValue::IntList(region)),
                None => violations.push(
                    "Operation 'cut_and_paste' requires 'src_region' as four comma-separated integers."
                        .to_string(),
                ),
            }
            match dest_position.and_then(|raw| parse_int_tuple(raw, 2)) {
                Some(position) => parameters.insert("dest_position", ParamValue::IntList(position)),
                None => violations.push(
                    "Operation 'cut_and_paste' requires 'dest_position' as two comma-separated integers."
                        .to_string(),
                ),
            }
        }
        Some(kind) => {
            if src_region.is_some() || dest_position.is_some() {
                violations.push(format!(
                    "Operation '{}' does not use 'src_region' or 'dest_position'.",
                    kind.as_str()
                ));
            }
            match workspace {
                Some(expected) => {
                    for (index, image) in request.images.iter().enumerate() {
                        match image.dimensions {
                            Some(actual) if actual == expected => {}
                            Some(_) => violations.push(format!(
                                "Image {} dimensions do not match the workspace image.",
                                index + 1
                            )),
                            None => violations.push(format!(
                                "Image {} metadata is missing or incomplete.",
                                index + 1
                            )),
                        }
                    }
                }
                None => violations
                    .push("Workspace image dimensions are not available for validation.".to_string()),
            }
        }
        None => {}
    }

    match kind {
        Some(kind) if violations.is_empty() => Ok(MultiOperationDescriptor {
            kind,
            sources: request.images.iter().map(|image| image.id).collect(),
            parameters,
        }),
        _ => Err(AppError::Validation(violations)),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// 解析 `a,b,c` 形式的整数组，个数必须恰好为 `expected`。
fn parse_int_tuple(raw: &str, expected: usize) -> Option<Vec<i64>> {
    let values = raw
        .trim_matches(|c| c == '(' || c == ')' || c == '[' || c == ']')
        .split(',')
        .map(|part| part.trim().parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()?;
    (values.len() == expected).then_some(values)
}
