//! # 请求校验与规范化管线
//!
//! ## 设计思路
//!
//! 原始表单 → 按操作种类查约束表 → 全部规则求值并累积违规项 → 规范化 → `OperationDescriptor`。
//! 违规列表非空时不产生描述，调用方也就无从调用外部服务。
//!
//! ## 模块结构
//!
//! | 子模块 | 职责 |
//! |--------|------|
//! | `kind` | 操作种类枚举 |
//! | `form` | 原始表单 |
//! | `schema` | 声明式约束表与求值 |
//! | `descriptor` | 规范化描述与历史条目 |
//! | `multi` | 多图组合操作校验 |

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::AppError;

pub mod descriptor;
pub mod form;
pub mod kind;
pub mod multi;
pub mod schema;

pub use descriptor::{MultiOperationDescriptor, OperationDescriptor, ParamValue, Parameters};
pub use form::FormInput;
pub use kind::{MultiOperationKind, OperationKind};
pub use multi::{MultiOperationRequest, SelectedImage, validate_multi};

static HEX_COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap());

/// 新建空白图片的规范化参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateImageRequest {
    pub width: u32,
    pub height: u32,
    /// 服务端接受的颜色：`white` / `black`，其他颜色为小写 `#rrggbb`
    pub color: String,
}

/// 校验单图操作表单，成功时返回规范化描述。
pub fn validate_operation(kind: &str, form: &FormInput) -> Result<OperationDescriptor, AppError> {
    let kind = OperationKind::parse(kind).ok_or_else(|| {
        let allowed: Vec<&str> = OperationKind::ALL.iter().map(|kind| kind.as_str()).collect();
        AppError::invalid(format!("Operation must be one of {{{}}}.", allowed.join(", ")))
    })?;
    let schema = schema::schema_for(kind);

    let mut parameters = schema::evaluate(schema.rules, form).map_err(AppError::Validation)?;
    (schema.normalize)(&mut parameters);

    Ok(OperationDescriptor { kind, parameters })
}

/// 校验新建空白图片的宽、高、颜色。
pub fn validate_create_image(form: &FormInput) -> Result<CreateImageRequest, AppError> {
    let parameters =
        schema::evaluate(schema::CREATE_IMAGE_RULES, form).map_err(AppError::Validation)?;

    let dimension = |key: &str| {
        parameters
            .get(key)
            .and_then(ParamValue::as_int)
            .and_then(|value| u32::try_from(value).ok())
    };
    let color = parameters.get("color").and_then(ParamValue::as_text);

    match (dimension("width"), dimension("height"), color) {
        (Some(width), Some(height), Some(color)) => Ok(CreateImageRequest {
            width,
            height,
            color: color.to_string(),
        }),
        _ => Err(AppError::invalid("Width, Height and Color are required.")),
    }
}

/// 解析 `#rrggbb`，不接受颜色名。
pub fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let value = value.trim();
    if !HEX_COLOR.is_match(value) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&value[range], 16).ok();
    Some([channel(1..3)?, channel(3..5)?, channel(5..7)?])
}

/// 颜色规范化为发送给服务的形式。
///
/// 白色与黑色一律使用颜色名（`#ffffff` -> `white`，`#000000` -> `black`），
/// 其他颜色为小写 `#rrggbb`。
pub fn normalize_color(value: &str) -> Option<String> {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "white" | "#ffffff" => Some("white".to_string()),
        "black" | "#000000" => Some("black".to_string()),
        _ => parse_hex_color(&value).map(|_| value),
    }
}

/// 解析规范化后的颜色（颜色名或 `#rrggbb`）为 RGB。
pub fn color_rgb(value: &str) -> Option<[u8; 3]> {
    match value.trim().to_lowercase().as_str() {
        "white" => Some([0xff, 0xff, 0xff]),
        "black" => Some([0, 0, 0]),
        other => parse_hex_color(other),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn grayscale_luminosity_produces_descriptor() {
        let form = FormInput::new().with("mode", "Luminosity");
        let descriptor = validate_operation("grayscale", &form).expect("valid grayscale");

        assert_eq!(descriptor.kind, OperationKind::Grayscale);
        assert_eq!(descriptor.history_entry(), "Applied Grayscale (mode: luminosity)");
    }

    #[test]
    fn unknown_kind_is_a_validation_fault() {
        let err = validate_operation("sharpen", &FormInput::new()).unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(err.violations()[0].starts_with("Operation must be one of {grayscale, halftoning"));
    }

    #[test]
    fn every_kind_reports_missing_required_choice() {
        for kind in OperationKind::ALL {
            let err = validate_operation(kind.as_str(), &FormInput::new()).unwrap_err();
            assert!(
                err.violations()[0].ends_with("is required."),
                "{kind}: {:?}",
                err.violations()
            );
        }
    }

    #[test]
    fn enumerated_choice_lists_allowed_values() {
        let form = FormInput::new().with("mode", "sepia");
        let err = validate_operation("grayscale", &form).unwrap_err();
        assert_eq!(err.violations(), ["Mode must be one of {lightness, luminosity}."]);
    }

    #[test]
    fn halftoning_collects_all_channel_violations() {
        let form = FormInput::new()
            .with("mode", "rgb")
            .with("method", "dither")
            .with("r_threshold", "300")
            .with("b_threshold", "abc");
        let err = validate_operation("halftoning", &form).unwrap_err();
        assert_eq!(
            err.violations(),
            [
                "Method must be one of {thresholding, error_diffusion}.",
                "R-Channel Threshold must be between 0 and 255.",
                "'G-Channel Threshold' is required for Color Mode 'Rgb'.",
                "B-Channel Threshold must be an integer between 0 and 255.",
            ]
        );
    }

    #[test]
    fn advanced_edge_detection_variance_requires_kernel() {
        let form = FormInput::new().with("operator", "variance");
        let err = validate_operation("advanced_edge_detection", &form).unwrap_err();
        assert_eq!(err.violations(), ["'Kernel Size' is required for Operator 'Variance'."]);

        let form = form.with("kernel_size", "7").with("thresholding", "true").with("threshold", "40");
        let descriptor = validate_operation("advanced_edge_detection", &form).expect("valid variance");
        assert_eq!(descriptor.parameters.get("kernel_size"), Some(&ParamValue::Int(7)));
    }

    #[test]
    fn homogeneity_requires_thresholding() {
        let form = FormInput::new().with("operator", "homogeneity");
        let err = validate_operation("advanced_edge_detection", &form).unwrap_err();
        assert_eq!(err.violations(), ["Thresholding is required for operator 'Homogeneity'."]);
    }

    #[test]
    fn median_filter_rejects_sigma() {
        let form = FormInput::new().with("mode", "median").with("kernel_size", "3").with("sigma", "1.5");
        let err = validate_operation("filtering", &form).unwrap_err();
        assert_eq!(err.violations(), ["Median filter does not require a sigma value."]);

        let form = FormInput::new().with("mode", "low").with("kernel_size", "4").with("sigma", "x");
        let err = validate_operation("filtering", &form).unwrap_err();
        assert_eq!(
            err.violations(),
            ["Kernel Size must be an odd integer.", "Sigma must be a valid number."]
        );
    }

    #[test]
    fn segmentation_manual_mode_descriptor() {
        let form = FormInput::from_pairs(["mode=manual", "value=128", "segment", "hi=200", "low=50"]);
        let descriptor = validate_operation("histogram_based_segmentation", &form).expect("valid manual");
        assert_eq!(
            descriptor.history_entry(),
            "Applied Histogram Based Segmentation (mode: manual, value: 128, segment: true, hi: 200, low: 50)"
        );
    }

    #[test]
    fn create_image_normalizes_color_and_accumulates() {
        let form = FormInput::new().with("width", "500").with("height", "500").with("color", "#FFFFFF");
        let request = validate_create_image(&form).expect("valid create");
        assert_eq!(request, CreateImageRequest { width: 500, height: 500, color: "white".into() });

        let form = FormInput::new().with("width", "8").with("height", "8").with("color", "#12AB34");
        let request = validate_create_image(&form).expect("valid create");
        assert_eq!(request.color, "#12ab34");

        let form = FormInput::new().with("width", "0").with("color", "teal");
        let err = validate_create_image(&form).unwrap_err();
        assert_eq!(err.violations().len(), 3);
        assert_eq!(err.violations()[0], "Width must be between 1 and 10000.");
        assert_eq!(err.violations()[1], "Height is required.");
    }

    #[test]
    fn hex_color_parsing() {
        assert_eq!(parse_hex_color("#cccccc"), Some([0xcc, 0xcc, 0xcc]));
        assert_eq!(parse_hex_color("#0A0b0C"), Some([10, 11, 12]));
        assert_eq!(parse_hex_color("cccccc"), None);
        assert_eq!(parse_hex_color("#ccc"), None);
        assert_eq!(normalize_color("Black").as_deref(), Some("black"));
        assert_eq!(normalize_color("#000000").as_deref(), Some("black"));
        assert_eq!(normalize_color(" White ").as_deref(), Some("white"));
        assert_eq!(normalize_color("gray"), None);
        assert_eq!(color_rgb("white"), Some([0xff, 0xff, 0xff]));
        assert_eq!(color_rgb("#0a0b0c"), Some([10, 11, 12]));
    }

    proptest! {
        #[test]
        fn smoothing_kernel_valid_iff_odd_in_range(size in -50i64..400) {
            let form = FormInput::new().with("mode", "grayscale").with("kernel_size", size.to_string());
            let result = validate_operation("histogram_smoothing", &form);
            let expected_ok = (3..=255).contains(&size) && size % 2 != 0;
            prop_assert_eq!(result.is_ok(), expected_ok);
        }

        #[test]
        fn threshold_range_is_closed(threshold in -20i64..300) {
            let form = FormInput::from_pairs(["operator=sobel", "thresholding"])
                .with("threshold", threshold.to_string());
            let result = validate_operation("basic_edge_detection", &form);
            prop_assert_eq!(result.is_ok(), (0..=255).contains(&threshold));
        }

        #[test]
        fn violations_are_the_union_of_independent_faults(
            bad_mode in any::<bool>(),
            bad_kernel in any::<bool>(),
        ) {
            let form = FormInput::new()
                .with("mode", if bad_mode { "sepia" } else { "rgb" })
                .with("kernel_size", if bad_kernel { "abc" } else { "5" });
            let expected = usize::from(bad_mode) + usize::from(bad_kernel);
            match validate_operation("histogram_smoothing", &form) {
                Ok(_) => prop_assert_eq!(expected, 0),
                Err(err) => prop_assert_eq!(err.violations().len(), expected),
            }
        }
    }
}
