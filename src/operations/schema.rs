//! # 声明式字段约束表
//!
//! ## 设计思路
//!
//! 每种操作对应一张 `OperationSchema`：一组按顺序求值的 `Rule` 加一个规范化函数。
//! 新增操作只需新增表项，不需要新增分支。
//!
//! ## 实现思路
//!
//! - `Field` 描述单个字段的类型与取值约束（枚举 / 整数 / 小数 / 开关 / 颜色）。
//! - `Condition` 只读取原始表单，条件之间互不依赖，因此所有规则都会被求值，
//!   违规项按规则顺序全部累积，而不是遇到第一条就返回。
//! - 字段求值通过后写入 `Parameters`，顺序即表中顺序，最后交给规范化函数合并字段。

use super::descriptor::{ParamValue, Parameters};
use super::form::FormInput;
use super::kind::{OperationKind, capitalize};
use super::normalize_color;

const BYTE_MAX: i64 = 255;

// ============================================================================
// 字段与条件
// ============================================================================

/// 单个字段的类型与约束
#[derive(Debug, Clone, Copy)]
pub enum Field {
    /// 枚举选项（大小写不敏感）
    Choice { key: &'static str, label: &'static str, allowed: &'static [&'static str] },
    /// 闭区间整数，可要求奇数
    Integer { key: &'static str, label: &'static str, min: i64, max: i64, odd: bool },
    /// 有限小数
    Decimal { key: &'static str, label: &'static str },
    /// 复选框，永不缺失
    Flag { key: &'static str },
    /// `#rrggbb` 或颜色名
    Color { key: &'static str, label: &'static str },
}

/// 字段求值结果
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Missing,
    Invalid(Vec<String>),
    Valid(ParamValue),
}

impl Field {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Choice { key, .. }
            | Self::Integer { key, .. }
            | Self::Decimal { key, .. }
            | Self::Flag { key }
            | Self::Color { key, .. } => *key,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Choice { label, .. }
            | Self::Integer { label, .. }
            | Self::Decimal { label, .. }
            | Self::Color { label, .. } => *label,
            Self::Flag { key } => *key,
        }
    }

    fn evaluate(&self, form: &FormInput) -> Outcome {
        if let Self::Flag { key } = self {
            return Outcome::Valid(ParamValue::Bool(form.flag(key)));
        }
        let Some(raw) = form.text(self.key()) else {
            return Outcome::Missing;
        };

        match *self {
            Self::Choice { label, allowed, .. } => {
                let value = raw.to_lowercase();
                if allowed.contains(&value.as_str()) {
                    Outcome::Valid(ParamValue::Text(value))
                } else {
                    Outcome::Invalid(vec![format!(
                        "{} must be one of {{{}}}.",
                        label,
                        allowed.join(", ")
                    )])
                }
            }
            Self::Integer { label, min, max, odd, .. } => match raw.parse::<i64>() {
                Err(_) => {
                    let kind = if odd { "an odd integer" } else { "an integer" };
                    Outcome::Invalid(vec![format!("{label} must be {kind} between {min} and {max}.")])
                }
                Ok(value) => {
                    let mut problems = Vec::new();
                    if !(min..=max).contains(&value) {
                        problems.push(format!("{label} must be between {min} and {max}."));
                    }
                    if odd && value % 2 == 0 {
                        problems.push(format!("{label} must be an odd integer."));
                    }
                    if problems.is_empty() {
                        Outcome::Valid(ParamValue::Int(value))
                    } else {
                        Outcome::Invalid(problems)
                    }
                }
            },
            Self::Decimal { label, .. } => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => Outcome::Valid(ParamValue::Float(value)),
                _ => Outcome::Invalid(vec![format!("{label} must be a valid number.")]),
            },
            Self::Color { label, .. } => match normalize_color(raw) {
                Some(hex) => Outcome::Valid(ParamValue::Text(hex)),
                None => Outcome::Invalid(vec![format!(
                    "{label} must be a hex color like #rrggbb or one of {{white, black}}."
                )]),
            },
            Self::Flag { .. } => Outcome::Missing,
        }
    }
}

/// 规则触发条件（只读取原始表单）
#[derive(Debug, Clone, Copy)]
pub enum Condition {
    /// 复选框已勾选
    FlagSet { key: &'static str, label: &'static str },
    /// 复选框未勾选
    FlagUnset { key: &'static str },
    /// 枚举字段取值属于给定集合
    ChoiceIs { key: &'static str, label: &'static str, values: &'static [&'static str] },
    /// 枚举字段取值不属于给定集合（包括未填写）
    ChoiceIsNot { key: &'static str, values: &'static [&'static str] },
    /// 字段已填写
    Present { key: &'static str },
    All(&'static [Condition]),
}

impl Condition {
    fn holds(&self, form: &FormInput) -> bool {
        match self {
            Self::FlagSet { key, .. } => form.flag(key),
            Self::FlagUnset { key } => !form.flag(key),
            Self::ChoiceIs { key, values, .. } => form
                .choice(key)
                .is_some_and(|value| values.contains(&value.as_str())),
            Self::ChoiceIsNot { key, values } => !form
                .choice(key)
                .is_some_and(|value| values.contains(&value.as_str())),
            Self::Present { key } => form.is_present(key),
            Self::All(conditions) => conditions.iter().all(|condition| condition.holds(form)),
        }
    }

    /// 条件字段缺失时的提示。
    fn missing_message(&self, field: &Field, form: &FormInput) -> String {
        match self {
            Self::FlagSet { label, .. } => {
                format!("'{}' is required when '{}' is enabled.", field.label(), label)
            }
            Self::ChoiceIs { key, label, .. } => format!(
                "'{}' is required for {} '{}'.",
                field.label(),
                label,
                form.choice(key).map(|value| capitalize(&value)).unwrap_or_default()
            ),
            Self::All(conditions) => match conditions.first() {
                Some(first) => first.missing_message(field, form),
                None => format!("{} is required.", field.label()),
            },
            _ => format!("{} is required.", field.label()),
        }
    }
}

/// 条件字段缺失时的报告方式
#[derive(Debug, Clone, Copy)]
pub enum Missing {
    /// 每个缺失字段单独报告
    PerField,
    /// 任一字段缺失即报告一条合并消息，此时不再逐字段校验
    Together(&'static str),
    /// 可选字段，缺失不报告
    Skip,
}

/// 约束规则
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// 必填字段
    Require(Field),
    /// 条件成立时才要求 / 校验的字段
    When { condition: Condition, fields: &'static [Field], missing: Missing },
    /// 条件成立即违规；消息中的 `{}` 替换为 `subject` 字段首字母大写后的值
    Reject { condition: Condition, message: &'static str, subject: Option<&'static str> },
}

/// 单种操作的约束表与规范化函数
pub struct OperationSchema {
    pub kind: OperationKind,
    pub rules: &'static [Rule],
    pub normalize: fn(&mut Parameters),
}

// ============================================================================
// 求值
// ============================================================================

/// 按顺序求值全部规则，累积全部违规项。
pub fn evaluate(rules: &[Rule], form: &FormInput) -> Result<Parameters, Vec<String>> {
    let mut parameters = Parameters::new();
    let mut violations = Vec::new();

    for rule in rules {
        match rule {
            Rule::Require(field) => match field.evaluate(form) {
                Outcome::Valid(value) => parameters.insert(field.key(), value),
                Outcome::Missing => violations.push(format!("{} is required.", field.label())),
                Outcome::Invalid(problems) => violations.extend(problems),
            },
            Rule::When { condition, fields, missing } => {
                if !condition.holds(form) {
                    continue;
                }
                if let Missing::Together(message) = missing
                    && fields.iter().any(|field| !form.is_present(field.key()))
                {
                    violations.push(message.to_string());
                    continue;
                }
                for field in fields.iter() {
                    match field.evaluate(form) {
                        Outcome::Valid(value) => parameters.insert(field.key(), value),
                        Outcome::Missing => {
                            if matches!(missing, Missing::PerField) {
                                violations.push(condition.missing_message(field, form));
                            }
                        }
                        Outcome::Invalid(problems) => violations.extend(problems),
                    }
                }
            }
            Rule::Reject { condition, message, subject } => {
                if condition.holds(form) {
                    let value = subject
                        .and_then(|key| form.choice(key))
                        .map(|value| capitalize(&value))
                        .unwrap_or_default();
                    violations.push(message.replace("{}", &value));
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(parameters)
    } else {
        Err(violations)
    }
}

// ============================================================================
// 约束表
// ============================================================================

const COLOR_MODES: &[&str] = &["rgb", "grayscale"];
const MODE_CONTRAST_FREE: &[&str] = &["homogeneity", "difference"];
const MODE_EXTRA_KERNEL: &[&str] = &["variance", "range"];

const THRESHOLD: Field = Field::Integer { key: "threshold", label: "Threshold", min: 0, max: BYTE_MAX, odd: false };
const SMOOTHING_KERNEL: Field = Field::Integer {
    key: "smoothing_kernel_size",
    label: "Smoothing Kernel Size",
    min: 3,
    max: 999,
    odd: true,
};
const KERNEL_SIZE: Field = Field::Integer { key: "kernel_size", label: "Kernel Size", min: 3, max: 999, odd: true };

const THRESHOLDING_ON: Condition = Condition::FlagSet { key: "thresholding", label: "Thresholding" };
const CONTRAST_ON: Condition = Condition::FlagSet { key: "contrast_based", label: "Contrast Based" };

/// 边缘检测共用的开关与条件字段
const EDGE_TOGGLES: [Rule; 4] = [
    Rule::Require(Field::Flag { key: "thresholding" }),
    Rule::Require(Field::Flag { key: "contrast_based" }),
    Rule::When { condition: THRESHOLDING_ON, fields: &[THRESHOLD], missing: Missing::PerField },
    Rule::When { condition: CONTRAST_ON, fields: &[SMOOTHING_KERNEL], missing: Missing::PerField },
];

static GRAYSCALE: OperationSchema = OperationSchema {
    kind: OperationKind::Grayscale,
    rules: &[Rule::Require(Field::Choice {
        key: "mode",
        label: "Mode",
        allowed: &["lightness", "luminosity"],
    })],
    normalize: keep,
};

static HALFTONING: OperationSchema = OperationSchema {
    kind: OperationKind::Halftoning,
    rules: &[
        Rule::Require(Field::Choice { key: "mode", label: "Color Mode", allowed: COLOR_MODES }),
        Rule::Require(Field::Choice {
            key: "method",
            label: "Method",
            allowed: &["thresholding", "error_diffusion"],
        }),
        Rule::When {
            condition: Condition::ChoiceIs { key: "mode", label: "Color Mode", values: &["rgb"] },
            fields: &[
                Field::Integer { key: "r_threshold", label: "R-Channel Threshold", min: 0, max: BYTE_MAX, odd: false },
                Field::Integer { key: "g_threshold", label: "G-Channel Threshold", min: 0, max: BYTE_MAX, odd: false },
                Field::Integer { key: "b_threshold", label: "B-Channel Threshold", min: 0, max: BYTE_MAX, odd: false },
            ],
            missing: Missing::PerField,
        },
        Rule::When {
            condition: Condition::ChoiceIs { key: "mode", label: "Color Mode", values: &["grayscale"] },
            fields: &[THRESHOLD],
            missing: Missing::PerField,
        },
    ],
    normalize: merge_channel_thresholds,
};

static HISTOGRAM_EQUALIZATION: OperationSchema = OperationSchema {
    kind: OperationKind::HistogramEqualization,
    rules: &[Rule::Require(Field::Choice { key: "mode", label: "Color Mode", allowed: COLOR_MODES })],
    normalize: keep,
};

static HISTOGRAM_SMOOTHING: OperationSchema = OperationSchema {
    kind: OperationKind::HistogramSmoothing,
    rules: &[
        Rule::Require(Field::Choice { key: "mode", label: "Color Mode", allowed: COLOR_MODES }),
        Rule::Require(Field::Integer { key: "kernel_size", label: "Kernel Size", min: 3, max: BYTE_MAX, odd: true }),
    ],
    normalize: keep,
};

static BASIC_EDGE_DETECTION: OperationSchema = OperationSchema {
    kind: OperationKind::BasicEdgeDetection,
    rules: &[
        Rule::Require(Field::Choice {
            key: "operator",
            label: "Operator",
            allowed: &["roberts", "sobel", "prewitt", "kirsch", "robinson", "laplacian_1", "laplacian_2"],
        }),
        EDGE_TOGGLES[0],
        EDGE_TOGGLES[1],
        EDGE_TOGGLES[2],
        EDGE_TOGGLES[3],
    ],
    normalize: keep,
};

static ADVANCED_EDGE_DETECTION: OperationSchema = OperationSchema {
    kind: OperationKind::AdvancedEdgeDetection,
    rules: &[
        Rule::Require(Field::Choice {
            key: "operator",
            label: "Operator",
            allowed: &["homogeneity", "difference", "gaussian_1", "gaussian_2", "variance", "range"],
        }),
        EDGE_TOGGLES[0],
        EDGE_TOGGLES[1],
        EDGE_TOGGLES[2],
        EDGE_TOGGLES[3],
        Rule::Reject {
            condition: Condition::All(&[
                Condition::ChoiceIs { key: "operator", label: "Operator", values: MODE_CONTRAST_FREE },
                CONTRAST_ON,
            ]),
            message: "Contrast Based cannot be enabled for operator '{}'.",
            subject: Some("operator"),
        },
        Rule::Reject {
            condition: Condition::All(&[
                Condition::ChoiceIs { key: "operator", label: "Operator", values: MODE_CONTRAST_FREE },
                Condition::FlagUnset { key: "thresholding" },
            ]),
            message: "Thresholding is required for operator '{}'.",
            subject: Some("operator"),
        },
        Rule::When {
            condition: Condition::ChoiceIs { key: "operator", label: "Operator", values: MODE_EXTRA_KERNEL },
            fields: &[KERNEL_SIZE],
            missing: Missing::PerField,
        },
    ],
    normalize: keep,
};

static FILTERING: OperationSchema = OperationSchema {
    kind: OperationKind::Filtering,
    rules: &[
        Rule::Require(Field::Choice { key: "mode", label: "Mode", allowed: &["high", "low", "median"] }),
        Rule::Require(KERNEL_SIZE),
        Rule::Reject {
            condition: Condition::All(&[
                Condition::ChoiceIs { key: "mode", label: "Mode", values: &["median"] },
                Condition::Present { key: "sigma" },
            ]),
            message: "Median filter does not require a sigma value.",
            subject: None,
        },
        Rule::When {
            condition: Condition::ChoiceIsNot { key: "mode", values: &["median"] },
            fields: &[Field::Decimal { key: "sigma", label: "Sigma" }],
            missing: Missing::Skip,
        },
    ],
    normalize: keep,
};

static HISTOGRAM_SEGMENTATION: OperationSchema = OperationSchema {
    kind: OperationKind::HistogramSegmentation,
    rules: &[
        Rule::Require(Field::Choice {
            key: "mode",
            label: "Mode",
            allowed: &["manual", "peak", "valley", "adaptive"],
        }),
        Rule::Require(Field::Integer { key: "value", label: "Pixel Value", min: 0, max: BYTE_MAX, odd: false }),
        Rule::Require(Field::Flag { key: "segment" }),
        Rule::When {
            condition: Condition::ChoiceIs { key: "mode", label: "Mode", values: &["manual"] },
            fields: &[
                Field::Integer { key: "hi", label: "High Threshold", min: 0, max: BYTE_MAX, odd: false },
                Field::Integer { key: "low", label: "Low Threshold", min: 0, max: BYTE_MAX, odd: false },
            ],
            missing: Missing::Together("'High Threshold' and 'Low Threshold' must be set for manual mode."),
        },
    ],
    normalize: keep,
};

static SINGLE_IMAGE_OPERATION: OperationSchema = OperationSchema {
    kind: OperationKind::SingleImageOperation,
    rules: &[
        Rule::Require(Field::Choice {
            key: "operation",
            label: "Operation",
            allowed: &["rotate", "flip", "resize", "invert"],
        }),
        Rule::When {
            condition: Condition::ChoiceIs { key: "operation", label: "Operation", values: &["rotate"] },
            fields: &[Field::Decimal { key: "angle", label: "Rotation Angle" }],
            missing: Missing::PerField,
        },
        Rule::When {
            condition: Condition::ChoiceIs { key: "operation", label: "Operation", values: &["flip"] },
            fields: &[Field::Choice { key: "flip_mode", label: "Flip Mode", allowed: &["horizontal", "vertical"] }],
            missing: Missing::PerField,
        },
        Rule::When {
            condition: Condition::ChoiceIs { key: "operation", label: "Operation", values: &["resize"] },
            fields: &[
                Field::Integer { key: "width", label: "Width", min: 1, max: 10_000, odd: false },
                Field::Integer { key: "height", label: "Height", min: 1, max: 10_000, odd: false },
            ],
            missing: Missing::PerField,
        },
    ],
    normalize: shape_geometry,
};

/// 新建空白图片的表单约束（不属于变换操作）
pub static CREATE_IMAGE_RULES: &[Rule] = &[
    Rule::Require(Field::Integer { key: "width", label: "Width", min: 1, max: 10_000, odd: false }),
    Rule::Require(Field::Integer { key: "height", label: "Height", min: 1, max: 10_000, odd: false }),
    Rule::Require(Field::Color { key: "color", label: "Color" }),
];

/// 查找某种操作的约束表。
pub fn schema_for(kind: OperationKind) -> &'static OperationSchema {
    match kind {
        OperationKind::Grayscale => &GRAYSCALE,
        OperationKind::Halftoning => &HALFTONING,
        OperationKind::HistogramEqualization => &HISTOGRAM_EQUALIZATION,
        OperationKind::HistogramSmoothing => &HISTOGRAM_SMOOTHING,
        OperationKind::BasicEdgeDetection => &BASIC_EDGE_DETECTION,
        OperationKind::AdvancedEdgeDetection => &ADVANCED_EDGE_DETECTION,
        OperationKind::Filtering => &FILTERING,
        OperationKind::HistogramSegmentation => &HISTOGRAM_SEGMENTATION,
        OperationKind::SingleImageOperation => &SINGLE_IMAGE_OPERATION,
    }
}

// ============================================================================
// 规范化函数
// ============================================================================

fn keep(_: &mut Parameters) {}

/// RGB 三通道阈值合并为 `threshold: [r, g, b]`。
fn merge_channel_thresholds(parameters: &mut Parameters) {
    let channels = ["r_threshold", "g_threshold", "b_threshold"];
    if !channels.iter().all(|key| parameters.get(key).is_some()) {
        return;
    }
    let values: Vec<i64> = channels
        .iter()
        .filter_map(|key| parameters.remove(key).and_then(|value| value.as_int()))
        .collect();
    parameters.insert("threshold", ParamValue::IntList(values));
}

/// 翻转方向改名为 `mode`，缩放宽高合并为 `output_size: [w, h]`。
fn shape_geometry(parameters: &mut Parameters) {
    if let Some(flip) = parameters.remove("flip_mode") {
        parameters.insert("mode", flip);
    }
    let width = parameters.get("width").and_then(ParamValue::as_int);
    let height = parameters.get("height").and_then(ParamValue::as_int);
    if let (Some(width), Some(height)) = (width, height) {
        parameters.remove("width");
        parameters.remove("height");
        parameters.insert("output_size", ParamValue::IntList(vec![width, height]));
    }
}
