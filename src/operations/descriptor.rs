//! # 规范化操作描述
//!
//! 校验通过后得到的操作描述与原始表单完全解耦：参数已类型化、枚举值已小写化、
//! 组合字段（如 RGB 阈值、输出尺寸）已合并。描述只用于一次服务调用，不持久化。

use std::fmt;

use serde_json::{Map, Value, json};

use super::kind::{MultiOperationKind, OperationKind};

/// 类型化参数值
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    IntList(Vec<i64>),
}

impl ParamValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => json!(text),
            Self::Int(value) => json!(value),
            Self::Float(value) => json!(value),
            Self::Bool(value) => json!(value),
            Self::IntList(values) => json!(values),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::IntList(values) => {
                let joined = values.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "[{joined}]")
            }
        }
    }
}

/// 有序参数表（顺序即历史记录中的展示顺序）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(Vec<(&'static str, ParamValue)>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入参数；同名参数覆盖原值并保留原位置。
    pub fn insert(&mut self, key: &'static str, value: ParamValue) {
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.0.iter().position(|(existing, _)| *existing == key)?;
        Some(self.0.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(existing, _)| *existing == key).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn write_into(&self, target: &mut Map<String, Value>) {
        for (key, value) in self.iter() {
            target.insert(key.to_string(), value.to_json());
        }
    }

    /// `key with spaces: value, ...`
    fn describe(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{}: {}", key.replace('_', " "), value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// 单图变换描述
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    pub kind: OperationKind,
    pub parameters: Parameters,
}

impl OperationDescriptor {
    /// 发送给外部服务的 `operation_data` JSON。
    pub fn to_wire_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("operation_type".to_string(), json!(self.kind.as_str()));
        self.parameters.write_into(&mut body);
        Value::Object(body)
    }

    /// 历史记录条目，如 `Applied Grayscale (mode: luminosity)`。
    pub fn history_entry(&self) -> String {
        format!("Applied {} ({})", self.kind.title(), self.parameters.describe())
    }
}

/// 多图组合操作描述
#[derive(Debug, Clone, PartialEq)]
pub struct MultiOperationDescriptor {
    pub kind: MultiOperationKind,
    /// 参与运算的记录 id（按选择顺序；剪切粘贴为 源、目标）。
    pub sources: Vec<i64>,
    pub parameters: Parameters,
}

impl MultiOperationDescriptor {
    pub fn to_wire_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("operation_type".to_string(), json!("multi_image_operation"));
        body.insert("operation".to_string(), json!(self.kind.as_str()));
        self.parameters.write_into(&mut body);
        Value::Object(body)
    }

    pub fn history_entry(&self) -> String {
        let base = format!("Applied Multiple Image Operation: {}", self.kind.title());
        if self.parameters.is_empty() {
            base
        } else {
            format!("{} ({})", base, self.parameters.describe())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_entry_lists_parameters_in_order() {
        let mut parameters = Parameters::new();
        parameters.insert("operator", ParamValue::Text("sobel".into()));
        parameters.insert("thresholding", ParamValue::Bool(true));
        parameters.insert("threshold", ParamValue::Int(120));
        let descriptor = OperationDescriptor { kind: OperationKind::BasicEdgeDetection, parameters };

        assert_eq!(
            descriptor.history_entry(),
            "Applied Basic Edge Detection (operator: sobel, thresholding: true, threshold: 120)"
        );
    }

    #[test]
    fn wire_json_carries_operation_type() {
        let mut parameters = Parameters::new();
        parameters.insert("mode", ParamValue::Text("rgb".into()));
        parameters.insert("threshold", ParamValue::IntList(vec![10, 20, 30]));
        let descriptor = OperationDescriptor { kind: OperationKind::Halftoning, parameters };

        assert_eq!(
            descriptor.to_wire_json(),
            json!({ "operation_type": "halftoning", "mode": "rgb", "threshold": [10, 20, 30] })
        );
    }

    #[test]
    fn multi_descriptor_wire_json_and_history() {
        let mut parameters = Parameters::new();
        parameters.insert("src_region", ParamValue::IntList(vec![0, 0, 10, 10]));
        parameters.insert("dest_position", ParamValue::IntList(vec![5, 5]));
        let cut = MultiOperationDescriptor {
            kind: MultiOperationKind::CutAndPaste,
            sources: vec![1, 2],
            parameters,
        };

        assert_eq!(
            cut.to_wire_json(),
            json!({
                "operation_type": "multi_image_operation",
                "operation": "cut_and_paste",
                "src_region": [0, 0, 10, 10],
                "dest_position": [5, 5]
            })
        );
        assert_eq!(
            cut.history_entry(),
            "Applied Multiple Image Operation: Cut And Paste (src region: [0, 0, 10, 10], dest position: [5, 5])"
        );

        let add = MultiOperationDescriptor {
            kind: MultiOperationKind::Add,
            sources: vec![3],
            parameters: Parameters::new(),
        };
        assert_eq!(add.history_entry(), "Applied Multiple Image Operation: Add");
    }

    #[test]
    fn parameters_insert_overwrites_in_place() {
        let mut parameters = Parameters::new();
        parameters.insert("a", ParamValue::Int(1));
        parameters.insert("b", ParamValue::Int(2));
        parameters.insert("a", ParamValue::Int(3));

        assert_eq!(parameters.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(parameters.get("a"), Some(&ParamValue::Int(3)));
        assert_eq!(parameters.remove("b"), Some(ParamValue::Int(2)));
        assert_eq!(parameters.len(), 1);
    }

    #[test]
    fn float_display_drops_trailing_zero() {
        assert_eq!(ParamValue::Float(45.0).to_string(), "45");
        assert_eq!(ParamValue::Float(1.5).to_string(), "1.5");
    }
}
