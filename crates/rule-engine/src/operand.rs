//! 操作数解析
//!
//! `event.<字段>` 引用事件记录中的属性值，其余字符串都是字面量。
//! 字段值带上属性行的值类型：`integer` / `float` 属性是数字，其余都是文本；
//! 字面量始终是文本。

use crate::models::EventRecord;

/// 字段引用前缀
pub const FIELD_PREFIX: &str = "event.";

/// 按数字处理的值类型
const NUMERIC_TYPES: &[&str] = &["integer", "float"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Field(String),
}

/// 求值后的操作数
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandValue<'a> {
    Text(&'a str),
    /// 数字类型属性：原始文本与解析后的数值
    Number(&'a str, f64),
}

impl<'a> OperandValue<'a> {
    /// 按值类型构造；数字类型但无法解析时退化为文本
    pub fn typed(value: &'a str, value_type: &str) -> Self {
        if NUMERIC_TYPES
            .iter()
            .any(|numeric| value_type.eq_ignore_ascii_case(numeric))
        {
            if let Ok(number) = value.parse::<f64>() {
                return Self::Number(value, number);
            }
        }
        Self::Text(value)
    }

    /// 原始文本，用于包含和正则匹配
    pub fn text(&self) -> &'a str {
        match *self {
            Self::Text(text) | Self::Number(text, _) => text,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number(..))
    }

    /// 转为数值：空白文本为 0，无法解析为 NaN
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(_, number) => *number,
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() {
                    0.0
                } else {
                    text.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }
}

impl Operand {
    /// 任何字符串都是合法操作数
    pub fn parse(operand: &str) -> Self {
        match operand.strip_prefix(FIELD_PREFIX) {
            Some(field) => Self::Field(field.to_string()),
            None => Self::Literal(operand.to_string()),
        }
    }

    /// 针对事件记录求值，未找到字段时返回 None
    pub fn resolve<'a>(&'a self, record: &'a EventRecord) -> Option<OperandValue<'a>> {
        match self {
            Self::Literal(value) => Some(OperandValue::Text(value)),
            Self::Field(name) => {
                let line = record.line_of(name)?;
                Some(OperandValue::typed(line.value()?, &line.value_type))
            }
        }
    }
}
