//! 条件评估器
//!
//! 操作数求值结果为文本、数字或缺失（None）：
//! - 两侧都是文本时按字符串比较（顺序比较为字典序），不做数字转换
//! - 任一侧是数字时，`==` 和顺序比较把另一侧转为数值；`===` 要求类型相同
//! - 缺失值只与缺失值相等，参与顺序比较、包含和正则匹配时结果为 false

use crate::models::EventRecord;
use crate::operand::{Operand, OperandValue};
use crate::operators::Operator;
use regex::Regex;
use std::cmp::Ordering;
use tracing::warn;

type Value<'a> = Option<OperandValue<'a>>;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估条件
    ///
    /// # Arguments
    /// * `operator` - 操作符
    /// * `left` - 左操作数的值
    /// * `right` - 右操作数的值
    pub fn evaluate(
        operator: Operator,
        left: Option<OperandValue<'_>>,
        right: Option<OperandValue<'_>>,
    ) -> bool {
        match operator {
            Operator::Eq => Self::loose_eq(left, right),
            Operator::Neq => !Self::loose_eq(left, right),
            Operator::StrictEq => Self::strict_eq(left, right),
            Operator::StrictNeq => !Self::strict_eq(left, right),
            Operator::Gt => Self::compare(left, right, Ordering::is_gt),
            Operator::Gte => Self::compare(left, right, Ordering::is_ge),
            Operator::Lt => Self::compare(left, right, Ordering::is_lt),
            Operator::Lte => Self::compare(left, right, Ordering::is_le),
            Operator::Contains => match (left, right) {
                (Some(haystack), Some(needle)) => haystack.text().contains(needle.text()),
                _ => false,
            },
            Operator::Regex => match (left, right) {
                (Some(text), Some(pattern)) => Self::regex_match(text.text(), pattern.text()),
                _ => false,
            },
        }
    }

    /// 宽松相等：任一侧为数字时按数值比较
    fn loose_eq(left: Value<'_>, right: Value<'_>) -> bool {
        match (left, right) {
            (Some(OperandValue::Text(a)), Some(OperandValue::Text(b))) => a == b,
            (Some(a), Some(b)) => a.to_number() == b.to_number(),
            (None, None) => true,
            _ => false,
        }
    }

    /// 严格相等：类型不同即不相等
    fn strict_eq(left: Value<'_>, right: Value<'_>) -> bool {
        match (left, right) {
            (Some(OperandValue::Text(a)), Some(OperandValue::Text(b))) => a == b,
            (Some(OperandValue::Number(_, a)), Some(OperandValue::Number(_, b))) => a == b,
            (None, None) => true,
            _ => false,
        }
    }

    /// 顺序比较：两侧都是文本时按字典序，否则按数值（NaN 不满足任何比较）
    fn compare<F>(left: Value<'_>, right: Value<'_>, accept: F) -> bool
    where
        F: Fn(Ordering) -> bool,
    {
        let ordering = match (left, right) {
            (Some(OperandValue::Text(a)), Some(OperandValue::Text(b))) => Some(a.cmp(b)),
            (Some(a), Some(b)) => a.to_number().partial_cmp(&b.to_number()),
            _ => None,
        };

        ordering.is_some_and(accept)
    }

    /// 运行时编译正则（右操作数来自事件字段时）
    fn regex_match(text: &str, pattern: &str) -> bool {
        match Regex::new(pattern) {
            Ok(regex) => regex.is_match(text),
            Err(e) => {
                warn!(pattern = %pattern, error = %e, "事件字段中的正则表达式无效，按不匹配处理");
                false
            }
        }
    }
}

/// 编译后的 `if` 条件
#[derive(Debug, Clone)]
pub struct Condition {
    pub left: Operand,
    pub operator: Operator,
    pub right: Operand,
    pub negate: bool,
    /// 右操作数为字面量时预编译的正则
    pattern: Option<Regex>,
}

impl Condition {
    /// 构造条件；regex 操作符的字面量模式在此预编译
    pub fn new(
        left: Operand,
        operator: Operator,
        right: Operand,
        negate: bool,
    ) -> Result<Self, regex::Error> {
        let pattern = match (&operator, &right) {
            (Operator::Regex, Operand::Literal(pattern)) => Some(Regex::new(pattern)?),
            _ => None,
        };

        Ok(Self {
            left,
            operator,
            right,
            negate,
            pattern,
        })
    }

    /// 针对事件记录的当前状态求值
    pub fn evaluate(&self, record: &EventRecord) -> bool {
        let left = self.left.resolve(record);

        let matched = match &self.pattern {
            Some(regex) => left.is_some_and(|value| regex.is_match(value.text())),
            None => ConditionEvaluator::evaluate(self.operator, left, self.right.resolve(record)),
        };

        matched != self.negate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyLine;

    fn text(value: &str) -> Value<'_> {
        Some(OperandValue::Text(value))
    }

    fn number(value: &str) -> Value<'_> {
        Some(OperandValue::typed(value, "integer"))
    }

    fn eval(operator: Operator, left: Value<'_>, right: Value<'_>) -> bool {
        ConditionEvaluator::evaluate(operator, left, right)
    }

    #[test]
    fn test_loose_eq_text_is_exact() {
        assert!(eval(Operator::Eq, text("hello"), text("hello")));
        assert!(!eval(Operator::Eq, text("hello"), text("world")));
        assert!(!eval(Operator::Eq, text("5"), text("5.0")));
        assert!(!eval(Operator::Eq, text(" 5 "), text("5")));
    }

    #[test]
    fn test_loose_eq_coerces_against_number() {
        assert!(eval(Operator::Eq, number("5"), text("5.0")));
        assert!(eval(Operator::Eq, number("5"), text(" 5 ")));
        assert!(eval(Operator::Eq, number("0"), text("")));
        assert!(!eval(Operator::Eq, number("5"), text("five")));
        assert!(eval(Operator::Neq, number("5"), text("6")));
    }

    #[test]
    fn test_strict_eq_compares_types() {
        assert!(eval(Operator::StrictEq, text("5"), text("5")));
        assert!(!eval(Operator::StrictEq, text("5"), text("5.0")));
        assert!(!eval(Operator::StrictEq, number("0"), text("0")));
        assert!(eval(Operator::StrictNeq, number("0"), text("0")));
        assert!(eval(Operator::StrictEq, number("5"), Some(OperandValue::typed("5.0", "float"))));
    }

    #[test]
    fn test_absent_values() {
        assert!(eval(Operator::Eq, None, None));
        assert!(eval(Operator::StrictEq, None, None));
        assert!(!eval(Operator::Eq, None, text("")));
        assert!(eval(Operator::Neq, None, text("x")));
        assert!(!eval(Operator::Gt, None, text("1")));
        assert!(!eval(Operator::Contains, None, text("a")));
        assert!(!eval(Operator::Regex, None, text(".*")));
    }

    #[test]
    fn test_text_ordering_is_lexical() {
        assert!(!eval(Operator::Gt, text("10"), text("9")));
        assert!(eval(Operator::Lt, text("10"), text("9")));
        assert!(eval(Operator::Gte, text("b"), text("b")));
        assert!(eval(Operator::Lte, text("20240101"), text("20240102")));
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(eval(Operator::Gt, number("10"), text("9")));
        assert!(eval(Operator::Lt, text("9"), number("10")));
        assert!(eval(Operator::Gte, number("3"), number("3")));
        // 无法转为数值的文本不满足任何顺序比较
        assert!(!eval(Operator::Gt, number("10"), text("abc")));
        assert!(!eval(Operator::Lte, number("10"), text("abc")));
    }

    #[test]
    fn test_contains() {
        assert!(eval(Operator::Contains, text("Team Meeting"), text("Meet")));
        assert!(!eval(Operator::Contains, text("Lunch"), text("Meet")));
        assert!(eval(Operator::Contains, number("105"), text("05")));
    }

    #[test]
    fn test_regex_runtime_pattern() {
        assert!(eval(Operator::Regex, text("Room 101"), text(r"^Room \d+$")));
        // 无效的运行时正则按不匹配处理
        assert!(!eval(Operator::Regex, text("Room"), text("[invalid")));
    }

    #[test]
    fn test_condition_with_compiled_pattern() {
        let record = EventRecord::new(vec![PropertyLine::new("SUMMARY", "text", "Sprint Review")]);
        let condition = Condition::new(
            Operand::parse("event.SUMMARY"),
            Operator::Regex,
            Operand::parse("^sprint"),
            false,
        )
        .unwrap();
        assert!(!condition.evaluate(&record));

        let condition = Condition::new(
            Operand::parse("event.SUMMARY"),
            Operator::Regex,
            Operand::parse("(?i)^sprint"),
            false,
        )
        .unwrap();
        assert!(condition.evaluate(&record));
    }

    #[test]
    fn test_condition_rejects_invalid_literal_pattern() {
        let result = Condition::new(
            Operand::parse("event.SUMMARY"),
            Operator::Regex,
            Operand::parse("[invalid"),
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_condition_uses_property_type() {
        let record = EventRecord::new(vec![
            PropertyLine::new("SUMMARY", "text", "10"),
            PropertyLine::new("PRIORITY", "integer", "10"),
        ]);
        let gt_nine = |field: &str| {
            Condition::new(Operand::parse(field), Operator::Gt, Operand::parse("9"), false)
                .unwrap()
                .evaluate(&record)
        };

        assert!(!gt_nine("event.SUMMARY"));
        assert!(gt_nine("event.PRIORITY"));
    }

    #[test]
    fn test_negated_eq_matches_neq() {
        let values = [
            None,
            Some(("text", "5")),
            Some(("text", "5.0")),
            Some(("integer", "5")),
            Some(("float", "5.0")),
            Some(("integer", "6")),
            Some(("text", "x")),
        ];
        for value in values {
            let record = match value {
                Some((value_type, v)) => EventRecord::new(vec![PropertyLine::new("X", value_type, v)]),
                None => EventRecord::default(),
            };
            let negated = Condition::new(
                Operand::parse("event.X"),
                Operator::Eq,
                Operand::parse("5"),
                true,
            )
            .unwrap();
            let neq = Condition::new(
                Operand::parse("event.X"),
                Operator::Neq,
                Operand::parse("5"),
                false,
            )
            .unwrap();
            assert_eq!(negated.evaluate(&record), neq.evaluate(&record), "value {:?}", value);
        }
    }
}
