//! 过滤表达式编译器
//!
//! 将 `and` / `or` / `if` 组成的 JSON 过滤树递归编译成单个谓词。
//! 所有结构错误都在编译期报告，带上出错节点的路径。

use crate::error::{Result, RuleError};
use crate::evaluator::Condition;
use crate::models::EventRecord;
use crate::operand::Operand;
use crate::operators::{FilterKind, Operator};
use serde_json::{Map, Value};
use std::sync::Arc;

/// 编译后的过滤谓词
///
/// 只依赖事件记录在调用时的属性，不保留跨请求状态。
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&EventRecord) -> bool + Send + Sync>);

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate").finish_non_exhaustive()
    }
}

impl Predicate {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&EventRecord) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// 恒真谓词
    pub fn always() -> Self {
        Self::from_fn(|_| true)
    }

    /// 短路与：左侧为 false 时不调用右侧
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Self::from_fn(move |record| left.evaluate(record) && right.evaluate(record))
    }

    /// 短路或：左侧为 true 时不调用右侧
    pub fn or(left: Predicate, right: Predicate) -> Self {
        Self::from_fn(move |record| left.evaluate(record) || right.evaluate(record))
    }

    pub fn evaluate(&self, record: &EventRecord) -> bool {
        (self.0)(record)
    }
}

impl From<Condition> for Predicate {
    fn from(condition: Condition) -> Self {
        Self::from_fn(move |record| condition.evaluate(record))
    }
}

/// 过滤表达式编译器
pub struct FilterCompiler<'a> {
    calendar: &'a str,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(calendar: &'a str) -> Self {
        Self { calendar }
    }

    /// 编译过滤表达式
    pub fn compile(&self, filter: &Value, path: &str) -> Result<Predicate> {
        let node = filter
            .as_object()
            .ok_or_else(|| self.error(path, "过滤条件必须是对象"))?;

        let key = node
            .get("key")
            .ok_or_else(|| self.error(path, "过滤条件缺少 key"))?;

        let kind = key
            .as_str()
            .and_then(FilterKind::parse)
            .ok_or_else(|| self.error(path, format!("无效的过滤 key: {}", key)))?;

        match kind {
            FilterKind::If => self.compile_condition(node, path),
            FilterKind::And | FilterKind::Or => {
                let left = node
                    .get("left")
                    .ok_or_else(|| self.error(path, format!("{} 节点缺少 left", kind)))?;
                let right = node
                    .get("right")
                    .ok_or_else(|| self.error(path, format!("{} 节点缺少 right", kind)))?;

                let left = self.compile(left, &format!("{}.left", path))?;
                let right = self.compile(right, &format!("{}.right", path))?;

                Ok(match kind {
                    FilterKind::And => Predicate::and(left, right),
                    _ => Predicate::or(left, right),
                })
            }
        }
    }

    /// 编译 `if` 节点
    fn compile_condition(&self, node: &Map<String, Value>, path: &str) -> Result<Predicate> {
        let left = self.string_field(node, "left", path)?;
        let operator = self.string_field(node, "operator", path)?;
        let right = self.string_field(node, "right", path)?;

        let operator = Operator::parse(operator)
            .ok_or_else(|| self.error(path, format!("无效的过滤操作符: {}", operator)))?;

        let negate = match node.get("negate") {
            None => false,
            Some(Value::Bool(negate)) => *negate,
            Some(other) => {
                return Err(self.error(path, format!("negate 必须是布尔值，实际为 {}", other)));
            }
        };

        let condition = Condition::new(Operand::parse(left), operator, Operand::parse(right), negate)
            .map_err(|e| self.error(path, format!("正则表达式无效: {}", e)))?;

        Ok(condition.into())
    }

    fn string_field<'v>(
        &self,
        node: &'v Map<String, Value>,
        field: &str,
        path: &str,
    ) -> Result<&'v str> {
        match node.get(field) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(self.error(path, format!("if 节点的 {} 必须是字符串", field))),
            None => Err(self.error(path, format!("if 节点缺少 {}", field))),
        }
    }

    fn error(&self, path: &str, reason: impl std::fmt::Display) -> RuleError {
        RuleError::invalid(self.calendar, format!("{}: {}", path, reason))
    }
}
