//! 日历规则引擎
//!
//! 将声明式的 JSON 规则编译成针对事件记录的谓词与变换流水线：
//! - 操作数解析（字面量或 `event.<字段>` 引用）
//! - 条件评估（比较、包含、正则）
//! - 过滤表达式编译（and / or / if，短路求值）
//! - 事件操作编译（remove / edit / editRegex）
//! - 规则流水线执行与编译结果的快照存储

pub mod compiler;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod filter;
pub mod models;
pub mod operand;
pub mod operation;
pub mod operators;
pub mod store;

pub use compiler::{compile, CalendarCompiler};
pub use error::{Result, RuleError};
pub use evaluator::{Condition, ConditionEvaluator};
pub use executor::{apply_rules, PipelineStats, RulePipeline};
pub use filter::{FilterCompiler, Predicate};
pub use models::{CompiledCalendar, Component, EventRecord, MergeSource, PropertyLine, Rule};
pub use operand::{Operand, OperandValue};
pub use operation::{Operation, OperationCompiler, Replacement};
pub use operators::{FilterKind, OperationKind, Operator};
pub use store::{CalendarSet, CalendarStore, ReloadReport};
