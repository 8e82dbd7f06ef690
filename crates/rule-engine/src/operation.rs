//! 事件操作编译器
//!
//! 操作配置形如 `[name, ...args]`，数组长度必须与操作类型的元数一致。
//! 编译结果获取事件记录的所有权并返回新记录，`None` 表示删除该事件。
//!
//! editRegex 的替换串沿用 `String.prototype.replace` 的写法：
//! `$1`..`$99`、`$<name>`、`` $& ``、`` $` ``、`$'`、`$$`，其余 `$` 按字面输出。

use crate::error::{Result, RuleError};
use crate::models::EventRecord;
use crate::operators::OperationKind;
use regex::{Captures, Regex};
use serde_json::Value;

/// 替换模板片段
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
    Matched,
    Before,
    After,
}

/// 编译后的替换模板
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pieces: Vec<Piece>,
}

impl Replacement {
    /// 解析替换串；分组引用只在对应分组存在时生效
    pub fn parse(template: &str, pattern: &Regex) -> Self {
        let groups = pattern.captures_len() - 1;
        let has_names = pattern.capture_names().flatten().next().is_some();

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(pos) = rest.find('$') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            let consumed = if after.starts_with('$') {
                literal.push('$');
                1
            } else if let Some((piece, consumed)) = Self::reference(after, groups, has_names) {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(piece);
                consumed
            } else {
                literal.push('$');
                0
            };

            rest = &after[consumed..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Self { pieces }
    }

    /// `$` 之后的引用及其长度
    fn reference(after: &str, groups: usize, has_names: bool) -> Option<(Piece, usize)> {
        let bytes = after.as_bytes();

        match *bytes.first()? {
            b'&' => Some((Piece::Matched, 1)),
            b'`' => Some((Piece::Before, 1)),
            b'\'' => Some((Piece::After, 1)),
            b'<' if has_names => {
                let end = after.find('>')?;
                Some((Piece::Named(after[1..end].to_string()), end + 1))
            }
            digit @ b'0'..=b'9' => {
                let first = usize::from(digit - b'0');
                if let Some(&second @ b'0'..=b'9') = bytes.get(1) {
                    let two = first * 10 + usize::from(second - b'0');
                    if (1..=groups).contains(&two) {
                        return Some((Piece::Group(two), 2));
                    }
                }
                (1..=groups)
                    .contains(&first)
                    .then_some((Piece::Group(first), 1))
            }
            _ => None,
        }
    }

    /// 替换第一处匹配，没有匹配时原样返回
    pub fn replace_first(&self, pattern: &Regex, haystack: &str) -> String {
        let Some(captures) = pattern.captures(haystack) else {
            return haystack.to_string();
        };
        let Some(whole) = captures.get(0) else {
            return haystack.to_string();
        };

        let mut out = String::with_capacity(haystack.len());
        out.push_str(&haystack[..whole.start()]);
        self.expand(&captures, haystack, &mut out);
        out.push_str(&haystack[whole.end()..]);
        out
    }

    fn expand(&self, captures: &Captures<'_>, haystack: &str, out: &mut String) {
        let Some(whole) = captures.get(0) else {
            return;
        };

        for piece in &self.pieces {
            // 未参与匹配的分组替换为空串
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Group(index) => out.push_str(captures.get(*index).map_or("", |m| m.as_str())),
                Piece::Named(name) => out.push_str(captures.name(name).map_or("", |m| m.as_str())),
                Piece::Matched => out.push_str(whole.as_str()),
                Piece::Before => out.push_str(&haystack[..whole.start()]),
                Piece::After => out.push_str(&haystack[whole.end()..]),
            }
        }
    }
}

/// 编译后的事件操作
#[derive(Debug, Clone)]
pub enum Operation {
    Remove,
    Edit {
        key: String,
        value: String,
    },
    EditRegex {
        key: String,
        pattern: Regex,
        replacement: Replacement,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Remove => OperationKind::Remove,
            Self::Edit { .. } => OperationKind::Edit,
            Self::EditRegex { .. } => OperationKind::EditRegex,
        }
    }

    /// 应用到事件记录，返回 None 表示删除
    pub fn apply(&self, record: EventRecord) -> Option<EventRecord> {
        match self {
            Self::Remove => None,
            Self::Edit { key, value } => {
                let mut record = record;
                if let Some(line) = record.find_mut(key) {
                    line.set_value(value.as_str());
                }
                Some(record)
            }
            Self::EditRegex {
                key,
                pattern,
                replacement,
            } => {
                let mut record = record;
                if let Some(current) = record
                    .find_mut(key)
                    .and_then(|line| line.values.first_mut())
                {
                    *current = replacement.replace_first(pattern, current);
                }
                Some(record)
            }
        }
    }
}

/// 事件操作编译器
pub struct OperationCompiler<'a> {
    calendar: &'a str,
}

impl<'a> OperationCompiler<'a> {
    pub fn new(calendar: &'a str) -> Self {
        Self { calendar }
    }

    /// 编译操作列表
    pub fn compile_all(&self, operations: &Value, path: &str) -> Result<Vec<Operation>> {
        let operations = operations
            .as_array()
            .ok_or_else(|| self.error(path, "operations 必须是数组".to_string()))?;

        operations
            .iter()
            .enumerate()
            .map(|(i, operation)| self.compile(operation, &format!("{}[{}]", path, i)))
            .collect()
    }

    /// 编译单个操作
    pub fn compile(&self, operation: &Value, path: &str) -> Result<Operation> {
        let parts = operation
            .as_array()
            .ok_or_else(|| self.error(path, format!("操作必须是数组: {}", operation)))?;

        let kind = parts
            .first()
            .and_then(Value::as_str)
            .and_then(OperationKind::parse)
            .ok_or_else(|| self.error(path, format!("无效的操作: {}", operation)))?;

        if parts.len() != kind.arity() {
            return Err(self.error(
                path,
                format!(
                    "{} 操作需要 {} 个元素，实际为 {}: {}",
                    kind,
                    kind.arity(),
                    parts.len(),
                    operation
                ),
            ));
        }

        let args = parts[1..]
            .iter()
            .map(|arg| {
                arg.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| self.error(path, format!("操作参数必须是字符串: {}", arg)))
            })
            .collect::<Result<Vec<String>>>()?;

        match kind {
            OperationKind::Remove => Ok(Operation::Remove),
            OperationKind::Edit => {
                let [key, value] = <[String; 2]>::try_from(args)
                    .map_err(|_| self.error(path, "edit 参数个数错误".to_string()))?;
                Ok(Operation::Edit { key, value })
            }
            OperationKind::EditRegex => {
                let [key, pattern, replacement] = <[String; 3]>::try_from(args)
                    .map_err(|_| self.error(path, "editRegex 参数个数错误".to_string()))?;
                let pattern = Regex::new(&pattern)
                    .map_err(|e| self.error(path, format!("正则表达式无效: {}", e)))?;
                let replacement = Replacement::parse(&replacement, &pattern);
                Ok(Operation::EditRegex {
                    key,
                    pattern,
                    replacement,
                })
            }
        }
    }

    fn error(&self, path: &str, reason: String) -> RuleError {
        RuleError::invalid(self.calendar, format!("{}: {}", path, reason))
    }
}
