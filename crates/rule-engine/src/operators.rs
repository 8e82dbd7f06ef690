//! 规则操作符定义
//!
//! 条件操作符、过滤节点类型和事件操作类型都是封闭枚举，
//! 配置中的字符串只在编译阶段解析一次。

use std::fmt;

/// 条件操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // 宽松比较（数字字符串按数值比较）
    Eq,
    Neq,

    // 严格比较
    StrictEq,
    StrictNeq,

    // 顺序比较
    Gt,
    Gte,
    Lt,
    Lte,

    // 字符串操作
    Contains,
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Self::Eq,
        Self::Neq,
        Self::StrictEq,
        Self::StrictNeq,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Contains,
        Self::Regex,
    ];

    /// 解析配置中的操作符（大小写不敏感）
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.to_lowercase();
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// 配置中的书写形式
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::StrictEq => "===",
            Self::StrictNeq => "!==",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::Regex => "regex",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 过滤表达式节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    And,
    Or,
    If,
}

impl FilterKind {
    pub fn parse(key: &str) -> Option<Self> {
        match key {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "if" => Some(Self::If),
            _ => None,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::If => write!(f, "if"),
        }
    }
}

/// 事件操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Remove,
    Edit,
    EditRegex,
}

impl OperationKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "remove" => Some(Self::Remove),
            "edit" => Some(Self::Edit),
            "editRegex" => Some(Self::EditRegex),
            _ => None,
        }
    }

    /// 操作数组的长度（包含操作名本身）
    pub fn arity(&self) -> usize {
        match self {
            Self::Remove => 1,
            Self::Edit => 3,
            Self::EditRegex => 4,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Remove => "remove",
            Self::Edit => "edit",
            Self::EditRegex => "editRegex",
        };
        write!(f, "{}", s)
    }
}
