//! 规则引擎领域模型
//!
//! 事件记录是有序的属性行列表，日历文档是组件树。
//! 编译后的日历配置在加载后只读，可以在请求之间共享。

use crate::filter::Predicate;
use crate::operation::Operation;

/// 属性行：`(name, parameters, valueType, value, ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyLine {
    pub name: String,
    pub parameters: Vec<(String, String)>,
    pub value_type: String,
    pub values: Vec<String>,
}

impl PropertyLine {
    pub fn new(
        name: impl Into<String>,
        value_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            value_type: value_type.into(),
            values: vec![value.into()],
        }
    }

    /// 第一个值；没有值的属性行视为不可解析
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// 设置第一个值，没有值时追加
    pub fn set_value(&mut self, value: impl Into<String>) {
        match self.values.first_mut() {
            Some(first) => *first = value.into(),
            None => self.values.push(value.into()),
        }
    }

    /// 属性名比较（iCalendar 属性名大小写不敏感）
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// 获取参数值
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// 事件记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventRecord {
    lines: Vec<PropertyLine>,
}

impl EventRecord {
    pub fn new(lines: Vec<PropertyLine>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[PropertyLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<PropertyLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 第一条同名属性行
    pub fn find(&self, name: &str) -> Option<&PropertyLine> {
        self.lines.iter().find(|line| line.is_named(name))
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut PropertyLine> {
        self.lines.iter_mut().find(|line| line.is_named(name))
    }

    /// 第一条同名且有值的属性行
    pub fn line_of(&self, name: &str) -> Option<&PropertyLine> {
        self.lines
            .iter()
            .find(|line| line.is_named(name) && line.value().is_some())
    }

    /// 第一条同名且有值的属性行的值
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.line_of(name).and_then(PropertyLine::value)
    }
}

impl From<Vec<PropertyLine>> for EventRecord {
    fn from(lines: Vec<PropertyLine>) -> Self {
        Self::new(lines)
    }
}

/// 日历文档中的组件（VEVENT、VTIMEZONE、VALARM 等）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub properties: Vec<PropertyLine>,
    pub components: Vec<Component>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            components: Vec::new(),
        }
    }

    /// 由事件记录构造 VEVENT
    pub fn event(record: EventRecord) -> Self {
        Self {
            name: "VEVENT".to_string(),
            properties: record.into_lines(),
            components: Vec::new(),
        }
    }

    pub fn is_event(&self) -> bool {
        self.name.eq_ignore_ascii_case("vevent")
    }
}

/// 合并日历的来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    pub url: String,
    pub private: bool,
}

/// 编译后的规则：过滤谓词 + 有序操作链
#[derive(Clone)]
pub struct Rule {
    pub filter: Predicate,
    pub operations: Vec<Operation>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

/// 编译后的日历配置
#[derive(Debug, Clone)]
pub enum CompiledCalendar {
    Filtered {
        name: String,
        url: String,
        rules: Vec<Rule>,
    },
    Merged {
        name: String,
        urls: Vec<MergeSource>,
    },
}

impl CompiledCalendar {
    pub fn name(&self) -> &str {
        match self {
            Self::Filtered { name, .. } | Self::Merged { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Filtered { .. } => "filtered",
            Self::Merged { .. } => "merged",
        }
    }

    /// 规则数量（合并日历为 0）
    pub fn rule_count(&self) -> usize {
        match self {
            Self::Filtered { rules, .. } => rules.len(),
            Self::Merged { .. } => 0,
        }
    }
}
