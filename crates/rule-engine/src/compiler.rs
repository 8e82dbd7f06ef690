//! 日历规则集编译器
//!
//! 校验单个日历的原始 JSON 配置并编译成可执行的规则集。
//! 过滤日历编译出有序规则列表，合并日历编译出来源列表。

use crate::error::{Result, RuleError};
use crate::filter::FilterCompiler;
use crate::models::{CompiledCalendar, MergeSource, Rule};
use crate::operation::OperationCompiler;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static CALENDAR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("日历名称正则无效"));

static CALENDAR_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?[-a-zA-Z0-9@:%._+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b[-a-zA-Z0-9()@:%_+.~#?&/=]*$",
    )
    .expect("URL 正则无效")
});

/// 编译单个日历配置
pub fn compile(name: &str, config: &Value) -> Result<CompiledCalendar> {
    CalendarCompiler::new(name)?.compile(config)
}

/// 日历规则集编译器
pub struct CalendarCompiler<'a> {
    name: &'a str,
}

impl<'a> CalendarCompiler<'a> {
    /// 校验日历名称后创建编译器
    pub fn new(name: &'a str) -> Result<Self> {
        if !CALENDAR_NAME.is_match(name) {
            return Err(RuleError::InvalidCalendarName(name.to_string()));
        }
        Ok(Self { name })
    }

    /// 编译日历配置
    pub fn compile(&self, config: &Value) -> Result<CompiledCalendar> {
        let config = config
            .as_object()
            .ok_or_else(|| self.error("配置必须是对象"))?;

        let kind = config.get("type").ok_or_else(|| self.error("缺少 type"))?;

        match kind.as_str() {
            Some("filtered") => self.compile_filtered(config),
            Some("merged") => self.compile_merged(config),
            _ => Err(self.error(format!("无效的 type: {}", kind))),
        }
    }

    /// 过滤日历：url + 可选的 rules
    fn compile_filtered(&self, config: &Map<String, Value>) -> Result<CompiledCalendar> {
        let url = config.get("url").ok_or_else(|| self.error("缺少 url"))?;
        let url = url
            .as_str()
            .filter(|url| CALENDAR_URL.is_match(url))
            .ok_or_else(|| self.error(format!("无效的 url: {}", url)))?;

        let rules = match config.get("rules") {
            None => Vec::new(),
            Some(Value::Array(rules)) => rules
                .iter()
                .enumerate()
                .map(|(i, rule)| self.compile_rule(rule, i))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(self.error("rules 必须是数组")),
        };

        Ok(CompiledCalendar::Filtered {
            name: self.name.to_string(),
            url: url.to_string(),
            rules,
        })
    }

    /// 编译单条规则
    fn compile_rule(&self, rule: &Value, index: usize) -> Result<Rule> {
        let path = format!("rules[{}]", index);

        let rule = rule
            .as_object()
            .ok_or_else(|| self.error(format!("{}: 规则必须是对象", path)))?;

        let filter = rule
            .get("filter")
            .ok_or_else(|| self.error(format!("{}: 缺少 filter", path)))?;
        let filter = FilterCompiler::new(self.name).compile(filter, &format!("{}.filter", path))?;

        let operations = rule
            .get("operations")
            .ok_or_else(|| self.error(format!("{}: 缺少 operations", path)))?;
        let operations = OperationCompiler::new(self.name)
            .compile_all(operations, &format!("{}.operations", path))?;

        Ok(Rule { filter, operations })
    }

    /// 合并日历：非空的 {url, private} 列表
    fn compile_merged(&self, config: &Map<String, Value>) -> Result<CompiledCalendar> {
        let urls = config.get("urls").ok_or_else(|| self.error("缺少 urls"))?;
        let urls = urls
            .as_array()
            .ok_or_else(|| self.error("urls 必须是数组"))?;

        if urls.is_empty() {
            return Err(self.error("urls 不能为空"));
        }

        let sources = urls
            .iter()
            .enumerate()
            .map(|(i, source)| self.compile_source(source, i))
            .collect::<Result<Vec<_>>>()?;

        Ok(CompiledCalendar::Merged {
            name: self.name.to_string(),
            urls: sources,
        })
    }

    fn compile_source(&self, source: &Value, index: usize) -> Result<MergeSource> {
        let path = format!("urls[{}]", index);

        let source = source
            .as_object()
            .ok_or_else(|| self.error(format!("{}: 来源必须是对象", path)))?;

        let url = match source.get("url") {
            Some(Value::String(url)) => url.clone(),
            Some(other) => return Err(self.error(format!("{}: 无效的 url: {}", path, other))),
            None => return Err(self.error(format!("{}: 缺少 url", path))),
        };

        let private = match source.get("private") {
            Some(Value::Bool(private)) => *private,
            Some(other) => {
                return Err(self.error(format!("{}: 无效的 private: {}", path, other)));
            }
            None => return Err(self.error(format!("{}: 缺少 private", path))),
        };

        Ok(MergeSource { url, private })
    }

    fn error(&self, reason: impl Into<String>) -> RuleError {
        RuleError::invalid(self.name, reason)
    }
}
