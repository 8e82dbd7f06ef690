//! 规则流水线执行器
//!
//! 逐个事件按配置顺序执行规则：
//! - 谓词针对事件的当前状态求值，为 false 时继续下一条规则
//! - 谓词为 true 时依次执行该规则的操作，后续规则看到的是修改后的事件
//! - 任一操作返回删除信号时立即丢弃该事件，不再执行剩余规则
//!
//! 未被删除的事件在原位置输出且只输出一次，非事件组件原样保留。

use crate::models::{Component, EventRecord, Rule};
use tracing::trace;

/// 一次执行的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 处理的事件数
    pub events: usize,
    /// 被删除的事件数
    pub removed: usize,
    /// 谓词为 true 的 (事件, 规则) 次数
    pub rules_matched: usize,
}

/// 对日历组件列表应用规则集
pub fn apply_rules(rules: &[Rule], entries: Vec<Component>) -> Vec<Component> {
    RulePipeline::new(rules).run(entries).0
}

/// 规则流水线
pub struct RulePipeline<'a> {
    rules: &'a [Rule],
}

impl<'a> RulePipeline<'a> {
    pub fn new(rules: &'a [Rule]) -> Self {
        Self { rules }
    }

    /// 执行并返回统计信息
    pub fn run(&self, entries: Vec<Component>) -> (Vec<Component>, PipelineStats) {
        let mut stats = PipelineStats::default();
        let mut output = Vec::with_capacity(entries.len());

        for mut entry in entries {
            if !entry.is_event() {
                output.push(entry);
                continue;
            }

            stats.events += 1;
            let record = EventRecord::from(std::mem::take(&mut entry.properties));

            match self.transform(record, &mut stats) {
                Some(record) => {
                    entry.properties = record.into_lines();
                    output.push(entry);
                }
                None => stats.removed += 1,
            }
        }

        (output, stats)
    }

    /// 对单个事件执行全部规则，None 表示删除
    fn transform(&self, record: EventRecord, stats: &mut PipelineStats) -> Option<EventRecord> {
        let mut record = record;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.filter.evaluate(&record) {
                continue;
            }

            stats.rules_matched += 1;
            trace!(rule = index, "规则匹配，执行操作");

            for operation in &rule.operations {
                record = operation.apply(record)?;
            }
        }

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Predicate;
    use crate::models::PropertyLine;
    use crate::operation::{Operation, Replacement};
    use regex::Regex;

    fn event(summary: &str) -> Component {
        Component::event(EventRecord::new(vec![
            PropertyLine::new("UID", "text", format!("{}@test", summary)),
            PropertyLine::new("SUMMARY", "text", summary),
        ]))
    }

    fn summary_is(expected: &'static str) -> Predicate {
        Predicate::from_fn(move |record| record.value_of("SUMMARY") == Some(expected))
    }

    fn summary(component: &Component) -> Option<&str> {
        component
            .properties
            .iter()
            .find(|line| line.is_named("SUMMARY"))
            .and_then(PropertyLine::value)
    }

    #[test]
    fn test_non_events_pass_through() {
        let timezone = Component::new("VTIMEZONE");
        let rules = vec![Rule {
            filter: Predicate::always(),
            operations: vec![Operation::Remove],
        }];

        let output = apply_rules(&rules, vec![timezone.clone(), event("a")]);
        assert_eq!(output, vec![timezone]);
    }

    #[test]
    fn test_no_rules_keeps_events() {
        let entries = vec![event("a"), event("b")];
        assert_eq!(apply_rules(&[], entries.clone()), entries);
    }

    #[test]
    fn test_rules_see_mutated_record() {
        let rules = vec![
            Rule {
                filter: summary_is("Standup"),
                operations: vec![Operation::Edit {
                    key: "SUMMARY".to_string(),
                    value: "Daily".to_string(),
                }],
            },
            Rule {
                filter: summary_is("Daily"),
                operations: vec![{
                    let pattern = Regex::new("$").unwrap();
                    Operation::EditRegex {
                        key: "SUMMARY".to_string(),
                        replacement: Replacement::parse(" (team)", &pattern),
                        pattern,
                    }
                }],
            },
        ];

        let output = apply_rules(&rules, vec![event("Standup"), event("Lunch")]);
        assert_eq!(output.len(), 2);
        assert_eq!(summary(&output[0]), Some("Daily (team)"));
        assert_eq!(summary(&output[1]), Some("Lunch"));
    }

    #[test]
    fn test_removal_stops_chain_and_later_rules() {
        let rules = vec![
            Rule {
                filter: summary_is("Lunch"),
                operations: vec![
                    Operation::Remove,
                    Operation::Edit {
                        key: "SUMMARY".to_string(),
                        value: "never".to_string(),
                    },
                ],
            },
            Rule {
                filter: Predicate::from_fn(|_| panic!("已删除的事件不应继续求值")),
                operations: vec![],
            },
        ];

        let (output, stats) = RulePipeline::new(&rules[..1]).run(vec![event("Lunch"), event("Work")]);
        assert_eq!(output.len(), 1);
        assert_eq!(summary(&output[0]), Some("Work"));
        assert_eq!(stats.events, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.rules_matched, 1);

        let output = apply_rules(&rules, vec![event("Lunch")]);
        assert!(output.is_empty());
    }

    #[test]
    fn test_order_preserved() {
        let entries = vec![event("a"), Component::new("VTODO"), event("b"), event("c")];
        let rules = vec![Rule {
            filter: summary_is("b"),
            operations: vec![Operation::Remove],
        }];

        let output = apply_rules(&rules, entries);
        let names: Vec<_> = output
            .iter()
            .map(|c| summary(c).unwrap_or(c.name.as_str()).to_string())
            .collect();
        assert_eq!(names, vec!["a", "VTODO", "c"]);
    }
}
