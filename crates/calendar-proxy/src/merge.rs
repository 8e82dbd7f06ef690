//! 合并日历
//!
//! 按配置顺序抓取各来源，第一个文档提供日历头部属性；
//! 公开来源贡献全部组件，私有来源只贡献脱敏后的 VEVENT。

use rule_engine::{Component, MergeSource, PropertyLine};
use tracing::{debug, instrument};

use crate::error::{ProxyError, Result};
use crate::fetcher::CalendarFetcher;
use crate::ics;

/// 私有来源事件保留的排期属性
const SCHEDULING_PROPERTIES: &[&str] = &[
    "UID",
    "DTSTART",
    "DTEND",
    "DURATION",
    "DTSTAMP",
    "RRULE",
    "RDATE",
    "EXDATE",
    "RECURRENCE-ID",
    "SEQUENCE",
    "STATUS",
    "TRANSP",
];

/// 私有事件的替代标题
const BUSY_SUMMARY: &str = "Busy";

/// 抓取并合并多个日历，任一来源失败即整体失败
#[instrument(skip(fetcher, sources), fields(sources = sources.len()))]
pub async fn merge(fetcher: &dyn CalendarFetcher, sources: &[MergeSource]) -> Result<Component> {
    let mut merged: Option<Component> = None;
    let mut components = Vec::new();

    for source in sources {
        let text = fetcher.fetch(&source.url).await?;
        let mut calendar = ics::parse(&text)?;
        let entries = std::mem::take(&mut calendar.components);

        if source.private {
            components.extend(entries.into_iter().filter(Component::is_event).map(redact));
        } else {
            components.extend(entries);
        }

        debug!(url = %source.url, private = source.private, "合并来源已加载");
        merged.get_or_insert(calendar);
    }

    let mut calendar =
        merged.ok_or_else(|| ProxyError::Internal("合并日历没有任何来源".to_string()))?;
    calendar.components = components;
    Ok(calendar)
}

/// 脱敏：只保留排期属性，标题替换为 Busy，移除提醒等子组件
pub fn redact(event: Component) -> Component {
    let mut properties: Vec<PropertyLine> = event
        .properties
        .into_iter()
        .filter(|line| SCHEDULING_PROPERTIES.iter().any(|name| line.is_named(name)))
        .collect();
    properties.push(PropertyLine::new("SUMMARY", "text", BUSY_SUMMARY));

    Component {
        name: event.name,
        properties,
        components: Vec::new(),
    }
}
