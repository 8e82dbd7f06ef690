//! 日历订阅处理器
//!
//! `GET /{name}.ics`：过滤日历先抓取上游、执行规则流水线再输出；
//! 合并日历抓取全部来源后拼接输出。

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use calproxy_shared::observability::metrics;
use rule_engine::{CompiledCalendar, Component, Rule, RulePipeline};
use tracing::{info, instrument};

use crate::error::{ProxyError, Result};
use crate::fetcher::CalendarFetcher;
use crate::state::AppState;
use crate::{ics, merge};

const CALENDAR_CONTENT_TYPE: &str = "text/calendar";
const CALENDAR_SUFFIX: &str = ".ics";

/// 输出日历
#[instrument(skip(state))]
pub async fn serve_calendar(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response> {
    let name = file
        .strip_suffix(CALENDAR_SUFFIX)
        .ok_or_else(|| ProxyError::NotFound(file.clone()))?;

    // 请求开始时的快照，处理过程中的重新加载不影响本次请求
    let calendar = state
        .calendars
        .get(name)
        .ok_or_else(|| ProxyError::NotFound(name.to_string()))?;

    let result = render(state.fetcher.as_ref(), &calendar).await;
    metrics::record_calendar_request(
        calendar.kind(),
        if result.is_ok() { "ok" } else { "error" },
    );

    let body = result?;
    Ok(([(header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE)], body).into_response())
}

async fn render(fetcher: &dyn CalendarFetcher, calendar: &CompiledCalendar) -> Result<String> {
    let document = match calendar {
        CompiledCalendar::Filtered { name, url, rules } => {
            let text = fetcher.fetch(url).await?;
            let mut document = ics::parse(&text)?;
            transform(name, rules, &mut document);
            document
        }
        CompiledCalendar::Merged { urls, .. } => merge::merge(fetcher, urls).await?,
    };

    Ok(ics::serialize(&document))
}

/// 对顶层组件执行规则流水线，非事件组件原样保留
fn transform(name: &str, rules: &[Rule], document: &mut Component) {
    let entries = std::mem::take(&mut document.components);
    let (entries, stats) = RulePipeline::new(rules).run(entries);
    document.components = entries;

    metrics::record_pipeline(stats.events, stats.removed);
    info!(
        calendar = %name,
        events = stats.events,
        removed = stats.removed,
        rules_matched = stats.rules_matched,
        "日历规则已应用"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::MockCalendarFetcher;
    use rule_engine::compile;
    use serde_json::json;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:1\r\n\
SUMMARY:Standup\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:2\r\n\
SUMMARY:Room 12 review\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[tokio::test]
    async fn test_render_filtered_calendar() {
        let calendar = compile(
            "team",
            &json!({
                "type": "filtered",
                "url": "https://calendar.example.com/team.ics",
                "rules": [
                    {
                        "filter": {"key": "if", "left": "event.SUMMARY", "operator": "==", "right": "Standup"},
                        "operations": [["remove"]]
                    },
                    {
                        "filter": {"key": "if", "left": "event.SUMMARY", "operator": "contains", "right": "Room"},
                        "operations": [["editRegex", "SUMMARY", "Room \\d+", "Room X"]]
                    }
                ]
            }),
        )
        .unwrap();

        let mut fetcher = MockCalendarFetcher::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(FEED.to_string()));

        let body = render(&fetcher, &calendar).await.unwrap();

        assert!(!body.contains("Standup"));
        assert!(body.contains("SUMMARY:Room X review\r\n"));
        assert!(body.contains("UID:2\r\n"));
    }

    #[tokio::test]
    async fn test_render_stops_on_invalid_document() {
        let calendar = compile(
            "team",
            &json!({"type": "filtered", "url": "https://calendar.example.com/team.ics", "rules": []}),
        )
        .unwrap();

        let mut fetcher = MockCalendarFetcher::new();
        fetcher
            .expect_fetch()
            .returning(|_| Ok("<html>not a calendar</html>".to_string()));

        let err = render(&fetcher, &calendar).await.unwrap_err();
        assert!(matches!(err, ProxyError::Codec(_)));
    }
}
