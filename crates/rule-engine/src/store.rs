//! 编译后日历的存储
//!
//! 使用 `ArcSwap` 持有不可变快照，读取仅一次原子 load；
//! 重新加载时构建完整的新映射，再一次性原子替换。

use crate::compiler;
use crate::error::{Result, RuleError};
use crate::models::CompiledCalendar;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// 不可变的日历快照
#[derive(Debug, Default)]
pub struct CalendarSet {
    calendars: HashMap<String, Arc<CompiledCalendar>>,
    version: u64,
}

impl CalendarSet {
    pub fn get(&self, name: &str) -> Option<Arc<CompiledCalendar>> {
        self.calendars.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.calendars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.calendars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendars.is_empty()
    }

    /// 所有日历名称（排序后）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.calendars.keys().cloned().collect();
        names.sort();
        names
    }

    /// 快照版本号，每次重新加载递增
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// 一次重新加载的结果
#[derive(Debug, Default)]
pub struct ReloadReport {
    /// 编译成功并已生效的日历
    pub loaded: Vec<String>,
    /// 编译失败的日历及原因
    pub failed: Vec<(String, RuleError)>,
    /// 编译失败但沿用旧版本的日历
    pub retained: Vec<String>,
    /// 已从配置中移除的日历
    pub removed: Vec<String>,
}

impl ReloadReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 日历存储
#[derive(Clone)]
pub struct CalendarStore {
    current: Arc<ArcSwap<CalendarSet>>,
    tx: watch::Sender<u64>,
    rx: watch::Receiver<u64>,
}

impl CalendarStore {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self {
            current: Arc::new(ArcSwap::from_pointee(CalendarSet::default())),
            tx,
            rx,
        }
    }

    /// 当前快照（无锁）
    pub fn snapshot(&self) -> Arc<CalendarSet> {
        self.current.load_full()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledCalendar>> {
        self.current.load().get(name)
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    /// 订阅快照版本变更
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }

    /// 从配置文档重新加载
    ///
    /// 文档必须是 `{日历名称: 配置}` 对象，否则保留当前快照并返回错误。
    /// 每个日历独立编译：失败的日历沿用旧版本（如果有），不影响其他日历。
    #[instrument(skip(self, document))]
    pub fn reload(&self, document: &Value) -> Result<ReloadReport> {
        let entries = document.as_object().ok_or_else(|| {
            RuleError::InvalidDocument("日历配置必须是以日历名称为键的对象".to_string())
        })?;

        let previous = self.snapshot();
        let mut report = ReloadReport::default();
        let mut calendars = HashMap::with_capacity(entries.len());

        for (name, config) in entries {
            match compiler::compile(name, config) {
                Ok(calendar) => {
                    info!(
                        calendar = %name,
                        kind = calendar.kind(),
                        rules = calendar.rule_count(),
                        "日历已加载"
                    );
                    calendars.insert(name.clone(), Arc::new(calendar));
                    report.loaded.push(name.clone());
                }
                Err(e) => {
                    error!(calendar = %name, error = %e, "日历配置无效");
                    if let Some(old) = previous.get(name) {
                        warn!(calendar = %name, "沿用上一次成功编译的版本");
                        calendars.insert(name.clone(), old);
                        report.retained.push(name.clone());
                    }
                    report.failed.push((name.clone(), e));
                }
            }
        }

        report.removed = previous
            .names()
            .into_iter()
            .filter(|name| !entries.contains_key(name))
            .collect();

        let version = previous.version + 1;
        self.current.store(Arc::new(CalendarSet { calendars, version }));
        // send 失败说明没有 receiver，属于正常情况
        let _ = self.tx.send(version);

        info!(
            version,
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "日历配置重新加载完成"
        );

        Ok(report)
    }
}

impl Default for CalendarStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filtered(url: &str) -> Value {
        json!({"type": "filtered", "url": url, "rules": []})
    }

    #[test]
    fn test_reload_and_get() {
        let store = CalendarStore::new();
        assert!(store.is_empty());

        let report = store
            .reload(&json!({
                "work": filtered("https://example.com/work.ics"),
                "home": {"type": "merged", "urls": [{"url": "https://example.com/a.ics", "private": true}]}
            }))
            .unwrap();

        assert!(report.is_clean());
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("work").unwrap().kind(), "filtered");
        assert_eq!(store.get("home").unwrap().kind(), "merged");
        assert!(store.get("missing").is_none());
        assert_eq!(store.snapshot().names(), vec!["home", "work"]);
    }

    #[test]
    fn test_broken_calendar_is_isolated() {
        let store = CalendarStore::new();
        let report = store
            .reload(&json!({
                "good": filtered("https://example.com/good.ics"),
                "bad": {"type": "filtered"}
            }))
            .unwrap();

        assert_eq!(report.loaded, vec!["good".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "bad");
        assert!(store.get("good").is_some());
        assert!(store.get("bad").is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_version() {
        let store = CalendarStore::new();
        store
            .reload(&json!({"work": filtered("https://example.com/v1.ics")}))
            .unwrap();

        let report = store
            .reload(&json!({"work": {"type": "filtered", "url": "not a url"}}))
            .unwrap();

        assert_eq!(report.retained, vec!["work".to_string()]);
        match &*store.get("work").unwrap() {
            CompiledCalendar::Filtered { url, .. } => assert_eq!(url, "https://example.com/v1.ics"),
            CompiledCalendar::Merged { .. } => panic!("应为过滤日历"),
        }
    }

    #[test]
    fn test_invalid_document_keeps_snapshot() {
        let store = CalendarStore::new();
        store
            .reload(&json!({"work": filtered("https://example.com/work.ics")}))
            .unwrap();
        let before = store.snapshot();

        assert!(store.reload(&json!(["work"])).is_err());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[test]
    fn test_removed_calendars_are_dropped() {
        let store = CalendarStore::new();
        store
            .reload(&json!({
                "a": filtered("https://example.com/a.ics"),
                "b": filtered("https://example.com/b.ics")
            }))
            .unwrap();

        let report = store
            .reload(&json!({"a": filtered("https://example.com/a.ics")}))
            .unwrap();

        assert_eq!(report.removed, vec!["b".to_string()]);
        assert!(store.get("b").is_none());
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let store = CalendarStore::new();
        store
            .reload(&json!({"a": filtered("https://example.com/a.ics")}))
            .unwrap();

        let held = store.snapshot();
        store.reload(&json!({})).unwrap();

        assert!(held.contains("a"));
        assert!(store.is_empty());
        assert_eq!(store.snapshot().version(), held.version() + 1);
    }

    #[test]
    fn test_subscribe_sees_new_version() {
        let store = CalendarStore::new();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);

        store.reload(&json!({})).unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);
    }
}
