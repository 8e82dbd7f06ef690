//! 日历定义文件加载
//!
//! 读取 `calendars.path` 指向的 JSON 文件并交给 `CalendarStore` 重新编译。
//! 文件不可读或不是合法 JSON 时保留当前快照。

use std::path::{Path, PathBuf};

use calproxy_shared::config_watcher::ReloadHandler;
use calproxy_shared::observability::metrics;
use rule_engine::{CalendarStore, ReloadReport};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{ProxyError, Result};

/// 日历定义加载器
pub struct CalendarLoader {
    path: PathBuf,
    store: CalendarStore,
}

impl CalendarLoader {
    pub fn new(path: impl AsRef<Path>, store: CalendarStore) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            store,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取文件并重新加载所有日历
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<ReloadReport> {
        let result = self.read_document().and_then(|document| {
            self.store
                .reload(&document)
                .map_err(|e| ProxyError::Config(e.to_string()))
        });

        match &result {
            Ok(report) if report.is_clean() => {
                metrics::record_config_reload("ok");
                info!(
                    calendars = self.store.len(),
                    loaded = report.loaded.len(),
                    removed = report.removed.len(),
                    "日历定义已加载"
                );
            }
            Ok(report) => {
                metrics::record_config_reload("partial");
                warn!(
                    calendars = self.store.len(),
                    failed = report.failed.len(),
                    retained = ?report.retained,
                    "部分日历定义无效"
                );
            }
            Err(e) => {
                metrics::record_config_reload("error");
                warn!(error = %e, "日历定义加载失败，保留当前配置");
            }
        }

        result
    }

    fn read_document(&self) -> Result<Value> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ProxyError::Config(format!("读取 {} 失败: {}", self.path.display(), e))
        })?;

        serde_json::from_str(&text).map_err(|e| {
            ProxyError::Config(format!("解析 {} 失败: {}", self.path.display(), e))
        })
    }
}

impl ReloadHandler for CalendarLoader {
    fn reload(&self) -> anyhow::Result<()> {
        self.load()?;
        Ok(())
    }
}
