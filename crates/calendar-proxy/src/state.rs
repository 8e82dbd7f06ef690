//! 应用状态定义
//!
//! 包含 Axum 路由共享的应用状态

use std::sync::Arc;

use rule_engine::CalendarStore;

use crate::fetcher::CalendarFetcher;

/// Axum 应用共享状态
///
/// 日历存储内部是原子快照，clone 只复制句柄
#[derive(Clone)]
pub struct AppState {
    /// 编译后的日历配置
    pub calendars: CalendarStore,
    /// 上游日历抓取
    pub fetcher: Arc<dyn CalendarFetcher>,
    /// 服务名称，用于健康检查响应
    pub service_name: String,
}

impl AppState {
    pub fn new(
        calendars: CalendarStore,
        fetcher: Arc<dyn CalendarFetcher>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            calendars,
            fetcher,
            service_name: service_name.into(),
        }
    }
}
