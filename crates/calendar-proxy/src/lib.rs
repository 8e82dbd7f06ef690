//! 日历订阅代理服务
//!
//! 抓取远程 iCalendar 订阅，按声明式规则过滤/改写事件后重新输出，
//! 或将多个订阅合并为一个（私有来源只暴露忙碌时段）。
//!
//! ## 模块结构
//!
//! - `ics`: iCalendar 文档编解码
//! - `fetcher`: 上游日历抓取
//! - `merge`: 合并日历与私有来源脱敏
//! - `loader`: 日历定义文件加载与热更新回调
//! - `handlers` / `routes` / `state`: HTTP 服务
//! - `error`: 错误类型与 HTTP 响应映射

pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod ics;
pub mod loader;
pub mod merge;
pub mod routes;
pub mod state;

pub use error::{ProxyError, Result};
pub use fetcher::{CalendarFetcher, HttpCalendarFetcher};
pub use loader::CalendarLoader;
pub use state::AppState;
