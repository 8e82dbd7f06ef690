//! 日历订阅代理服务
//!
//! 加载日历定义，监听定义文件变更，对外提供 `/{name}.ics` 订阅。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use calendar_proxy::{AppState, CalendarLoader, HttpCalendarFetcher, routes};
use calproxy_shared::{
    config::AppConfig,
    config_watcher::{ConfigWatcher, FileConfigWatcher},
    observability,
};
use rule_engine::CalendarStore;
use tokio::net::TcpListener;
use tracing::{info, warn};

const SERVICE_NAME: &str = "calendar-proxy";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME).context("加载服务配置失败")?;
    let _guard = observability::init(&config.observability, &config.service_name).await?;

    info!("Starting {} on {}", config.service_name, config.server_addr());

    // 启动时日历定义必须可读，之后的重载失败只保留旧配置
    let store = CalendarStore::new();
    let loader = Arc::new(CalendarLoader::new(&config.calendars.path, store.clone()));
    loader
        .load()
        .with_context(|| format!("加载日历定义失败: {}", config.calendars.path))?;

    let watcher = if config.calendars.watch {
        let watcher = FileConfigWatcher::new(
            loader.path(),
            Duration::from_millis(config.calendars.debounce_ms),
            loader.clone(),
        );
        watcher.start().await?;
        Some(watcher)
    } else {
        None
    };

    let fetcher = HttpCalendarFetcher::new(&config.fetch).context("创建 HTTP 客户端失败")?;
    let state = AppState::new(store, Arc::new(fetcher), config.service_name.clone());
    let app = routes::app(state);

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Calendar server listening on {}", config.server_addr());

    // 优雅关闭：收到 SIGTERM 或 Ctrl+C 时停止接收新连接并等待已有请求处理完毕
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(watcher) = watcher {
        watcher.stop().await?;
    }

    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 容器平台通过 SIGTERM 通知停止；本地开发通过 Ctrl+C。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
