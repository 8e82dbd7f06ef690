//! 路由配置模块

use axum::{Router, http::Method, middleware, routing::get};
use calproxy_shared::observability::middleware as obs_middleware;
use tower_http::cors::{Any, CorsLayer};

use crate::{handlers, state::AppState};

/// 构建完整的应用路由
///
/// 日历路由只有一个路径段，`.ics` 后缀由处理器校验。
pub fn app(state: AppState) -> Router {
    // 网页版日历客户端会跨域订阅
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(handlers::health::index))
        .route("/health", get(handlers::health::health_check))
        .route("/{file}", get(handlers::calendar::serve_calendar))
        .layer(cors)
        // 可观测性中间件：请求追踪和指标收集
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(state)
}
