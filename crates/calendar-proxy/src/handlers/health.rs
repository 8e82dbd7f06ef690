//! 根路径与存活探针

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::state::AppState;

/// 根路径不提供任何内容
pub async fn index() -> &'static str {
    "Hello, you should not be here :)"
}

/// 存活探针：返回服务名称和当前加载的日历数量
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.calendars.snapshot();

    Json(json!({
        "status": "ok",
        "service": state.service_name,
        "calendars": snapshot.len(),
        "version": snapshot.version()
    }))
}
