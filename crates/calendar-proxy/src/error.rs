//! 日历代理错误类型定义

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::ics::CodecError;

/// 日历代理错误类型
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("日历不存在: {0}")]
    NotFound(String),

    #[error("Could not get original ics data. Got response code {status} and body: {body}")]
    UpstreamStatus {
        url: String,
        status: u16,
        body: String,
    },

    #[error("抓取上游日历失败: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("日历文档解析失败: {0}")]
    Codec(#[from] CodecError),

    #[error("日历配置加载失败: {0}")]
    Config(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl ProxyError {
    /// 返回对应的 HTTP 状态码
    ///
    /// 上游与编解码错误统一为 500，和日历客户端看到的行为保持一致。
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamStatus { .. }
            | Self::Fetch(_)
            | Self::Codec(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于日志和指标）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::UpstreamStatus { .. } => "UPSTREAM_STATUS",
            Self::Fetch(_) => "FETCH_ERROR",
            Self::Codec(_) => "CODEC_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            // 未知日历返回 JSON 字符串
            Self::NotFound(name) => {
                tracing::debug!(calendar = %name, "请求的日历不存在");
                (status, Json("Not found.")).into_response()
            }
            Self::UpstreamStatus { url, status: upstream, .. } => {
                tracing::warn!(url = %url, upstream_status = upstream, "上游返回非成功状态");
                (status, self.to_string()).into_response()
            }
            other => {
                tracing::error!(error = %other, code = other.error_code(), "日历请求失败");
                (status, other.to_string()).into_response()
            }
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, ProxyError>;
