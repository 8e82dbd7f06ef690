//! 上游日历抓取

use std::time::Duration;

use async_trait::async_trait;
use calproxy_shared::config::FetchConfig;
use tracing::{debug, instrument};

use crate::error::{ProxyError, Result};

/// 上游日历抓取抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarFetcher: Send + Sync {
    /// 获取日历原始文本；非 2xx 状态和网络错误均为失败
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// 基于 reqwest 的 HTTP 抓取实现
#[derive(Clone)]
pub struct HttpCalendarFetcher {
    client: reqwest::Client,
}

impl HttpCalendarFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl CalendarFetcher for HttpCalendarFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(bytes = body.len(), "上游日历抓取完成");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_config() {
        assert!(HttpCalendarFetcher::new(&FetchConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_error() {
        let fetcher = HttpCalendarFetcher::new(&FetchConfig {
            timeout_seconds: 1,
            ..Default::default()
        })
        .unwrap();

        // 保留端口 9 通常无人监听
        let err = fetcher.fetch("http://127.0.0.1:9/team.ics").await.unwrap_err();
        assert!(matches!(err, ProxyError::Fetch(_)));
    }
}
