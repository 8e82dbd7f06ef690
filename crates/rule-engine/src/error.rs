//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// 日历名称不符合 `[A-Za-z0-9_-]+`
    #[error("日历名称无效: {0}")]
    InvalidCalendarName(String),

    /// 日历配置结构、类型或取值无效
    #[error("日历配置无效: {calendar} ({reason})")]
    InvalidCalendar { calendar: String, reason: String },

    /// 日历配置文档本身无法使用（非 JSON 对象等）
    #[error("配置文档无效: {0}")]
    InvalidDocument(String),
}

impl RuleError {
    /// 构造指定日历的校验错误
    pub fn invalid(calendar: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCalendar {
            calendar: calendar.to_string(),
            reason: reason.into(),
        }
    }

    /// 出错的日历名称（文档级错误没有名称）
    pub fn calendar(&self) -> Option<&str> {
        match self {
            Self::InvalidCalendarName(name) => Some(name),
            Self::InvalidCalendar { calendar, .. } => Some(calendar),
            Self::InvalidDocument(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_names_calendar() {
        let err = RuleError::invalid("work", "缺少 url");
        assert_eq!(err.calendar(), Some("work"));
        assert_eq!(err.to_string(), "日历配置无效: work (缺少 url)");
    }

    #[test]
    fn test_document_error_has_no_calendar() {
        let err = RuleError::InvalidDocument("根节点必须是对象".to_string());
        assert!(err.calendar().is_none());
    }
}
