//! HTTP 请求处理器

pub mod calendar;
pub mod health;
