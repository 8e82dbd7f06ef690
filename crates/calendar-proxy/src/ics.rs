//! iCalendar 文档编解码
//!
//! 解析交给 `icalendar::parser`（展开折行、参数引号、文本反转义），
//! 再映射成规则引擎的组件树；属性行的顺序和重复项保持不变，
//! 规则流水线依赖"第一条同名属性"的语义。
//! 序列化按原顺序输出，转义文本值并在 75 字节处折行。
//! `icalendar` 的属性写出会把 CATEGORIES 的列表分隔符也转义，所以这一半自己写。

use icalendar::parser;
use rule_engine::{Component, PropertyLine};
use thiserror::Error;

/// 内容行最大字节数（不含 CRLF）
const FOLD_WIDTH: usize = 75;

/// 按逗号拆分为多个值的属性
const LIST_PROPERTIES: &[&str] = &["CATEGORIES", "RESOURCES"];

/// 未知属性的值类型，值按原样保留
const UNKNOWN_TYPE: &str = "unknown";

/// 编解码错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("日历文档缺少 BEGIN:VCALENDAR")]
    MissingCalendar,

    #[error("日历文档格式无效: {0}")]
    Syntax(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// 解析日历文档，返回顶层 VCALENDAR 组件
pub fn parse(text: &str) -> Result<Component> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let unfolded = parser::unfold(text);
    let roots = parser::read_components(&unfolded).map_err(CodecError::Syntax)?;

    let root = roots
        .into_iter()
        .next()
        .ok_or(CodecError::MissingCalendar)?;
    if !root.name.as_str().eq_ignore_ascii_case("VCALENDAR") {
        return Err(CodecError::MissingCalendar);
    }

    Ok(component(root))
}

/// 序列化组件树为 iCalendar 文本（CRLF 换行）
pub fn serialize(component: &Component) -> String {
    let mut out = String::new();
    write_component(component, &mut out);
    out
}

fn write_component(component: &Component, out: &mut String) {
    let name = component.name.to_ascii_uppercase();
    push_folded(out, &format!("BEGIN:{name}"));
    for property in &component.properties {
        push_folded(out, &content_line(property));
    }
    for child in &component.components {
        write_component(child, out);
    }
    push_folded(out, &format!("END:{name}"));
}

// ==================== 解析 ====================

fn component(parsed: parser::Component<'_>) -> Component {
    Component {
        name: parsed.name.as_str().to_ascii_uppercase(),
        properties: parsed.properties.into_iter().map(property_line).collect(),
        components: parsed.components.into_iter().map(component).collect(),
    }
}

/// `Property { name, params, val }` -> 属性行；VALUE 参数转为值类型
fn property_line(property: parser::Property<'_>) -> PropertyLine {
    let mut value_type = None;
    let mut parameters = Vec::with_capacity(property.params.len());

    for param in property.params {
        let key = param.key.as_str().to_ascii_uppercase();
        let value = param
            .val
            .map(|val| val.as_str().to_string())
            .unwrap_or_default();
        if key == "VALUE" {
            value_type = Some(value.to_ascii_lowercase());
        } else {
            parameters.push((key, value));
        }
    }

    // 解析器只对已知的大写文本属性做反转义，类型表与之保持一致
    let name = property.name.as_str();
    let value_type = value_type.unwrap_or_else(|| default_type(name).to_string());

    let raw = property.val.as_str();
    let values = if LIST_PROPERTIES.contains(&name) {
        raw.split(',').map(str::to_string).collect()
    } else {
        vec![raw.to_string()]
    };

    PropertyLine {
        name: name.to_ascii_uppercase(),
        parameters,
        value_type,
        values,
    }
}

/// 属性的默认值类型（未带 VALUE 参数时）
fn default_type(name: &str) -> &'static str {
    match name {
        "CALSCALE" | "METHOD" | "PRODID" | "VERSION" | "CATEGORIES" | "CLASS" | "COMMENT"
        | "DESCRIPTION" | "LOCATION" | "RESOURCES" | "STATUS" | "SUMMARY" | "TRANSP" | "TZID"
        | "TZNAME" | "CONTACT" | "RELATED-TO" | "UID" | "ACTION" | "REQUEST-STATUS" => "text",
        name if name.starts_with("X-") => "text",
        "DTSTART" | "DTEND" | "DTSTAMP" | "DUE" | "CREATED" | "LAST-MODIFIED" | "COMPLETED"
        | "RECURRENCE-ID" | "EXDATE" | "RDATE" => "date-time",
        "RRULE" | "EXRULE" => "recur",
        "DURATION" | "TRIGGER" => "duration",
        "GEO" => "float",
        "PRIORITY" | "SEQUENCE" | "REPEAT" | "PERCENT-COMPLETE" => "integer",
        "URL" | "TZURL" | "ATTACH" => "uri",
        "ATTENDEE" | "ORGANIZER" => "cal-address",
        "TZOFFSETFROM" | "TZOFFSETTO" => "utc-offset",
        "FREEBUSY" => "period",
        _ => UNKNOWN_TYPE,
    }
}

// ==================== 序列化 ====================

fn content_line(property: &PropertyLine) -> String {
    let name = property.name.to_ascii_uppercase();
    let mut line = name.clone();

    for (key, value) in &property.parameters {
        line.push(';');
        line.push_str(key);
        line.push('=');
        // 多值参数在解析时已带引号
        let quoted = value.len() > 1 && value.starts_with('"') && value.ends_with('"');
        if !quoted && value.contains([':', ';', ',']) {
            line.push('"');
            line.push_str(value);
            line.push('"');
        } else {
            line.push_str(value);
        }
    }

    if property.value_type != default_type(&name) && property.value_type != UNKNOWN_TYPE {
        line.push_str(";VALUE=");
        line.push_str(&property.value_type.to_ascii_uppercase());
    }

    line.push(':');
    let text = property.value_type == "text";
    let values: Vec<String> = property
        .values
        .iter()
        .map(|v| if text { escape(v) } else { v.clone() })
        .collect();
    line.push_str(&values.join(","));
    line
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// 折行输出，续行以空格开头，切分点落在 UTF-8 字符边界上
fn push_folded(out: &mut String, line: &str) {
    let mut limit = FOLD_WIDTH;
    let mut rest = line;

    while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        out.push_str(&rest[..cut]);
        out.push_str("\r\n ");
        rest = &rest[cut..];
        limit = FOLD_WIDTH - 1;
    }
    out.push_str(rest);
    out.push_str("\r\n");
}
