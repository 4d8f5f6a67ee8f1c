use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_USERNAME_LEN: usize = 32;

/// 单个字段的校验错误，作为 400 响应的 resp_data 返回
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// 收集所有字段错误，一次性返回给调用方
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    /// 必填文本：去掉首尾空白后不能为空，返回转义后的值
    pub fn required_text(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => Some(escape_html(v)),
            _ => {
                self.add(field, "is required");
                None
            }
        }
    }

    /// 用户名：去掉首尾空白，只允许字母、数字、下划线、点和连字符
    pub fn username(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let v = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => {
                self.add(field, "is required");
                return None;
            }
        };
        if v.chars().count() > MAX_USERNAME_LEN {
            self.add(field, "must be at most 32 characters");
            return None;
        }
        if !v
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            self.add(field, "may only contain letters, digits, '_', '.' and '-'");
            return None;
        }
        Some(v.to_string())
    }

    /// 可选文本：空白视为未提供
    pub fn optional_text(&mut self, value: Option<&str>) -> Option<String> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(escape_html)
    }

    pub fn required_email(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(v) if !v.is_empty() => {
                if is_valid_email(v) {
                    Some(v.to_lowercase())
                } else {
                    self.add(field, "must be a valid email address");
                    None
                }
            }
            _ => {
                self.add(field, "is required");
                None
            }
        }
    }

    pub fn optional_date(&mut self, field: &str, value: Option<&str>) -> Option<NaiveDate> {
        let v = value.map(str::trim).filter(|v| !v.is_empty())?;
        match parse_iso_date(v) {
            Some(date) => Some(date),
            None => {
                self.add(field, "must be an ISO-8601 date (YYYY-MM-DD)");
                None
            }
        }
    }

    pub fn password(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value {
            Some(v) if v.chars().count() >= MIN_PASSWORD_LEN => Some(v.to_string()),
            Some(_) => {
                self.add(field, "must be at least 6 characters");
                None
            }
            None => {
                self.add(field, "is required");
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), crate::error::AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(crate::error::AppError::Validation(self.errors))
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
                .expect("email regex is valid");
    }
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// 转义 HTML 特殊字符，防止存储型标记注入
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// escape_html 的逆操作，`&amp;` 最后处理
pub fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#x2F;", "/")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_grammar() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@"));
        assert!(!is_valid_email("alice@x"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("<script>@x.com"));
    }

    #[test]
    fn dates_must_be_calendar_dates() {
        assert!(parse_iso_date("2001-02-28").is_some());
        assert!(parse_iso_date("2001-02-30").is_none());
        assert!(parse_iso_date("28/02/2001").is_none());
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<img src=x onerror='a'>"),
            "&lt;img src=x onerror=&#x27;a&#x27;&gt;"
        );
        assert_eq!(escape_html("Bob & Co"), "Bob &amp; Co");
    }

    #[test]
    fn unescape_restores_original_text() {
        for raw in ["Bob & Co", "<a href='/x'>\"q\"</a>", "&lt; literally", "plain"] {
            assert_eq!(unescape_html(&escape_html(raw)), raw);
        }
    }

    #[test]
    fn collects_every_field_error() {
        let mut v = Validator::new();
        assert!(v.required_text("name", Some("   ")).is_none());
        assert!(v.required_email("email", Some("nope")).is_none());
        assert!(v.optional_date("birthDate", Some("yesterday")).is_none());
        assert_eq!(v.optional_text(Some("  ")), None);
        match v.finish() {
            Err(crate::error::AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "email", "birthDate"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn username_charset() {
        let mut v = Validator::new();
        assert_eq!(v.username("username", Some("  alice_1 ")), Some("alice_1".into()));
        assert!(v.username("username", Some("<b>")).is_none());
        assert!(v.username("username", Some(&"a".repeat(33))).is_none());
        assert_eq!(v.errors.len(), 2);
    }

    #[test]
    fn password_length_counts_characters() {
        let mut v = Validator::new();
        assert!(v.password("password", Some("12345")).is_none());
        assert!(v.password("password", Some("secret1")).is_some());
        assert_eq!(v.errors.len(), 1);
    }
}
