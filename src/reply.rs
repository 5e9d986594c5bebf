// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理器返回值模块
//!
//! 处理器的返回值统一转换为 [`Reply`]，由返回值拦截器在整条拦截器链回溯完成后
//! 写入响应缓冲区。[`AbortError`] 是携带显式状态码的“中止”错误。

use std::error::Error;
use std::fmt;

use crate::param::status_text;

/// 携带 HTTP 状态码与响应体的中止错误。状态码与内容会被原样写回客户端。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortError {
    pub code: u16,
    pub content: String,
}

impl AbortError {
    pub fn new(code: u16, content: &str) -> Self {
        Self {
            code,
            content: content.to_string(),
        }
    }
}

impl fmt::Display for AbortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl Error for AbortError {}

/// 以指定状态码中止请求。内容为空时使用标准原因短语。
pub fn abort(code: u16, content: &str) -> AbortError {
    if content.is_empty() {
        AbortError::new(code, status_text(code).unwrap_or_default())
    } else {
        AbortError::new(code, content)
    }
}

pub fn not_found() -> AbortError {
    abort(404, "")
}

pub fn not_supported() -> AbortError {
    abort(405, "")
}

pub fn forbidden() -> AbortError {
    abort(403, "")
}

pub fn unauthorized() -> AbortError {
    abort(401, "")
}

pub fn internal_server_error() -> AbortError {
    abort(500, "")
}

/// 一次路由执行的结果
#[derive(Debug, Default)]
pub enum Reply {
    /// 处理器没有返回任何值
    #[default]
    Empty,
    Abort(AbortError),
    Error(Box<dyn Error + Send + Sync>),
    Bytes(Vec<u8>),
    Text(String),
    /// 处理器已自行处理响应，例如返回了一个布尔标记
    Handled,
}

impl Reply {
    /// 从任意错误构造返回值，`AbortError` 会被还原为 `Reply::Abort`
    pub fn from_error(error: Box<dyn Error + Send + Sync>) -> Self {
        match error.downcast::<AbortError>() {
            Ok(abort) => Reply::Abort(*abort),
            Err(other) => Reply::Error(other),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Empty)
    }

    /// 日志中使用的简短描述
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Empty => "empty",
            Reply::Abort(_) => "abort",
            Reply::Error(_) => "error",
            Reply::Bytes(_) => "bytes",
            Reply::Text(_) => "text",
            Reply::Handled => "handled",
        }
    }
}

/// 可以作为处理器返回值的类型
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        Reply::Empty
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Reply {
        Reply::Text(self)
    }
}

impl IntoReply for &str {
    fn into_reply(self) -> Reply {
        Reply::Text(self.to_string())
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Reply {
        Reply::Bytes(self)
    }
}

impl IntoReply for &[u8] {
    fn into_reply(self) -> Reply {
        Reply::Bytes(self.to_vec())
    }
}

impl IntoReply for bool {
    fn into_reply(self) -> Reply {
        Reply::Handled
    }
}

impl IntoReply for AbortError {
    fn into_reply(self) -> Reply {
        Reply::Abort(self)
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Reply {
        match self {
            Some(value) => value.into_reply(),
            None => Reply::Empty,
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(value) => value.into_reply(),
            Err(e) => Reply::from_error(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_default_content() {
        assert_eq!(not_found().content, "Not Found");
        assert_eq!(not_supported().code, 405);
        assert_eq!(abort(418, "short and stout").content, "short and stout");
        assert_eq!(abort(599, "").content, "");
        assert_eq!(unauthorized().content, "Unauthorized");
        assert_eq!(internal_server_error().code, 500);
    }

    #[test]
    fn test_scalar_conversions() {
        assert!(matches!("hello".into_reply(), Reply::Text(s) if s == "hello"));
        assert!(matches!(b"hi".to_vec().into_reply(), Reply::Bytes(b) if b == b"hi"));
        assert!(matches!(().into_reply(), Reply::Empty));
        assert!(matches!(true.into_reply(), Reply::Handled));
        assert!(matches!(None::<String>.into_reply(), Reply::Empty));
    }

    #[test]
    fn test_result_error_is_classified() {
        let generic: Result<String, String> = Err("boom".to_string());
        match generic.into_reply() {
            Reply::Error(e) => assert_eq!(e.to_string(), "boom"),
            other => panic!("unexpected reply {:?}", other),
        }

        let aborted: Result<(), AbortError> = Err(forbidden());
        match aborted.into_reply() {
            Reply::Abort(a) => assert_eq!(a.code, 403),
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
