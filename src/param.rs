// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了框架在请求分发过程中共用的 HTTP 常量和强类型枚举：
//! - HTTP 状态码及其原因短语（Reason Phrase）。
//! - 静态文件服务使用的 MIME 类型映射表。
//! - HTTP 方法、版本及内容编码的强类型枚举。
//! - XSRF、Session 等内置拦截器共用的 Cookie / 表单字段名。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::exception::Exception;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "webframe";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// XSRF 令牌在 Cookie 与表单中使用的字段名。表单绑定总是跳过该字段。
pub const XSRF_TAG: &str = "_xsrf";

/// 内存 Session 存储使用的 Cookie 名称
pub const SESSION_COOKIE: &str = "WEBFRAME_SESSID";

/// 未设置 `Content-Type` 时 flush 阶段补上的默认值
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// 未显式声明方法的路由默认接受的 HTTP 方法
pub const DEFAULT_METHODS: [HttpRequestMethod; 2] = [HttpRequestMethod::Get, HttpRequestMethod::Post];

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");

        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");
        map.insert(206, "Partial Content");

        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(411, "Length Required");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(416, "Range Not Satisfiable");
        map.insert(418, "I'm a teapot");
        map.insert(422, "Unprocessable Content");
        map.insert(429, "Too Many Requests");

        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型的映射表，静态文件拦截器据此设置 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("avif", "image/avif");
        map.insert("bmp", "image/bmp");
        map.insert("css", "text/css; charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("gif", "image/gif");
        map.insert("gz", "application/gzip");
        map.insert("htm", "text/html; charset=utf-8");
        map.insert("html", "text/html; charset=utf-8");
        map.insert("ico", "image/x-icon");
        map.insert("jpeg", "image/jpeg");
        map.insert("jpg", "image/jpeg");
        map.insert("js", "text/javascript; charset=utf-8");
        map.insert("json", "application/json");
        map.insert("map", "application/json");
        map.insert("mjs", "text/javascript; charset=utf-8");
        map.insert("mp3", "audio/mpeg");
        map.insert("mp4", "video/mp4");
        map.insert("otf", "font/otf");
        map.insert("pdf", "application/pdf");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("tar", "application/x-tar");
        map.insert("ttf", "font/ttf");
        map.insert("txt", "text/plain; charset=utf-8");
        map.insert("wasm", "application/wasm");
        map.insert("webm", "video/webm");
        map.insert("webp", "image/webp");
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("xml", "text/xml; charset=utf-8");
        map.insert("zip", "application/zip");
        map
    };
}

/// 根据扩展名查找 MIME 类型，未知类型按二进制流处理
pub fn mime_for(extension: &str) -> &'static str {
    MIME_TYPES
        .get(extension.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or("application/octet-stream")
}

/// 查找状态码的原因短语，非标准状态码返回 `None`
pub fn status_text(code: u16) -> Option<&'static str> {
    STATUS_CODES.get(&code).copied()
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpRequestMethod {
    /// 路由匹配时使用的方法：HEAD 视同 GET
    pub fn for_matching(self) -> Self {
        match self {
            HttpRequestMethod::Head => HttpRequestMethod::Get,
            other => other,
        }
    }

    /// 该方法的请求是否可能携带表单请求体
    pub fn has_body(self) -> bool {
        matches!(
            self,
            HttpRequestMethod::Post | HttpRequestMethod::Put | HttpRequestMethod::Patch
        )
    }
}

impl FromStr for HttpRequestMethod {
    type Err = Exception;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpRequestMethod::Get),
            "HEAD" => Ok(HttpRequestMethod::Head),
            "OPTIONS" => Ok(HttpRequestMethod::Options),
            "POST" => Ok(HttpRequestMethod::Post),
            "PUT" => Ok(HttpRequestMethod::Put),
            "DELETE" => Ok(HttpRequestMethod::Delete),
            "PATCH" => Ok(HttpRequestMethod::Patch),
            _ => Err(Exception::UnSupportedRequestMethod),
        }
    }
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            HttpRequestMethod::Get => "GET",
            HttpRequestMethod::Head => "HEAD",
            HttpRequestMethod::Options => "OPTIONS",
            HttpRequestMethod::Post => "POST",
            HttpRequestMethod::Put => "PUT",
            HttpRequestMethod::Delete => "DELETE",
            HttpRequestMethod::Patch => "PATCH",
        };
        f.write_str(name)
    }
}

impl fmt::Display for HttpEncoding {
    /// 将枚举格式化为 `Content-Encoding` 头所使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("get".parse::<HttpRequestMethod>().unwrap(), HttpRequestMethod::Get);
        assert_eq!("Delete".parse::<HttpRequestMethod>().unwrap(), HttpRequestMethod::Delete);
        assert!("BREW".parse::<HttpRequestMethod>().is_err());
    }

    #[test]
    fn test_head_matches_as_get() {
        assert_eq!(HttpRequestMethod::Head.for_matching(), HttpRequestMethod::Get);
        assert_eq!(HttpRequestMethod::Post.for_matching(), HttpRequestMethod::Post);
    }

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_for("HTML"), "text/html; charset=utf-8");
        assert_eq!(mime_for("unknown-ext"), "application/octet-stream");
    }

    #[test]
    fn test_status_text() {
        assert_eq!(status_text(404), Some("Not Found"));
        assert_eq!(status_text(599), None);
    }
}
