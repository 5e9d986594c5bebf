// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应缓冲模块
//!
//! `ResponseWriter` 在整个拦截器链执行期间累积状态码、响应头与响应体，
//! 压缩等拦截器可以在回溯阶段改写已写入的内容。链条完全回溯后，
//! 由 [`ResponseWriter::flush`] 一次性序列化为 HTTP 报文。

use std::fmt;
use std::io::{self, Write};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::debug;
use serde::Serialize;

use crate::{param::*, request::Request, util::web_time};

/// 响应缓冲区。状态码为 0 表示“尚未决定”。
#[derive(Debug, Clone)]
pub struct ResponseWriter {
    version: HttpVersion,
    status_code: u16,
    headers: Vec<(String, String)>,
    buffer: Vec<u8>,
    head_only: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 0,
            headers: vec![],
            buffer: vec![],
            head_only: false,
        }
    }

    /// 按请求的协议版本创建缓冲区；HEAD 请求在 flush 时省略响应体
    pub fn for_request(request: &Request) -> Self {
        Self {
            version: *request.version(),
            head_only: request.method() == HttpRequestMethod::Head,
            ..Self::new()
        }
    }

    /// 追加响应体。状态码尚未设置时隐式设为 200。
    pub fn write(&mut self, data: &[u8]) {
        if self.status_code == 0 {
            self.status_code = 200;
        }
        self.buffer.extend_from_slice(data);
    }

    pub fn write_str(&mut self, data: &str) {
        self.write(data.as_bytes());
    }

    pub fn write_header(&mut self, code: u16) {
        if self.status_code != 0 && self.status_code != code {
            debug!("状态码由{}改写为{}", self.status_code, code);
        }
        self.status_code = code;
    }

    /// 是否已经写入过状态码或响应体
    pub fn written(&self) -> bool {
        self.status_code != 0
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// 日志与报文中使用的状态码：未决定时视为 200
    pub fn effective_status(&self) -> u16 {
        if self.status_code == 0 {
            200
        } else {
            self.status_code
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.buffer
    }

    pub fn take_body(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    pub fn replace_body(&mut self, body: Vec<u8>) {
        self.buffer = body;
    }

    pub fn is_head(&self) -> bool {
        self.head_only
    }

    /// 设置响应头，同名（大小写不敏感）的旧值被替换
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// 追加响应头，不影响同名的已有值
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.add_header("Set-Cookie", &cookie.to_string());
    }

    /// 丢弃已写入的所有内容，回到“尚未决定”状态
    pub fn reset(&mut self) {
        self.status_code = 0;
        self.headers.clear();
        self.buffer.clear();
    }

    /// 写入状态码与纯文本响应体
    pub fn error(&mut self, code: u16, content: &str) {
        self.write_header(code);
        self.write_str(content);
    }

    pub fn redirect(&mut self, url: &str, code: u16) {
        self.set_header("Location", url);
        self.write_header(code);
    }

    pub fn serve_json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        self.set_header("Content-Type", "application/json");
        self.write(&bytes);
        Ok(())
    }

    /// 将缓冲区序列化为完整的 HTTP 响应报文。该方法消耗缓冲区，因此只能调用一次。
    pub fn flush(self) -> Vec<u8> {
        let code = self.effective_status();
        let information = status_text(code).unwrap_or("Unknown");
        let content_type = self.header("Content-Type").unwrap_or(DEFAULT_CONTENT_TYPE).to_string();

        let mut head = format!("{} {} {}{}", self.version, code, information, CRLF);
        head.push_str(&format!("Content-Type: {}{}", content_type, CRLF));
        head.push_str(&format!("Content-Length: {}{}", self.buffer.len(), CRLF));
        head.push_str(&format!("Date: {}{}", web_time(&Utc::now()), CRLF));
        head.push_str(&format!("Server: {}{}", SERVER_NAME, CRLF));
        head.push_str(&format!("Connection: close{}", CRLF));
        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case("content-type") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            head.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        head.push_str(CRLF);

        let mut bytes = head.into_bytes();
        if !self.head_only {
            bytes.extend_from_slice(&self.buffer);
        }
        bytes
    }
}

/// 表示一个 `Set-Cookie` 响应头
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    name: String,
    value: String,
    path: String,
    domain: Option<String>,
    expires: Option<DateTime<Utc>>,
    http_only: bool,
    secure: bool,
}

impl Cookie {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            path: "/".to_string(),
            domain: None,
            expires: None,
            http_only: false,
            secure: false,
        }
    }

    /// 按存活秒数创建 Cookie：0 表示永久（过期时间取 32 位时间戳上限），负数表示立即过期
    pub fn with_age(name: &str, value: &str, age: i64) -> Self {
        let expires = if age == 0 {
            Utc.timestamp_opt(i32::MAX as i64, 0).single()
        } else {
            Some(Utc::now() + chrono::Duration::seconds(age))
        };
        Self {
            expires,
            ..Self::new(name, value)
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires(&self) -> Option<&DateTime<Utc>> {
        self.expires.as_ref()
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={}", domain)?;
        }
        if let Some(expires) = &self.expires {
            write!(f, "; Expires={}", web_time(expires))?;
        }
        if self.http_only {
            f.write_str("; HttpOnly")?;
        }
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

/// 按指定编码压缩数据，`None` 原样返回
pub fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }
    result
}

/// 已经是压缩格式的内容类型，再压缩没有收益
pub fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/avif",
        "image/x-icon",
        "video/",
        "audio/",
        "application/zip",
        "application/gzip",
        "application/x-gzip",
        "application/x-7z-compressed",
        "font/woff",
        "font/woff2",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

/// 按客户端声明顺序选择第一个可用的编码；未启用 brotli 时跳过 br
pub fn decide_encoding(accept_encoding: &[HttpEncoding], enable_brotli: bool) -> Option<HttpEncoding> {
    accept_encoding
        .iter()
        .copied()
        .find(|e| *e != HttpEncoding::Br || enable_brotli)
}
