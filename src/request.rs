// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 2. 请求头的提取，以及 Cookie、Range、Accept-Encoding 等常用字段的预解析。
//! 3. 表单解析：查询串、`application/x-www-form-urlencoded` 与 `multipart/form-data`。
//!
//! 解析结果在整个请求生命周期内只读，由 `Arc` 在上下文与处理器之间共享。

use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, error, warn};

use crate::{exception::Exception, param::*};

/// 有序的表单键值表。同名字段的多个值按出现顺序保存。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Form {
    entries: Vec<(String, Vec<String>)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个值；同名字段已存在时追加到其值列表末尾
    pub fn append(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.entries.push((key.to_string(), vec![value.to_string()])),
        }
    }

    /// 字段的第一个值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key).first().map(String::as_str)
    }

    /// 字段的全部值，不存在时为空切片
    pub fn get_all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn extend_urlencoded(&mut self, raw: &[u8]) {
        for (key, value) in url::form_urlencoded::parse(raw) {
            self.append(&key, &value);
        }
    }
}

/// `multipart/form-data` 中上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 全局请求 ID，用于在多线程环境下追踪日志
    id: u128,
    method: HttpRequestMethod,
    /// 解码后的路径，不含查询串
    path: String,
    query: String,
    version: HttpVersion,
    headers: Vec<(String, String)>,
    user_agent: String,
    /// 客户端支持的压缩编码列表（按客户端声明顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    accept: Option<String>,
    /// 范围请求参数：(起始字节, 结束字节)
    range: Option<(u64, Option<u64>)>,
    cookies: Vec<(String, String)>,
    form: Form,
    files: Vec<UploadedFile>,
    body: Bytes,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 以空行切分请求头与请求体，请求头必须是合法的 UTF-8。
    /// 2. 解析请求行：方法、路径（含百分号解码）、查询串与协议版本。
    /// 3. 逐行解析请求头，并预解析常用字段。
    /// 4. 根据 `Content-Type` 解析表单。请求体字段排在查询串字段之前。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head_bytes, body_bytes) = match header_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + 4..]),
            None => (buffer, &buffer[buffer.len()..]),
        };
        let head = match std::str::from_utf8(head_bytes) {
            Ok(head) => head,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method: HttpRequestMethod = parts[0].parse().map_err(|e| {
            error!("[ID{}]不支持的HTTP请求方法：{}", id, parts[0]);
            e
        })?;

        let version = match parts[parts.len() - 1].to_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = parts[1..parts.len() - 1].join(" ");
        let (raw_path, query) = match target.split_once('?') {
            Some((p, q)) => (p.to_string(), q.to_string()),
            None => (target, String::new()),
        };
        let path = match urlencoding::decode(&raw_path) {
            Ok(p) => p.into_owned(),
            Err(_) => {
                warn!("[ID{}]路径无法解码，按原样处理：{}", id, raw_path);
                raw_path
            }
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
                None => {
                    error!("[ID{}]无法解析的请求头：{}", id, line);
                    return Err(Exception::MalformedRequest);
                }
            }
        }

        let mut request = Self {
            id,
            method,
            path,
            query,
            version,
            headers,
            user_agent: String::new(),
            accept_encoding: vec![],
            accept: None,
            range: None,
            cookies: vec![],
            form: Form::new(),
            files: vec![],
            body: Bytes::new(),
            remote_addr: None,
        };
        request.user_agent = request.header("user-agent").unwrap_or_default().to_string();
        request.accept = request.header("accept").map(str::to_string);
        request.accept_encoding = request
            .header("accept-encoding")
            .map(parse_accept_encoding)
            .unwrap_or_default();
        request.range = request.header("range").and_then(parse_range);
        request.cookies = request.header("cookie").map(parse_cookies).unwrap_or_default();

        let declared = request
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(body_bytes.len());
        let body_len = declared.min(body_bytes.len());
        request.body = Bytes::copy_from_slice(&body_bytes[..body_len]);
        request.parse_form();
        debug!(
            "[ID{}]请求解析完成：{} {}，表单字段{}个",
            id,
            request.method,
            request.path,
            request.form.len()
        );
        Ok(request)
    }

    fn parse_form(&mut self) {
        let mut form = Form::new();
        if self.method.has_body() {
            let content_type = self.content_type().unwrap_or_default().to_string();
            if content_type.contains("application/x-www-form-urlencoded") {
                form.extend_urlencoded(&self.body);
            } else if content_type.contains("multipart/form-data") {
                match boundary_of(&content_type) {
                    Some(boundary) => {
                        self.files = parse_multipart(&self.body, &boundary, &mut form);
                    }
                    None => warn!("[ID{}]multipart请求缺少boundary参数", self.id),
                }
            }
        }
        form.extend_urlencoded(self.query.as_bytes());
        self.form = form;
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 请求路径（已解码，不含查询串）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn range(&self) -> Option<(u64, Option<u64>)> {
        self.range
    }

    /// 按名称（大小写不敏感）查找请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }
}

/// 请求头结束位置（`\r\n\r\n` 的起始下标）
pub fn header_end(buffer: &[u8]) -> Option<usize> {
    find_bytes(buffer, b"\r\n\r\n")
}

/// 若请求头已完整到达，返回整个请求（头 + 体）应有的字节数
pub fn expected_length(buffer: &[u8]) -> Option<usize> {
    let end = header_end(buffer)?;
    let head = String::from_utf8_lossy(&buffer[..end]);
    let content_length = head
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(end + 4 + content_length)
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// 按客户端声明顺序解析 Accept-Encoding，忽略 q=0 的编码
fn parse_accept_encoding(value: &str) -> Vec<HttpEncoding> {
    let mut encodings = vec![];
    for item in value.split(',') {
        let mut params = item.split(';');
        let name = params.next().unwrap_or_default().trim().to_ascii_lowercase();
        let refused = params.any(|p| {
            let p = p.trim();
            p == "q=0" || p == "q=0.0" || p == "q=0.00" || p == "q=0.000"
        });
        if refused {
            continue;
        }
        let encoding = match name.as_str() {
            "gzip" => HttpEncoding::Gzip,
            "deflate" => HttpEncoding::Deflate,
            "br" => HttpEncoding::Br,
            _ => continue,
        };
        if !encodings.contains(&encoding) {
            encodings.push(encoding);
        }
    }
    encodings
}

/// 解析 Range 请求头 (RFC 7233)，格式示例: `bytes=0-1023`
fn parse_range(value: &str) -> Option<(u64, Option<u64>)> {
    let bytes_part = value.strip_prefix("bytes=")?;
    let (start, end) = bytes_part.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = if end.trim().is_empty() {
        None
    } else {
        Some(end.trim().parse::<u64>().ok()?)
    };
    Some((start, end))
}

fn parse_cookies(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn boundary_of(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|p| p.trim().strip_prefix("boundary="))
        .map(|b| b.trim_matches('"').to_string())
        .find(|b| !b.is_empty())
}

/// 解析 multipart 请求体：文本字段写入表单，文件字段作为上传文件返回
fn parse_multipart(body: &[u8], boundary: &str, form: &mut Form) -> Vec<UploadedFile> {
    let delimiter = format!("--{}", boundary);
    let delimiter = delimiter.as_bytes();
    let mut files = vec![];
    let mut rest = match find_bytes(body, delimiter) {
        Some(start) => &body[start + delimiter.len()..],
        None => return files,
    };

    loop {
        if rest.starts_with(b"--") {
            break;
        }
        let rest_after_crlf = rest.strip_prefix(b"\r\n").unwrap_or(rest);
        let next = match find_bytes(rest_after_crlf, delimiter) {
            Some(next) => next,
            None => break,
        };
        let part = &rest_after_crlf[..next];
        let part = part.strip_suffix(b"\r\n").unwrap_or(part);
        rest = &rest_after_crlf[next + delimiter.len()..];

        let split = match header_end(part) {
            Some(split) => split,
            None => continue,
        };
        let head = String::from_utf8_lossy(&part[..split]);
        let data = &part[split + 4..];

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in head.split(CRLF) {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("content-disposition") {
                for param in value.split(';') {
                    let param = param.trim();
                    if let Some(v) = param.strip_prefix("name=") {
                        name = Some(v.trim_matches('"').to_string());
                    } else if let Some(v) = param.strip_prefix("filename=") {
                        filename = Some(v.trim_matches('"').to_string());
                    }
                }
            } else if key.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_string());
            }
        }

        let Some(name) = name else {
            continue;
        };
        match filename {
            Some(filename) => files.push(UploadedFile {
                field: name,
                filename,
                content_type,
                data: Bytes::copy_from_slice(data),
            }),
            None => form.append(&name, &String::from_utf8_lossy(data)),
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(
            request.accept_encoding(),
            &[HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        );
    }

    /// 编码列表保留客户端声明顺序，q=0 的编码被忽略
    #[test]
    fn test_accept_encoding_order_and_refusal() {
        let request_str =
            "GET / HTTP/1.1\r\nAccept-Encoding: deflate, gzip;q=0, br;q=0.5\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.accept_encoding(), &[HttpEncoding::Deflate, HttpEncoding::Br]);
    }

    #[test]
    fn test_parse_head_request() {
        let request_str =
            "HEAD /index.html HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Agent\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.path(), "/index.html");
    }

    /// POST 表单：请求体字段在前，查询串字段在后
    #[test]
    fn test_parse_post_form() {
        let request_str = "POST /submit?id=9&name=q HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 20\r\n\r\nid=42&name=al+ice%21";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.path(), "/submit");
        assert_eq!(request.form().get("id"), Some("42"));
        assert_eq!(request.form().get_all("id"), &["42".to_string(), "9".to_string()]);
        assert_eq!(request.form().get("name"), Some("al ice!"));
    }

    #[test]
    fn test_get_does_not_parse_body() {
        let request_str = "GET /x?a=1 HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 3\r\n\r\nb=2";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.form().get("a"), Some("1"));
        assert!(!request.form().contains("b"));
    }

    #[test]
    fn test_unsupported_method() {
        let request_str = "BREW /pot HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);
        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequest);
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost:7878\r\nuser-agent: Test\r\naccept-encoding: gzip\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert_eq!(request.header("HOST"), Some("localhost:7878"));
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
    }

    #[test]
    fn test_path_with_query_string_and_escapes() {
        let request_str = "GET /page%20one?id=123&name=test HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/page one");
        assert_eq!(request.query(), "id=123&name=test");
        assert_eq!(request.form().get("name"), Some("test"));
    }

    #[test]
    fn test_lowercase_method_and_http10() {
        let request = Request::try_from(b"get / HTTP/1.0\r\n\r\n", 0).unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.version(), &HttpVersion::V1_0);
    }

    #[test]
    fn test_cookies_and_range() {
        let request_str =
            "GET /f HTTP/1.1\r\nCookie: _xsrf=abc; theme=\"dark\"\r\nRange: bytes=10-\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.cookie("_xsrf"), Some("abc"));
        assert_eq!(request.cookie("theme"), Some("dark"));
        assert_eq!(request.cookie("missing"), None);
        assert_eq!(request.range(), Some((10, None)));
    }

    #[test]
    fn test_multipart_form() {
        let body = "--XyZ\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n--XyZ\r\nContent-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nfile body\r\n--XyZ--\r\n";
        let request_str = format!(
            "POST /up HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XyZ\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.form().get("title"), Some("hello"));
        assert_eq!(request.files().len(), 1);
        assert_eq!(request.files()[0].filename, "a.txt");
        assert_eq!(request.files()[0].field, "upload");
        assert_eq!(&request.files()[0].data[..], b"file body");
    }

    #[test]
    fn test_expected_length() {
        let partial = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nab";
        assert_eq!(expected_length(partial), Some(partial.len() - 2 + 5));
        assert_eq!(expected_length(b"GET / HTTP/1.1\r\nHost: x"), None);
    }
}
