// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 各集成测试共用的请求构造工具

#![allow(dead_code)]

use webframe::{AppConfig, Config, Request};

/// 不读取任何磁盘目录、关闭 XSRF 与 Session 的配置
pub fn bare_config() -> Config {
    Config::new().with_app(bare_app_config())
}

pub fn bare_app_config() -> AppConfig {
    AppConfig::default()
        .with_static_dir("no-such-static")
        .with_template_dir("no-such-templates")
        .with_check_xsrf(false)
        .with_session(false)
        .with_static_file_version(false)
}

pub fn raw(text: &str) -> Request {
    Request::try_from(text.as_bytes(), 1).unwrap()
}

pub fn get(path: &str) -> Request {
    raw(&format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path))
}

pub fn get_with_cookie(path: &str, cookie: &str) -> Request {
    raw(&format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nCookie: {}\r\n\r\n",
        path, cookie
    ))
}

/// 表单编码的 POST 请求，`cookie` 为空时不带 Cookie 头
pub fn post_form(path: &str, body: &str, cookie: &str) -> Request {
    let cookie_line = if cookie.is_empty() {
        String::new()
    } else {
        format!("Cookie: {}\r\n", cookie)
    };
    raw(&format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\n{}Content-Length: {}\r\n\r\n{}",
        path,
        cookie_line,
        body.len(),
        body
    ))
}

pub fn body_text(response: &webframe::ResponseWriter) -> String {
    String::from_utf8_lossy(response.body()).to_string()
}
