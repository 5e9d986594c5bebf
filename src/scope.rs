// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理器作用域
//!
//! `Scope` 是处理器方法在一次调用中看到的视图：请求、响应缓冲区、路由捕获参数、
//! 应用引用以及 XSRF 令牌和 Session 等由拦截器准备好的数据。

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::error;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    app::AppState,
    bind::FromFormValue,
    exception::Exception,
    param::mime_for,
    render::xsrf_form_html,
    reply::{abort, AbortError},
    request::Request,
    response::{Cookie, ResponseWriter},
    session::Session,
    util::web_time,
};

pub struct Scope<'a> {
    request: &'a Arc<Request>,
    response: &'a mut ResponseWriter,
    params: &'a [String],
    app: &'a Arc<AppState>,
    xsrf_token: Option<&'a str>,
    session: Option<&'a Session>,
}

impl<'a> Scope<'a> {
    pub fn new(
        request: &'a Arc<Request>,
        response: &'a mut ResponseWriter,
        params: &'a [String],
        app: &'a Arc<AppState>,
        xsrf_token: Option<&'a str>,
        session: Option<&'a Session>,
    ) -> Self {
        Self {
            request,
            response,
            params,
            app,
            xsrf_token,
            session,
        }
    }

    pub fn request(&self) -> &Request {
        self.request
    }

    pub fn response(&mut self) -> &mut ResponseWriter {
        self.response
    }

    /// 路由正则捕获的参数，按分组顺序排列
    pub fn params(&self) -> &[String] {
        self.params
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn app(&self) -> &Arc<AppState> {
        self.app
    }

    pub fn session(&self) -> Option<&Session> {
        self.session
    }

    // --- 表单与查询参数 ---

    /// 表单字段的第一个值，不存在时为空字符串
    pub fn get_string(&self, key: &str) -> String {
        self.request.form().get(key).unwrap_or_default().to_string()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.parse(key)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.parse(key)
    }

    /// 字段存在且不为 `false` / `0` 时为真
    pub fn get_bool(&self, key: &str) -> bool {
        self.parse(key).unwrap_or(false)
    }

    pub fn get_slice(&self, key: &str) -> &[String] {
        self.request.form().get_all(key)
    }

    fn parse<T: FromFormValue>(&self, key: &str) -> Option<T> {
        self.request
            .form()
            .get(key)
            .and_then(|v| T::from_form_value(v).ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.request.cookie(name)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.header(name)
    }

    // --- 响应 ---

    pub fn redirect(&mut self, url: &str) {
        self.response.redirect(url, 302);
    }

    /// 立即写入状态码与内容
    pub fn abort(&mut self, code: u16, content: &str) {
        let AbortError { code, content } = abort(code, content);
        self.response.error(code, &content);
    }

    pub fn not_found(&mut self, message: &str) {
        self.abort(404, message);
    }

    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.response.set_cookie(cookie);
    }

    pub fn serve_json<T: Serialize>(&mut self, value: &T) -> Result<(), serde_json::Error> {
        self.response.serve_json(value)
    }

    /// 把文件内容写入响应，`Content-Type` 由扩展名决定
    pub fn serve_file(&mut self, path: &str) -> Result<(), Exception> {
        let path = Path::new(path);
        let content = fs::read(path).map_err(|e| {
            error!("[ID{}]无法读取文件{}：{}", self.request.id(), path.display(), e);
            Exception::FileNotFound
        })?;
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        self.response.set_header("Content-Type", mime_for(extension));
        self.response.write(&content);
        Ok(())
    }

    /// 渲染模板并写入响应。变量表在应用级模板变量之上合并 `vars`。
    pub fn render(&mut self, name: &str, vars: Value) -> Result<(), Exception> {
        let renderer = self.app.renderer();
        let merged = self.template_vars(vars);
        let body = renderer.render(name, &merged, self.xsrf_token)?;
        self.response.write_str(&body);
        Ok(())
    }

    pub fn render_string(&mut self, name: &str, content: &str, vars: Value) -> Result<(), Exception> {
        let renderer = self.app.renderer();
        let merged = self.template_vars(vars);
        let body = renderer.render_string(name, content, &merged, self.xsrf_token)?;
        self.response.write_str(&body);
        Ok(())
    }

    fn template_vars(&self, vars: Value) -> Map<String, Value> {
        let mut merged = self.app.vars();
        if let Value::Object(map) = vars {
            merged.extend(map);
        }
        merged
    }

    // --- XSRF 与静态资源 ---

    pub fn xsrf_value(&self) -> &str {
        self.xsrf_token.unwrap_or_default()
    }

    pub fn xsrf_form_html(&self) -> String {
        xsrf_form_html(self.xsrf_value())
    }

    pub fn static_url(&self, url: &str) -> String {
        self.app.static_url(url)
    }

    // --- 客户端信息 ---

    /// 客户端地址，优先使用代理转发的地址
    pub fn ip(&self) -> String {
        if let Some(forwarded) = self.request.header("X-Forwarded-For") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
                return first.to_string();
            }
        }
        if let Some(real) = self.request.header("X-Real-IP") {
            return real.to_string();
        }
        self.request
            .remote_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default()
    }

    pub fn is_ajax(&self) -> bool {
        self.request.header("X-Requested-With") == Some("XMLHttpRequest")
    }

    pub fn host(&self) -> &str {
        self.request.host().unwrap_or_default()
    }

    pub fn user_agent(&self) -> &str {
        self.request.user_agent()
    }

    pub fn disable_http_cache(&mut self) {
        self.response.set_header("Expires", "Mon, 26 Jul 1997 05:00:00 GMT");
        self.response.set_header("Last-Modified", &web_time(&Utc::now()));
        self.response
            .set_header("Cache-Control", "no-store, no-cache, must-revalidate");
        self.response.add_header("Cache-Control", "post-check=0, pre-check=0");
        self.response.set_header("Pragma", "no-cache");
    }
}
