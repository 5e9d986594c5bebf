// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::{debug, error};

use super::Interceptor;
use crate::{
    context::Context,
    param::DEFAULT_CONTENT_TYPE,
    response::{compress, decide_encoding, should_skip_compression},
};

/// 响应压缩。在链条回溯后处理已经累积完整的响应体。
pub struct CompressInterceptor {
    static_extensions: Vec<String>,
    compress_dynamic: bool,
    enable_brotli: bool,
}

impl CompressInterceptor {
    pub fn new(static_extensions: &[String], compress_dynamic: bool, enable_brotli: bool) -> Self {
        Self {
            static_extensions: static_extensions.iter().map(|e| e.to_lowercase()).collect(),
            compress_dynamic,
            enable_brotli,
        }
    }

    fn eligible(&self, ctx: &Context<'_>) -> bool {
        let response = ctx.response();
        if !response.written() || response.body().is_empty() || response.header("Content-Encoding").is_some() {
            return false;
        }
        let path = ctx.request().path().to_lowercase();
        if self.static_extensions.iter().any(|ext| path.ends_with(ext.as_str())) {
            return true;
        }
        let content_type = response.header("Content-Type").unwrap_or(DEFAULT_CONTENT_TYPE);
        self.compress_dynamic && !should_skip_compression(content_type)
    }
}

impl Interceptor for CompressInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        ctx.invoke();

        ctx.response_mut().add_header("Vary", "Accept-Encoding");
        if !self.eligible(ctx) {
            return;
        }
        let Some(encoding) = decide_encoding(ctx.request().accept_encoding(), self.enable_brotli) else {
            return;
        };

        let id = ctx.id();
        let response = ctx.response_mut();
        let body = response.take_body();
        let backup = body.clone();
        match compress(body, Some(encoding)) {
            Ok(compressed) => {
                debug!("[ID{}]响应体以{}压缩", id, encoding);
                response.replace_body(compressed);
                response.set_header("Content-Encoding", &encoding.to_string());
            }
            Err(e) => {
                error!("[ID{}]压缩响应体失败，按原样发送：{}", id, e);
                response.replace_body(backup);
            }
        }
    }
}
