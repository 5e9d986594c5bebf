// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::time::Instant;

use log::{debug, error, info};

use super::Interceptor;
use crate::context::Context;

/// 请求日志：链条回溯后记录 `METHOD STATUS PATH`，4xx/5xx 记为 error。
pub struct LogInterceptor;

impl Interceptor for LogInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let start_time = Instant::now();
        let id = ctx.id();

        ctx.invoke();

        let request = ctx.request();
        let status = ctx.response().effective_status();
        if status < 400 {
            info!("[ID{}]{} {} {}", id, request.method(), status, request.path());
        } else {
            error!("[ID{}]{} {} {}", id, request.method(), status, request.path());
        }
        debug!("[ID{}]请求处理用时{}ms", id, start_time.elapsed().as_millis());
    }
}
