// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::sync::Arc;

use log::error;

use super::Interceptor;
use crate::context::Context;

/// 从 Session 存储取得本次请求的会话，并注入给声明了 Session 能力的控制器。
///
/// 存储出错只记录日志，请求照常继续。
pub struct SessionInterceptor;

impl Interceptor for SessionInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        if let Some(store) = ctx.app().session_store() {
            let request = Arc::clone(ctx.request());
            match store.session(&request, ctx.response_mut()) {
                Ok(session) => {
                    let wants = ctx.route().map_or(false, |r| r.handler().capabilities().session);
                    if wants {
                        if let Some(target) = ctx.action().and_then(|a| a.as_session()) {
                            target.set_session(session.clone());
                        }
                    }
                    ctx.set_session(session);
                }
                Err(e) => error!("[ID{}]获取Session失败：{}", request.id(), e),
            }
        }
        ctx.invoke();
    }
}
