// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::{debug, warn};

use super::Interceptor;
use crate::{
    context::Context,
    param::{HttpRequestMethod, XSRF_TAG},
    response::Cookie,
};

/// XSRF 校验。
///
/// GET 请求确保客户端持有令牌 Cookie，并把令牌交给渲染层；
/// POST 请求要求 Cookie 与表单字段中的令牌都存在且相等，否则直接返回 500。
pub struct XsrfInterceptor;

impl Interceptor for XsrfInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let check = ctx.route().map_or(false, |r| r.handler().capabilities().check_xsrf);
        if !check {
            ctx.invoke();
            return;
        }

        let id = ctx.id();
        match ctx.request().method() {
            HttpRequestMethod::Get => {
                let existing = ctx
                    .request()
                    .cookie(XSRF_TAG)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string);
                let token = match existing {
                    Some(token) => token,
                    None => {
                        let token = uuid::Uuid::new_v4().to_string();
                        let age = ctx.app().config().session_timeout() as i64;
                        ctx.response_mut().set_cookie(&Cookie::with_age(XSRF_TAG, &token, age));
                        debug!("[ID{}]生成新的XSRF令牌", id);
                        token
                    }
                };
                ctx.set_xsrf_token(&token);
            }
            HttpRequestMethod::Post => {
                let request = ctx.request();
                let cookie = request.cookie(XSRF_TAG).unwrap_or_default();
                let form = request.form().get(XSRF_TAG).unwrap_or_default();
                if cookie.is_empty() || cookie != form {
                    warn!("[ID{}]XSRF令牌校验失败：{}", id, request.path());
                    ctx.response_mut().error(500, "xsrf token error.");
                    return;
                }
                let token = cookie.to_string();
                ctx.set_xsrf_token(&token);
            }
            _ => {}
        }

        ctx.invoke();
    }
}
