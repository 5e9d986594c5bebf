// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::sync::Arc;

use super::Interceptor;
use crate::{bind::bind_form, context::Context};

/// 把请求表单绑定到声明了绑定能力的控制器上
pub struct BindInterceptor;

impl Interceptor for BindInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let wants_bind = ctx.route().map_or(false, |r| r.handler().capabilities().bind);
        if wants_bind {
            let id = ctx.id();
            let request = Arc::clone(ctx.request());
            if let Some(target) = ctx.action().and_then(|a| a.as_bind()) {
                bind_form(target, request.form(), id);
            }
        }
        ctx.invoke();
    }
}
