// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use super::Interceptor;
use crate::context::Context;

/// 链条回溯到这里时，把处理器的返回值写成响应
pub struct ReturnInterceptor;

impl Interceptor for ReturnInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        ctx.invoke();
        ctx.handle_result();
    }
}
