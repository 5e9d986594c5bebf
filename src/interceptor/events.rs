// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::{debug, warn};

use super::Interceptor;
use crate::context::Context;

/// 控制器生命周期钩子：`Init`、`Before`、`After`。
///
/// `Before` 返回 `false` 时不再继续链条，目标方法不会执行。
/// `After` 只用于观察，返回 `false` 仅记录一条警告。
pub struct EventsInterceptor;

impl Interceptor for EventsInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let hooks = ctx.route().and_then(|route| {
            route.handler().as_controller().map(|c| {
                (
                    c.type_name().to_string(),
                    c.method_name().to_string(),
                    *c.capabilities(),
                )
            })
        });
        let Some((struct_name, action_name, caps)) = hooks else {
            ctx.invoke();
            return;
        };
        let id = ctx.id();

        if caps.init {
            if let Some(target) = ctx.action().and_then(|a| a.as_init()) {
                target.init();
            }
        }

        if caps.before {
            if let Some(target) = ctx.action().and_then(|a| a.as_before()) {
                if !target.before(&struct_name, &action_name) {
                    debug!("[ID{}]{}.{}的Before钩子终止了请求", id, struct_name, action_name);
                    return;
                }
            }
        }

        ctx.invoke();

        if caps.after {
            let result = ctx.take_result();
            if let Some(target) = ctx.action().and_then(|a| a.as_after()) {
                if !target.after(&struct_name, &action_name, &result) {
                    warn!(
                        "[ID{}]{}.{}的After钩子返回false，响应已经产生，不做改变",
                        id, struct_name, action_name
                    );
                }
            }
            ctx.set_result(result);
        }
    }
}
