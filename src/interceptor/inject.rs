// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::sync::Arc;

use super::Interceptor;
use crate::{action::ActionLogger, context::Context};

/// 注入日志、应用级配置与应用引用。
///
/// 位于绑定与 Session 之后，保证注入顺序为 绑定 → Session → 日志 → 配置。
pub struct InjectInterceptor;

impl Interceptor for InjectInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let id = ctx.id();
        let controller = ctx
            .route()
            .and_then(|r| r.handler().as_controller().map(|c| (*c.capabilities(), c.type_name().to_string())));
        if let Some((caps, type_name)) = controller {
            if caps.logger {
                if let Some(target) = ctx.action().and_then(|a| a.as_logger()) {
                    target.set_logger(ActionLogger::new(&type_name, id));
                }
            }
            if caps.config {
                let settings = ctx.app().settings();
                if let Some(target) = ctx.action().and_then(|a| a.as_config()) {
                    target.set_config(settings);
                }
            }
            if caps.app {
                let app = Arc::clone(ctx.app());
                if let Some(target) = ctx.action().and_then(|a| a.as_app()) {
                    target.set_app(app);
                }
            }
        }
        ctx.invoke();
    }
}
