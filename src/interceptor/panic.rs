// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

use log::error;

use super::Interceptor;
use crate::{config::RunMode, context::Context};

thread_local! {
    // 最近一次 panic 的位置与调用栈，由 panic hook 记录
    static LAST_PANIC: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            let trace = format!("at {}\n{}", location, Backtrace::force_capture());
            LAST_PANIC.with(|last| *last.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 捕获链条内部的 panic，记录调用栈并改写为 500 响应。
///
/// 关闭恢复时 panic 会在记录日志后继续向外传播。
pub struct PanicInterceptor {
    recover: bool,
}

impl PanicInterceptor {
    pub fn new(recover: bool) -> Self {
        install_hook();
        Self { recover }
    }
}

impl Interceptor for PanicInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| ctx.invoke())) else {
            return;
        };

        let message = panic_message(payload.as_ref());
        let trace = LAST_PANIC.with(|last| last.borrow_mut().take()).unwrap_or_default();
        error!("[ID{}]Handler crashed with error: {}\n{}", ctx.id(), message, trace);

        if !self.recover {
            panic::resume_unwind(payload);
        }

        let body = match ctx.app().config().mode() {
            RunMode::Debug => message,
            RunMode::Product => "Internal Server Error".to_string(),
        };
        let response = ctx.response_mut();
        response.reset();
        response.error(500, &body);
    }
}
