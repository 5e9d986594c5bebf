// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 拦截器
//!
//! 拦截器包裹请求的整个生命周期。每个拦截器必须自行调用 [`Context::invoke`]
//! 才能让链条继续；调用之前的代码在请求阶段按注册顺序执行，
//! 调用之后的代码在响应阶段按相反顺序执行。不调用 `invoke` 即可短路其后的所有拦截器与处理器。
//!
//! 拦截器实例在所有并发请求之间共享，单个请求的状态只能保存在 `Context` 中。

use crate::{config::Config, context::Context};

mod bind;
mod compress;
mod events;
mod inject;
mod logging;
mod panic;
mod returns;
mod session;
mod static_files;
mod xsrf;

pub use self::bind::BindInterceptor;
pub use self::compress::CompressInterceptor;
pub use self::events::EventsInterceptor;
pub use self::inject::InjectInterceptor;
pub use self::logging::LogInterceptor;
pub use self::panic::PanicInterceptor;
pub use self::returns::ReturnInterceptor;
pub use self::session::SessionInterceptor;
pub use self::static_files::StaticInterceptor;
pub use self::xsrf::XsrfInterceptor;

pub trait Interceptor: Send + Sync {
    fn intercept(&self, ctx: &mut Context<'_>);
}

/// 由闭包构成的拦截器
pub struct FnInterceptor<F>(F);

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Context<'_>) + Send + Sync,
{
    fn intercept(&self, ctx: &mut Context<'_>) {
        (self.0)(ctx)
    }
}

pub fn from_fn<F>(f: F) -> FnInterceptor<F>
where
    F: Fn(&mut Context<'_>) + Send + Sync,
{
    FnInterceptor(f)
}

/// 按配置组装默认的拦截器链
pub fn default_chain(config: &Config) -> Vec<Box<dyn Interceptor>> {
    let app = config.app();
    let mut chain: Vec<Box<dyn Interceptor>> = vec![
        Box::new(LogInterceptor),
        Box::new(PanicInterceptor::new(config.recover_panic())),
    ];
    if config.enable_gzip() {
        chain.push(Box::new(CompressInterceptor::new(
            config.static_extensions_to_gzip(),
            config.compress_dynamic(),
            config.enable_brotli(),
        )));
    }
    chain.push(Box::new(ReturnInterceptor));
    chain.push(Box::new(StaticInterceptor::new(app.static_dir(), config.cache_size())));
    chain.push(Box::new(EventsInterceptor));
    if app.form_map_to_struct() {
        chain.push(Box::new(BindInterceptor));
    }
    if app.check_xsrf() {
        chain.push(Box::new(XsrfInterceptor));
    }
    if app.session_on() {
        chain.push(Box::new(SessionInterceptor));
    }
    chain.push(Box::new(InjectInterceptor));
    chain
}
