// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求上下文
//!
//! 每个请求拥有一个独立的 [`Context`]，它串联起拦截器链、路由匹配结果、
//! 控制器实例与最终的返回值。拦截器通过 [`Context::invoke`] 把控制权交给下一个拦截器，
//! 链条走完后由上下文执行目标处理器，并把返回值保存在 `result` 中，
//! 之后各拦截器按与注册相反的顺序执行各自的后置逻辑。

use std::sync::Arc;

use log::{debug, error, warn};

use crate::{
    action::{Action, Handler},
    app::AppState,
    config::RunMode,
    interceptor::Interceptor,
    reply::{not_found, Reply},
    request::Request,
    response::ResponseWriter,
    router::{Route, Router},
    scope::Scope,
    session::Session,
};

/// 拦截器链的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    NotStarted,
    /// 正在执行第 n 个拦截器
    At(usize),
    /// 第 n 个拦截器没有继续链条就返回了，目标处理器不会执行
    Stopped(usize),
    /// 链条已走完，目标处理器已经执行
    Exhausted,
}

/// 路由匹配的结果，只计算一次
enum Resolution {
    Pending,
    Unmatched,
    Matched { route: Arc<Route>, args: Vec<String> },
}

pub struct Context<'a> {
    interceptors: &'a [Box<dyn Interceptor>],
    router: &'a Router,
    app: Arc<AppState>,
    request: Arc<Request>,
    response: ResponseWriter,
    chain: ChainState,
    resolution: Resolution,
    action: Option<Box<dyn Action>>,
    action_built: bool,
    result: Reply,
    reconciled: bool,
    xsrf_token: Option<String>,
    session: Option<Session>,
}

impl<'a> Context<'a> {
    pub fn new(
        interceptors: &'a [Box<dyn Interceptor>],
        router: &'a Router,
        app: Arc<AppState>,
        request: Arc<Request>,
    ) -> Self {
        let response = ResponseWriter::for_request(&request);
        Self {
            interceptors,
            router,
            app,
            request,
            response,
            chain: ChainState::NotStarted,
            resolution: Resolution::Pending,
            action: None,
            action_built: false,
            result: Reply::Empty,
            reconciled: false,
            xsrf_token: None,
            session: None,
        }
    }

    pub fn id(&self) -> u128 {
        self.request.id()
    }

    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.response
    }

    pub fn app(&self) -> &Arc<AppState> {
        &self.app
    }

    pub fn chain_state(&self) -> ChainState {
        self.chain
    }

    /// 把控制权交给下一个拦截器；没有下一个拦截器时执行目标处理器。
    ///
    /// 链条走完或被某个拦截器截断之后，再次调用不会产生任何效果。
    pub fn invoke(&mut self) {
        let next = match self.chain {
            ChainState::NotStarted => 0,
            ChainState::At(i) => i + 1,
            ChainState::Exhausted => {
                warn!("[ID{}]拦截器链已经执行完毕，忽略重复的invoke调用", self.id());
                return;
            }
            ChainState::Stopped(i) => {
                warn!("[ID{}]拦截器链已在第{}个拦截器处截断，忽略重复的invoke调用", self.id(), i);
                return;
            }
        };

        let interceptors = self.interceptors;
        match interceptors.get(next) {
            Some(interceptor) => {
                self.chain = ChainState::At(next);
                interceptor.intercept(self);
                if self.chain == ChainState::At(next) {
                    self.chain = ChainState::Stopped(next);
                }
            }
            None => {
                self.chain = ChainState::Exhausted;
                self.execute();
            }
        }
    }

    fn resolve(&mut self) {
        if let Resolution::Pending = self.resolution {
            self.resolution = match self.router.find(self.request.path(), self.request.method()) {
                Some((route, args)) => {
                    debug!("[ID{}]匹配路由{}", self.request.id(), route.pattern());
                    Resolution::Matched { route, args }
                }
                None => Resolution::Unmatched,
            };
        }
    }

    /// 当前请求匹配到的路由。首次调用时查找，之后返回同一结果。
    pub fn route(&mut self) -> Option<Arc<Route>> {
        self.resolve();
        match &self.resolution {
            Resolution::Matched { route, .. } => Some(Arc::clone(route)),
            _ => None,
        }
    }

    /// 路由捕获的参数
    pub fn params(&mut self) -> &[String] {
        self.resolve();
        match &self.resolution {
            Resolution::Matched { args, .. } => args,
            _ => &[],
        }
    }

    pub fn matched(&mut self) -> bool {
        self.route().is_some()
    }

    /// 当前请求的控制器实例。首次调用时通过工厂构建并填充基础字段，
    /// 同一请求内多次调用返回同一个实例。函数路由或未匹配时为 `None`。
    pub fn action(&mut self) -> Option<&mut (dyn Action + 'static)> {
        if !self.action_built {
            self.action_built = true;
            if let Some(route) = self.route() {
                if let Some(controller) = route.handler().as_controller() {
                    let mut action = controller.build();
                    if let Some(base) = action.base_mut() {
                        base.attach(Arc::clone(&self.request), Arc::clone(&self.app));
                    }
                    debug!(
                        "[ID{}]构建控制器{}",
                        self.request.id(),
                        controller.type_name()
                    );
                    self.action = Some(action);
                }
            }
        }
        self.action.as_deref_mut()
    }

    pub fn result(&self) -> &Reply {
        &self.result
    }

    pub fn set_result(&mut self, result: Reply) {
        self.result = result;
    }

    pub fn take_result(&mut self) -> Reply {
        std::mem::take(&mut self.result)
    }

    pub fn xsrf_token(&self) -> Option<&str> {
        self.xsrf_token.as_deref()
    }

    pub fn set_xsrf_token(&mut self, token: &str) {
        self.xsrf_token = Some(token.to_string());
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// 根据返回值写入响应。每个请求只生效一次；响应已经写入时不做任何事。
    pub fn handle_result(&mut self) {
        if self.reconciled {
            return;
        }
        self.reconciled = true;
        if self.response.written() {
            return;
        }

        let matched = self.matched();
        let id = self.request.id();
        match &self.result {
            Reply::Empty => {
                if matched {
                    self.response.write_header(200);
                } else {
                    let e = not_found();
                    self.response.error(e.code, &e.content);
                }
            }
            Reply::Abort(e) => self.response.error(e.code, &e.content),
            Reply::Error(e) => {
                error!("[ID{}]处理器返回错误：{}", id, e);
                let body = match self.app.config().mode() {
                    RunMode::Debug => e.to_string(),
                    RunMode::Product => "Server Error".to_string(),
                };
                self.response.error(500, &body);
            }
            Reply::Bytes(bytes) => {
                self.response.write_header(200);
                self.response.write(bytes);
            }
            Reply::Text(text) => {
                self.response.write_header(200);
                self.response.write_str(text);
            }
            Reply::Handled => {}
        }
    }

    /// 链条尽头：执行目标处理器并保存返回值
    fn execute(&mut self) {
        let Some(route) = self.route() else {
            debug!("[ID{}]没有匹配{}的路由", self.request.id(), self.request.path());
            return;
        };
        if route.handler().as_controller().is_some() {
            self.action();
        }

        let Context {
            request,
            response,
            app,
            resolution,
            action,
            xsrf_token,
            session,
            result,
            ..
        } = self;
        let id = request.id();
        let params: &[String] = match resolution {
            Resolution::Matched { args, .. } => args,
            _ => &[],
        };
        let mut scope = Scope::new(
            request,
            response,
            params,
            app,
            xsrf_token.as_deref(),
            session.as_ref(),
        );

        *result = match route.handler() {
            Handler::Func(f) => f(&mut scope),
            Handler::Controller(controller) => match action.as_deref_mut() {
                Some(target) => controller.call(target, &mut scope).unwrap_or_else(|| {
                    error!("[ID{}]控制器实例与{}的类型不符", id, controller.type_name());
                    Reply::Abort(not_found())
                }),
                None => Reply::Abort(not_found()),
            },
        };
    }

    pub fn into_response(self) -> ResponseWriter {
        self.response
    }
}
