// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 处理器（Action）模块
//!
//! 控制器类型实现 [`Action`] trait，并通过一组可选的访问器声明自己具备的能力：
//! 生命周期钩子（Init / Before / After）、表单绑定、Session、日志、配置与应用引用。
//! 这些能力在注册时由原型实例探测一次，记录在 [`Capabilities`] 中，
//! 拦截器据此决定是否需要为当前请求注入对应的服务。
//!
//! 每个请求都会通过工厂函数构建一个全新的控制器实例，实例不会在请求之间共享。

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::{
    app::AppState,
    bind::Bind,
    reply::{IntoReply, Reply},
    request::Request,
    scope::Scope,
    session::Session,
};

/// 允许将 trait 对象向下转型为具体类型
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 控制器 trait。所有访问器默认返回 `None`，表示不具备对应能力。
pub trait Action: AsAny + Send {
    /// 框架基础字段：请求与应用引用
    fn base_mut(&mut self) -> Option<&mut ActionBase> {
        None
    }

    fn as_init(&mut self) -> Option<&mut dyn Init> {
        None
    }

    fn as_before(&mut self) -> Option<&mut dyn Before> {
        None
    }

    fn as_after(&mut self) -> Option<&mut dyn After> {
        None
    }

    fn as_bind(&mut self) -> Option<&mut dyn Bind> {
        None
    }

    fn as_session(&mut self) -> Option<&mut dyn WantsSession> {
        None
    }

    fn as_logger(&mut self) -> Option<&mut dyn WantsLogger> {
        None
    }

    fn as_config(&mut self) -> Option<&mut dyn WantsConfig> {
        None
    }

    fn as_app(&mut self) -> Option<&mut dyn WantsApp> {
        None
    }

    /// 返回 `false` 时 XSRF 拦截器跳过该控制器
    fn check_xsrf(&self) -> bool {
        true
    }
}

/// 构建并注入完成后、执行目标方法前调用
pub trait Init {
    fn init(&mut self);
}

/// 目标方法执行前调用，返回 `false` 时目标方法不会被执行
pub trait Before {
    fn before(&mut self, struct_name: &str, action_name: &str) -> bool;
}

/// 目标方法执行后调用。返回值仅用于记录日志，不会改变已经产生的响应。
pub trait After {
    fn after(&mut self, struct_name: &str, action_name: &str, result: &Reply) -> bool;
}

pub trait WantsSession {
    fn set_session(&mut self, session: Session);
}

pub trait WantsLogger {
    fn set_logger(&mut self, logger: ActionLogger);
}

pub trait WantsConfig {
    fn set_config(&mut self, config: HashMap<String, Value>);
}

pub trait WantsApp {
    fn set_app(&mut self, app: Arc<AppState>);
}

/// 控制器的框架基础字段，在用户代码运行之前由框架填充
#[derive(Default, Clone)]
pub struct ActionBase {
    request: Option<Arc<Request>>,
    app: Option<Arc<AppState>>,
}

impl ActionBase {
    pub(crate) fn attach(&mut self, request: Arc<Request>, app: Arc<AppState>) {
        self.request = Some(request);
        self.app = Some(app);
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    pub fn app(&self) -> Option<&Arc<AppState>> {
        self.app.as_ref()
    }
}

/// 注入给控制器的日志句柄，日志行带有请求 ID，target 为控制器类型名
#[derive(Debug, Clone)]
pub struct ActionLogger {
    target: String,
    id: u128,
}

impl ActionLogger {
    pub fn new(target: &str, id: u128) -> Self {
        Self {
            target: target.to_string(),
            id,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn debug(&self, message: &str) {
        debug!(target: self.target.as_str(), "[ID{}]{}", self.id, message);
    }

    pub fn info(&self, message: &str) {
        info!(target: self.target.as_str(), "[ID{}]{}", self.id, message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.target.as_str(), "[ID{}]{}", self.id, message);
    }

    pub fn error(&self, message: &str) {
        error!(target: self.target.as_str(), "[ID{}]{}", self.id, message);
    }
}

/// 控制器类型具备的能力，注册时探测一次
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub base: bool,
    pub init: bool,
    pub before: bool,
    pub after: bool,
    pub bind: bool,
    pub session: bool,
    pub logger: bool,
    pub config: bool,
    pub app: bool,
    pub check_xsrf: bool,
}

impl Capabilities {
    pub fn probe(action: &mut dyn Action) -> Self {
        Self {
            base: action.base_mut().is_some(),
            init: action.as_init().is_some(),
            before: action.as_before().is_some(),
            after: action.as_after().is_some(),
            bind: action.as_bind().is_some(),
            session: action.as_session().is_some(),
            logger: action.as_logger().is_some(),
            config: action.as_config().is_some(),
            app: action.as_app().is_some(),
            check_xsrf: action.check_xsrf(),
        }
    }

    /// 函数路由没有实例，只保留 XSRF 检查
    pub fn for_func() -> Self {
        Self {
            check_xsrf: true,
            ..Self::default()
        }
    }
}

pub type FuncHandler = Arc<dyn Fn(&mut Scope<'_>) -> Reply + Send + Sync>;
pub type ActionFactory = Arc<dyn Fn() -> Box<dyn Action> + Send + Sync>;
/// 在控制器实例上调用目标方法。实例类型与注册类型不符时返回 `None`。
pub type ActionMethod = Arc<dyn Fn(&mut dyn Action, &mut Scope<'_>) -> Option<Reply> + Send + Sync>;

/// 控制器路由的描述：类型名、方法名、实例工厂与方法调用器
pub struct ControllerRoute {
    type_name: String,
    method_name: String,
    factory: ActionFactory,
    method: ActionMethod,
    capabilities: Capabilities,
}

impl ControllerRoute {
    pub fn new<T, F, R>(type_name: &str, method_name: &str, factory: ActionFactory, capabilities: Capabilities, f: F) -> Self
    where
        T: Action,
        F: Fn(&mut T, &mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let method: ActionMethod = Arc::new(move |action: &mut dyn Action, scope: &mut Scope<'_>| {
            action
                .as_any_mut()
                .downcast_mut::<T>()
                .map(|target| f(target, scope).into_reply())
        });
        Self {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
            factory,
            method,
            capabilities,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn build(&self) -> Box<dyn Action> {
        (self.factory)()
    }

    pub fn call(&self, action: &mut dyn Action, scope: &mut Scope<'_>) -> Option<Reply> {
        (self.method)(action, scope)
    }
}

/// 路由指向的处理器
pub enum Handler {
    Func(FuncHandler),
    Controller(ControllerRoute),
}

impl Handler {
    pub fn func<F, R>(f: F) -> Self
    where
        F: Fn(&mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        Handler::Func(Arc::new(move |scope: &mut Scope<'_>| f(scope).into_reply()))
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            Handler::Func(_) => Capabilities::for_func(),
            Handler::Controller(c) => c.capabilities,
        }
    }

    pub fn as_controller(&self) -> Option<&ControllerRoute> {
        match self {
            Handler::Controller(c) => Some(c),
            Handler::Func(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Handler::Func(_) => "<func>".to_string(),
            Handler::Controller(c) => format!("{}.{}", c.type_name, c.method_name),
        }
    }
}

/// 类型名去掉模块路径后的短名称
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Plain;
    impl Action for Plain {}

    #[derive(Default)]
    struct Hooked {
        base: ActionBase,
        inited: bool,
    }

    impl Init for Hooked {
        fn init(&mut self) {
            self.inited = true;
        }
    }

    impl Action for Hooked {
        fn base_mut(&mut self) -> Option<&mut ActionBase> {
            Some(&mut self.base)
        }

        fn as_init(&mut self) -> Option<&mut dyn Init> {
            Some(self)
        }

        fn check_xsrf(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_probe_plain() {
        let caps = Capabilities::probe(&mut Plain);
        assert_eq!(
            caps,
            Capabilities {
                check_xsrf: true,
                ..Capabilities::default()
            }
        );
    }

    #[test]
    fn test_probe_hooked() {
        let mut hooked = Hooked::default();
        let caps = Capabilities::probe(&mut hooked);
        assert!(caps.base);
        assert!(caps.init);
        assert!(!caps.before);
        assert!(!caps.check_xsrf);
        hooked.as_init().unwrap().init();
        assert!(hooked.inited);
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Hooked>(), "Hooked");
        assert_eq!(short_type_name::<String>(), "String");
    }
}
