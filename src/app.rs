// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 应用
//!
//! [`App`] 是一个挂载在某个基础路径下的应用：它持有路由表、拦截器链以及由所有请求共享的
//! [`AppState`]（配置、模板变量、渲染器、Session 存储、静态文件版本号）。
//! 路由表与拦截器链在启动阶段构建完毕，服务期间只读。

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::{
    action::{short_type_name, Action, ActionFactory, Capabilities, ControllerRoute, Handler},
    config::{AppConfig, Config},
    context::Context,
    interceptor::{default_chain, Interceptor},
    param::{HttpRequestMethod, DEFAULT_METHODS},
    render::{Renderer, StaticVersions, TemplateRenderer},
    reply::IntoReply,
    request::Request,
    response::ResponseWriter,
    router::Router,
    scope::Scope,
    session::{MemoryStore, SessionStore},
    util::{controller_path, join_path, normalize_path},
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("应用状态锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("应用状态锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 应用内所有请求共享的服务
pub struct AppState {
    name: String,
    base_path: String,
    config: AppConfig,
    server_config: Arc<Config>,
    settings: RwLock<HashMap<String, Value>>,
    vars: RwLock<Map<String, Value>>,
    renderer: RwLock<Arc<dyn Renderer>>,
    session_store: RwLock<Option<Arc<dyn SessionStore>>>,
    static_versions: Arc<StaticVersions>,
}

impl AppState {
    fn new(name: &str, base_path: &str, config: &Config) -> Self {
        let app_config = config.app().clone();
        let static_versions = Arc::new(StaticVersions::new(app_config.static_dir()));
        if app_config.static_file_version() {
            let count = static_versions.cache_all();
            debug!("应用{}预先计算了{}个静态文件的版本号", name, count);
        }
        let renderer: Arc<dyn Renderer> = Arc::new(TemplateRenderer::new(
            app_config.template_dir(),
            app_config.cache_templates(),
            Arc::clone(&static_versions),
            base_path,
            app_config.static_file_version(),
        ));
        let session_store: Option<Arc<dyn SessionStore>> = if app_config.session_on() {
            Some(Arc::new(MemoryStore::new(Duration::from_secs(app_config.session_timeout()))))
        } else {
            None
        };

        Self {
            name: name.to_string(),
            base_path: base_path.to_string(),
            config: app_config,
            server_config: Arc::new(config.clone()),
            settings: RwLock::new(HashMap::new()),
            vars: RwLock::new(Map::new()),
            renderer: RwLock::new(renderer),
            session_store: RwLock::new(session_store),
            static_versions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn server_config(&self) -> &Arc<Config> {
        &self.server_config
    }

    pub fn get_config(&self, key: &str) -> Option<Value> {
        read(&self.settings).get(key).cloned()
    }

    pub fn set_config(&self, key: &str, value: Value) {
        write(&self.settings).insert(key.to_string(), value);
    }

    /// 应用级配置表的快照
    pub fn settings(&self) -> HashMap<String, Value> {
        read(&self.settings).clone()
    }

    pub fn set_var(&self, key: &str, value: Value) {
        write(&self.vars).insert(key.to_string(), value);
    }

    /// 模板变量表的快照
    pub fn vars(&self) -> Map<String, Value> {
        read(&self.vars).clone()
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::clone(&read(&self.renderer))
    }

    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        *write(&self.renderer) = renderer;
    }

    pub fn session_store(&self) -> Option<Arc<dyn SessionStore>> {
        read(&self.session_store).clone()
    }

    pub fn set_session_store(&self, store: Option<Arc<dyn SessionStore>>) {
        *write(&self.session_store) = store;
    }

    pub fn static_versions(&self) -> &Arc<StaticVersions> {
        &self.static_versions
    }

    /// 静态资源的 URL，启用了静态文件版本号时附带 `?v=`
    pub fn static_url(&self, url: &str) -> String {
        self.static_versions
            .url(&self.base_path, url, self.config.static_file_version())
    }
}

/// 挂载在一个基础路径下的应用
pub struct App {
    state: Arc<AppState>,
    router: Router,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl App {
    /// 按配置创建应用并装配默认拦截器链
    pub fn new(name: &str, base_path: &str, config: &Config) -> Self {
        Self::with_interceptors(name, base_path, config, default_chain(config))
    }

    /// 使用给定的拦截器链创建应用
    pub fn with_interceptors(
        name: &str,
        base_path: &str,
        config: &Config,
        interceptors: Vec<Box<dyn Interceptor>>,
    ) -> Self {
        let base_path = normalize_path(&join_path("/", base_path));
        info!("创建应用{}，基础路径{}", name, base_path);
        Self {
            state: Arc::new(AppState::new(name, &base_path, config)),
            router: Router::new(),
            interceptors,
        }
    }

    pub fn name(&self) -> &str {
        self.state.name()
    }

    pub fn base_path(&self) -> &str {
        self.state.base_path()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// 在链条末尾追加一个拦截器
    pub fn use_interceptor<I: Interceptor + 'static>(&mut self, interceptor: I) -> &mut Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    fn register(&mut self, pattern: &str, methods: &[HttpRequestMethod], handler: Handler) {
        let full = join_path(self.state.base_path(), pattern);
        if let Err(e) = self.router.add(&full, methods, handler) {
            error!("路由{}注册失败，已跳过：{}", full, e);
        }
    }

    /// 注册函数路由
    pub fn handle<F, R>(&mut self, methods: &[HttpRequestMethod], pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.register(pattern, methods, Handler::func(f));
        self
    }

    pub fn get<F, R>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.handle(&[HttpRequestMethod::Get], pattern, f)
    }

    pub fn post<F, R>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.handle(&[HttpRequestMethod::Post], pattern, f)
    }

    /// GET 与 POST
    pub fn any<F, R>(&mut self, pattern: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.handle(&DEFAULT_METHODS, pattern, f)
    }

    /// 以 `T::default()` 为工厂注册控制器
    pub fn controller<T: Action + Default>(&mut self, base: &str) -> ControllerBuilder<'_, T> {
        self.controller_with(base, T::default)
    }

    pub fn controller_with<T, F>(&mut self, base: &str, factory: F) -> ControllerBuilder<'_, T>
    where
        T: Action,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let factory: ActionFactory = Arc::new(move || Box::new(factory()) as Box<dyn Action>);
        let mut prototype = factory();
        let capabilities = Capabilities::probe(prototype.as_mut());
        debug!("控制器{}的能力：{:?}", short_type_name::<T>(), capabilities);
        ControllerBuilder {
            app: self,
            base: normalize_path(&join_path("/", base)),
            factory,
            capabilities,
            names: vec![],
            _marker: PhantomData,
        }
    }

    /// 由类型名推导挂载路径：`UserAction` 挂载在 `/user`
    pub fn auto_controller<T: Action + Default>(&mut self) -> ControllerBuilder<'_, T> {
        let base = controller_path(short_type_name::<T>());
        self.controller::<T>(&base)
    }

    pub fn set_config(&self, key: &str, value: Value) {
        self.state.set_config(key, value);
    }

    pub fn get_config(&self, key: &str) -> Option<Value> {
        self.state.get_config(key)
    }

    pub fn set_var(&self, key: &str, value: Value) {
        self.state.set_var(key, value);
    }

    pub fn set_renderer(&self, renderer: Arc<dyn Renderer>) {
        self.state.set_renderer(renderer);
    }

    pub fn set_session_store(&self, store: Option<Arc<dyn SessionStore>>) {
        self.state.set_session_store(store);
    }

    /// 让请求走完整个拦截器链，返回待发送的响应缓冲区
    pub fn serve(&self, request: Request) -> ResponseWriter {
        let mut ctx = Context::new(
            &self.interceptors,
            &self.router,
            Arc::clone(&self.state),
            Arc::new(request),
        );
        ctx.invoke();
        ctx.handle_result();
        ctx.into_response()
    }

    /// 所有已注册路由的描述
    pub fn describe(&self) -> Vec<String> {
        self.router.describe()
    }
}

/// 单个控制器方法的映射：方法名，以及可选的显式 HTTP 方法与路径
#[derive(Debug, Clone)]
pub struct Mapping {
    name: String,
    methods: Option<Vec<HttpRequestMethod>>,
    path: Option<String>,
}

impl Mapping {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            methods: None,
            path: None,
        }
    }

    /// 显式指定的方法取代默认的 GET 与 POST
    pub fn methods(mut self, methods: &[HttpRequestMethod]) -> Self {
        self.methods = Some(methods.to_vec());
        self
    }

    /// 显式路径取代默认的 `/name`，可以是正则表达式
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }
}

/// 控制器方法的注册器
pub struct ControllerBuilder<'a, T: Action> {
    app: &'a mut App,
    base: String,
    factory: ActionFactory,
    capabilities: Capabilities,
    names: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Action> ControllerBuilder<'a, T> {
    /// 以默认路径 `/name` 和默认方法 GET、POST 注册
    pub fn map<F, R>(self, name: &str, f: F) -> Self
    where
        F: Fn(&mut T, &mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        self.map_with(Mapping::new(name), f)
    }

    pub fn map_with<F, R>(mut self, mapping: Mapping, f: F) -> Self
    where
        F: Fn(&mut T, &mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let path = mapping.path.unwrap_or_else(|| format!("/{}", mapping.name));
        let methods = mapping.methods.unwrap_or_else(|| DEFAULT_METHODS.to_vec());
        let route = ControllerRoute::new::<T, F, R>(
            short_type_name::<T>(),
            &mapping.name,
            Arc::clone(&self.factory),
            self.capabilities,
            f,
        );
        let pattern = join_path(&self.base, &path);
        self.app.register(&pattern, &methods, Handler::Controller(route));
        self.names.push(mapping.name);
        self
    }

    /// 控制器根路径上的处理方法。已有名为 `index` 的映射时忽略。
    pub fn index<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&mut T, &mut Scope<'_>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        if self.names.iter().any(|n| n == "index") {
            debug!("{}已经映射了index，忽略默认的根路径处理方法", short_type_name::<T>());
            return self;
        }
        let route = ControllerRoute::new::<T, F, R>(
            short_type_name::<T>(),
            "index",
            Arc::clone(&self.factory),
            self.capabilities,
            f,
        );
        let pattern = join_path(&self.base, "/");
        self.app.register(&pattern, &DEFAULT_METHODS, Handler::Controller(route));
        self.names.push("index".to_string());
        self
    }
}
