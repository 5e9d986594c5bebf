// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 路由表模块
//!
//! 路由表由两部分组成：
//! - **精确匹配表**：不含正则元字符的路径，按 `路径 -> 方法 -> 路由` 存储，O(1) 查找。
//! - **正则路由列表**：按注册顺序线性扫描，要求整串匹配，第一个方法匹配的路由胜出。
//!
//! 路由表在启动阶段构建完成，服务期间只读，可在并发请求间无锁共享。

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use regex::Regex;

use crate::{
    action::Handler,
    exception::Exception,
    param::HttpRequestMethod,
    util::normalize_path,
};

/// 一条已注册的路由
pub struct Route {
    pattern: String,
    regex: Option<Regex>,
    methods: Vec<HttpRequestMethod>,
    handler: Handler,
}

impl Route {
    /// 注册时使用的路径模式（已规范化）
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn methods(&self) -> &[HttpRequestMethod] {
        &self.methods
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn is_literal(&self) -> bool {
        self.regex.is_none()
    }

    fn accepts(&self, method: HttpRequestMethod) -> bool {
        self.methods.contains(&method)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("handler", &self.handler.describe())
            .finish()
    }
}

/// 正则表达式中在字符类之外仍有特殊含义的字符
const REGEX_META: &str = r"\.+*?()|[]{}^$";

/// 不含任何正则元字符的路径按字面量处理
fn is_literal_pattern(pattern: &str) -> bool {
    !pattern.chars().any(|c| REGEX_META.contains(c))
}

#[derive(Default)]
pub struct Router {
    exact: HashMap<String, HashMap<HttpRequestMethod, Arc<Route>>>,
    regex: Vec<Arc<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册路由。
    ///
    /// 纯字面量路径进入精确匹配表，同一路径与方法重复注册时后注册者覆盖先注册者；
    /// 其余路径编译为整串锚定的正则表达式并追加到正则列表末尾。
    pub fn add(
        &mut self,
        pattern: &str,
        methods: &[HttpRequestMethod],
        handler: Handler,
    ) -> Result<(), Exception> {
        let pattern = normalize_path(pattern);
        let mut accepted: Vec<HttpRequestMethod> = methods.iter().map(|m| m.for_matching()).collect();
        accepted.sort();
        accepted.dedup();

        if is_literal_pattern(&pattern) {
            let route = Arc::new(Route {
                pattern: pattern.clone(),
                regex: None,
                methods: accepted.clone(),
                handler,
            });
            let by_method = self.exact.entry(pattern.clone()).or_default();
            for method in accepted {
                if by_method.insert(method, Arc::clone(&route)).is_some() {
                    warn!("路由{} {}被重复注册，后注册的处理器生效", method, pattern);
                }
            }
            debug!("注册精确路由：{}", pattern);
            return Ok(());
        }

        let compiled = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Exception::InvalidRoutePattern(pattern.clone(), e.to_string()))?;
        self.regex.push(Arc::new(Route {
            pattern: pattern.clone(),
            regex: Some(compiled),
            methods: accepted,
            handler,
        }));
        debug!("注册正则路由：{}", pattern);
        Ok(())
    }

    /// 查找请求对应的路由及捕获参数。HEAD 请求按 GET 匹配。
    pub fn find(&self, path: &str, method: HttpRequestMethod) -> Option<(Arc<Route>, Vec<String>)> {
        let path = normalize_path(path);
        let method = method.for_matching();

        if let Some(route) = self.exact.get(&path).and_then(|m| m.get(&method)) {
            return Some((Arc::clone(route), vec![]));
        }

        for route in &self.regex {
            if !route.accepts(method) {
                continue;
            }
            let Some(regex) = &route.regex else {
                continue;
            };
            if let Some(captures) = regex.captures(&path) {
                let args = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((Arc::clone(route), args));
            }
        }
        None
    }

    /// 已注册路由的数量（精确路由按路径与方法的组合计数）
    pub fn len(&self) -> usize {
        self.exact.values().map(HashMap::len).sum::<usize>() + self.regex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有路由的 `METHOD pattern` 描述，按字典序排列
    pub fn describe(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .exact
            .iter()
            .flat_map(|(path, by_method)| {
                by_method
                    .iter()
                    .map(move |(method, route)| format!("{} {} -> {}", method, path, route.handler.describe()))
            })
            .collect();
        lines.sort();
        for route in &self.regex {
            let methods: Vec<String> = route.methods.iter().map(|m| m.to_string()).collect();
            lines.push(format!(
                "{} {} -> {}",
                methods.join("|"),
                route.pattern,
                route.handler.describe()
            ));
        }
        lines
    }
}
