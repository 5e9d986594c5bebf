// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 渲染模块
//!
//! - [`Renderer`]：渲染器协作者接口，给定模板名（或模板内容）与变量表，产出响应体。
//! - [`TemplateRenderer`]：基于 minijinja 的默认实现，模板源码从 `template_dir` 读取，
//!   由一把互斥锁保护的缓存保存。
//! - [`StaticVersions`]：静态文件版本号，取文件内容 SHA-256 的前 4 位十六进制字符，
//!   用于生成带 `?v=` 参数的静态资源 URL。

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};
use minijinja::{Environment, ErrorKind, Value};
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};

use crate::{exception::Exception, param::XSRF_TAG, util::{join_path, resolve_under}};

/// 模板渲染器
pub trait Renderer: Send + Sync {
    /// 渲染 `template_dir` 下名为 `name` 的模板
    fn render(&self, name: &str, vars: &Map<String, JsonValue>, xsrf_token: Option<&str>) -> Result<String, Exception>;

    /// 渲染给定的模板内容，`name` 仅用于错误信息
    fn render_string(
        &self,
        name: &str,
        content: &str,
        vars: &Map<String, JsonValue>,
        xsrf_token: Option<&str>,
    ) -> Result<String, Exception>;
}

/// 隐藏表单字段形式的 XSRF 令牌
pub fn xsrf_form_html(token: &str) -> String {
    format!(r#"<input type="hidden" name="{}" value="{}" />"#, XSRF_TAG, token)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("渲染缓存锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 静态文件版本号缓存
pub struct StaticVersions {
    root: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl StaticVersions {
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn compute(&self, url: &str) -> Option<String> {
        let path = resolve_under(&self.root, url).ok()?;
        let content = fs::read(path).ok()?;
        let digest = Sha256::digest(&content);
        Some(digest.iter().take(2).map(|b| format!("{:02x}", b)).collect())
    }

    /// 文件的版本号，文件不存在时返回 `None`
    pub fn version(&self, url: &str) -> Option<String> {
        let key = url.trim_start_matches('/').to_string();
        let mut cache = lock(&self.cache);
        if let Some(version) = cache.get(&key) {
            return Some(version.clone());
        }
        let version = self.compute(&key)?;
        cache.insert(key, version.clone());
        Some(version)
    }

    /// 预先计算静态目录下所有文件的版本号，返回文件数
    pub fn cache_all(&self) -> usize {
        let mut files = vec![];
        collect_files(&self.root, &self.root, &mut files);
        let mut count = 0;
        for url in files {
            if let Some(version) = self.compute(&url) {
                lock(&self.cache).insert(url, version);
                count += 1;
            }
        }
        debug!("已缓存{}个静态文件的版本号", count);
        count
    }

    /// 生成静态资源的 URL，启用版本号时附加 `?v=`
    pub fn url(&self, base_path: &str, url: &str, versioned: bool) -> String {
        let joined = join_path(base_path, url);
        if !versioned {
            return joined;
        }
        match self.version(url) {
            Some(version) => format!("{}?v={}", joined, version),
            None => joined,
        }
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files);
        } else if let Ok(relative) = path.strip_prefix(root) {
            if relative.file_name().map_or(false, |n| n == ".DS_Store") {
                continue;
            }
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

/// 模板嵌套 include 的最大深度
const MAX_INCLUDE_DEPTH: usize = 16;

/// 基于 minijinja 的模板渲染器
pub struct TemplateRenderer {
    set: Arc<TemplateSet>,
}

struct TemplateSet {
    dir: PathBuf,
    cache_templates: bool,
    cache: Mutex<HashMap<String, String>>,
    static_versions: Arc<StaticVersions>,
    base_path: String,
    versioned: bool,
}

impl TemplateSet {
    fn source(&self, name: &str) -> Option<String> {
        if self.cache_templates {
            if let Some(source) = lock(&self.cache).get(name) {
                return Some(source.clone());
            }
        }
        let path = resolve_under(&self.dir, name).ok()?;
        let source = fs::read_to_string(path).ok()?;
        if self.cache_templates {
            lock(&self.cache).insert(name.to_string(), source.clone());
        }
        Some(source)
    }

    fn environment(self: &Arc<Self>, context: Value, depth: usize) -> Environment<'static> {
        let mut env = Environment::new();

        let set = Arc::clone(self);
        env.set_loader(move |name: &str| -> Result<Option<String>, minijinja::Error> { Ok(set.source(name)) });

        let set = Arc::clone(self);
        env.add_function("include", move |name: String| -> Result<Value, minijinja::Error> {
            if depth >= MAX_INCLUDE_DEPTH {
                return Err(minijinja::Error::new(
                    ErrorKind::InvalidOperation,
                    "include nested too deeply",
                ));
            }
            let out = set.render_named(&name, context.clone(), depth + 1)?;
            Ok(Value::from_safe_string(out))
        });

        let set = Arc::clone(self);
        env.add_function("static_url", move |url: String| -> String {
            set.static_versions.url(&set.base_path, &url, set.versioned)
        });
        env
    }

    fn render_named(self: &Arc<Self>, name: &str, context: Value, depth: usize) -> Result<String, minijinja::Error> {
        let env = self.environment(context.clone(), depth);
        let template = env.get_template(name)?;
        template.render(context)
    }
}

impl TemplateRenderer {
    pub fn new(
        dir: &str,
        cache_templates: bool,
        static_versions: Arc<StaticVersions>,
        base_path: &str,
        versioned: bool,
    ) -> Self {
        Self {
            set: Arc::new(TemplateSet {
                dir: PathBuf::from(dir),
                cache_templates,
                cache: Mutex::new(HashMap::new()),
                static_versions,
                base_path: base_path.to_string(),
                versioned,
            }),
        }
    }

    /// 已缓存的模板数量
    pub fn cached(&self) -> usize {
        lock(&self.set.cache).len()
    }

    fn context(&self, vars: &Map<String, JsonValue>, xsrf_token: Option<&str>) -> Value {
        let mut context: BTreeMap<String, Value> = vars
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
            .collect();
        context.insert("XsrfName".to_string(), Value::from(XSRF_TAG));
        if let Some(token) = xsrf_token {
            context.insert("XsrfValue".to_string(), Value::from(token));
            context.insert("XsrfFormHtml".to_string(), Value::from_safe_string(xsrf_form_html(token)));
        }
        Value::from_serialize(&context)
    }
}

fn map_error(name: &str, e: minijinja::Error) -> Exception {
    if e.kind() == ErrorKind::TemplateNotFound {
        Exception::TemplateNotFound(name.to_string())
    } else {
        Exception::RenderFailed(e.to_string())
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, name: &str, vars: &Map<String, JsonValue>, xsrf_token: Option<&str>) -> Result<String, Exception> {
        let context = self.context(vars, xsrf_token);
        self.set.render_named(name, context, 0).map_err(|e| map_error(name, e))
    }

    fn render_string(
        &self,
        name: &str,
        content: &str,
        vars: &Map<String, JsonValue>,
        xsrf_token: Option<&str>,
    ) -> Result<String, Exception> {
        let context = self.context(vars, xsrf_token);
        let env = self.set.environment(context.clone(), 0);
        env.render_str(content, context).map_err(|e| map_error(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn vars(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_static_version_is_short_sha256() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("site.css")).unwrap();
        file.write_all(b"body{}").unwrap();

        let versions = StaticVersions::new(dir.path().to_str().unwrap());
        let expected: String = Sha256::digest(b"body{}")
            .iter()
            .take(2)
            .map(|b| format!("{:02x}", b))
            .collect();
        assert_eq!(versions.version("/site.css"), Some(expected.clone()));
        assert_eq!(versions.url("/", "site.css", true), format!("/site.css?v={}", expected));
        assert_eq!(versions.url("/blog", "/site.css", false), "/blog/site.css");
        assert_eq!(versions.version("missing.css"), None);
        assert_eq!(versions.url("/", "missing.css", true), "/missing.css");
    }

    #[test]
    fn test_cache_all_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), "1").unwrap();
        fs::write(dir.path().join("a.txt"), "2").unwrap();
        let versions = StaticVersions::new(dir.path().to_str().unwrap());
        assert_eq!(versions.cache_all(), 2);
    }

    #[test]
    fn test_render_with_include_and_xsrf() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("header.html"), "<h1>{{ title }}</h1>").unwrap();
        fs::write(
            dir.path().join("page.html"),
            "{{ include(\"header.html\") }}{{ XsrfFormHtml }}|{{ XsrfName }}",
        )
        .unwrap();

        let versions = Arc::new(StaticVersions::new("static"));
        let renderer = TemplateRenderer::new(dir.path().to_str().unwrap(), true, versions, "/", false);
        let out = renderer
            .render("page.html", &vars(json!({"title": "Hi"})), Some("tok"))
            .unwrap();
        assert_eq!(
            out,
            "<h1>Hi</h1><input type=\"hidden\" name=\"_xsrf\" value=\"tok\" />|_xsrf"
        );
        assert_eq!(renderer.cached(), 2);
    }

    #[test]
    fn test_render_string_and_missing_template() {
        let versions = Arc::new(StaticVersions::new("static"));
        let renderer = TemplateRenderer::new("no-such-dir", false, versions, "/", false);
        let out = renderer
            .render_string("inline", "{{ static_url(\"a.css\") }} {{ n }}", &vars(json!({"n": 3})), None)
            .unwrap();
        assert_eq!(out, "/a.css 3");
        assert_eq!(
            renderer.render("nope.html", &Map::new(), None),
            Err(Exception::TemplateNotFound("nope.html".to_string()))
        );
    }
}
