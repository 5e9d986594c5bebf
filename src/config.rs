use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

use crate::exception::Exception;

/// 应用运行模式。`Debug` 模式下处理器错误与 panic 信息会直接写回客户端。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Debug,
    Product,
}

/// 服务器级配置，对应 TOML 文件的顶层字段。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_true")]
    local: bool,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_true")]
    recover_panic: bool,
    #[serde(default = "default_true")]
    enable_gzip: bool,
    #[serde(default)]
    enable_brotli: bool,
    #[serde(default = "default_static_extensions_to_gzip")]
    static_extensions_to_gzip: Vec<String>,
    #[serde(default)]
    compress_dynamic: bool,
    #[serde(default = "default_max_request_size")]
    max_request_size: usize,
    #[serde(default)]
    app: AppConfig,
}

/// 应用级配置，对应 TOML 文件中的 `[app]` 表。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default)]
    mode: RunMode,
    #[serde(default = "default_static_dir")]
    static_dir: String,
    #[serde(default = "default_template_dir")]
    template_dir: String,
    #[serde(default = "default_true")]
    session_on: bool,
    #[serde(default = "default_session_timeout")]
    session_timeout: u64,
    #[serde(default = "default_max_upload_size")]
    max_upload_size: usize,
    #[serde(default = "default_true")]
    static_file_version: bool,
    #[serde(default = "default_true")]
    cache_templates: bool,
    #[serde(default = "default_true")]
    check_xsrf: bool,
    #[serde(default = "default_true")]
    form_map_to_struct: bool,
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    7878
}

fn default_cache_size() -> usize {
    64
}

fn default_static_extensions_to_gzip() -> Vec<String> {
    vec![".css".to_string(), ".js".to_string(), ".html".to_string()]
}

fn default_max_request_size() -> usize {
    16 * 1024 * 1024
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_template_dir() -> String {
    "templates".to_string()
}

fn default_session_timeout() -> u64 {
    3600
}

fn default_max_upload_size() -> usize {
    10 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            static_dir: default_static_dir(),
            template_dir: default_template_dir(),
            session_on: true,
            session_timeout: default_session_timeout(),
            max_upload_size: default_max_upload_size(),
            static_file_version: true,
            cache_templates: true,
            check_xsrf: true,
            form_map_to_struct: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            local: true,
            port: default_port(),
            worker_threads: 0,
            cache_size: default_cache_size(),
            recover_panic: true,
            enable_gzip: true,
            enable_brotli: false,
            static_extensions_to_gzip: default_static_extensions_to_gzip(),
            compress_dynamic: false,
            max_request_size: default_max_request_size(),
            app: AppConfig::default(),
        }
    }

    /// 从 TOML 文件加载配置。文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::ConfigUnreadable(format!("{}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::ConfigUnreadable(format!("{}: {}", filename, e)))?;
        Ok(Self::from_toml_str(&str_val))
    }

    pub fn from_toml_str(content: &str) -> Self {
        let mut raw_config: Config = match toml::from_str(content) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置：{}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用静态文件缓存，因此该值将被改为5。");
            raw_config.cache_size = 5;
        }
        raw_config
    }
}

impl Config {
    pub fn local(&self) -> bool {
        self.local
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn recover_panic(&self) -> bool {
        self.recover_panic
    }

    pub fn enable_gzip(&self) -> bool {
        self.enable_gzip
    }

    pub fn enable_brotli(&self) -> bool {
        self.enable_brotli
    }

    pub fn static_extensions_to_gzip(&self) -> &[String] {
        &self.static_extensions_to_gzip
    }

    pub fn compress_dynamic(&self) -> bool {
        self.compress_dynamic
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn with_recover_panic(mut self, on: bool) -> Self {
        self.recover_panic = on;
        self
    }

    pub fn with_gzip(mut self, on: bool) -> Self {
        self.enable_gzip = on;
        self
    }

    pub fn with_brotli(mut self, on: bool) -> Self {
        self.enable_brotli = on;
        self
    }

    pub fn with_compress_dynamic(mut self, on: bool) -> Self {
        self.compress_dynamic = on;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_app(mut self, app: AppConfig) -> Self {
        self.app = app;
        self
    }
}

impl AppConfig {
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn static_dir(&self) -> &str {
        &self.static_dir
    }

    pub fn template_dir(&self) -> &str {
        &self.template_dir
    }

    pub fn session_on(&self) -> bool {
        self.session_on
    }

    pub fn session_timeout(&self) -> u64 {
        self.session_timeout
    }

    pub fn max_upload_size(&self) -> usize {
        self.max_upload_size
    }

    pub fn static_file_version(&self) -> bool {
        self.static_file_version
    }

    pub fn cache_templates(&self) -> bool {
        self.cache_templates
    }

    pub fn check_xsrf(&self) -> bool {
        self.check_xsrf
    }

    pub fn form_map_to_struct(&self) -> bool {
        self.form_map_to_struct
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_static_dir(mut self, dir: &str) -> Self {
        self.static_dir = dir.to_string();
        self
    }

    pub fn with_template_dir(mut self, dir: &str) -> Self {
        self.template_dir = dir.to_string();
        self
    }

    pub fn with_session(mut self, on: bool) -> Self {
        self.session_on = on;
        self
    }

    pub fn with_session_timeout(mut self, secs: u64) -> Self {
        self.session_timeout = secs;
        self
    }

    pub fn with_static_file_version(mut self, on: bool) -> Self {
        self.static_file_version = on;
        self
    }

    pub fn with_cache_templates(mut self, on: bool) -> Self {
        self.cache_templates = on;
        self
    }

    pub fn with_check_xsrf(mut self, on: bool) -> Self {
        self.check_xsrf = on;
        self
    }

    pub fn with_form_binding(mut self, on: bool) -> Self {
        self.form_map_to_struct = on;
        self
    }
}
