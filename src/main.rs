// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # webframe 启动程序
//!
//! 初始化日志、加载配置、装配示例应用，并在 Tokio 运行时上启动服务器。
//! 后台任务读取标准输入，提供 `stop`、`status`、`help` 三个管理指令。

use std::process;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde_json::json;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
};

use webframe::{
    bind::Bind, form_struct, Action, ActionBase, ActionLogger, App, Before, Config, HttpRequestMethod, Mapping,
    Scope, Server, ServerHandle, WantsLogger,
};

/// 示例控制器：表单绑定、日志注入与 Before 钩子
#[derive(Default)]
struct UserAction {
    base: ActionBase,
    logger: Option<ActionLogger>,
    id: i64,
    name: String,
}

form_struct!(UserAction { id, name });

impl Before for UserAction {
    fn before(&mut self, struct_name: &str, action_name: &str) -> bool {
        // Before 先于注入执行，此时还没有日志句柄
        debug!("进入{}.{}", struct_name, action_name);
        true
    }
}

impl WantsLogger for UserAction {
    fn set_logger(&mut self, logger: ActionLogger) {
        self.logger = Some(logger);
    }
}

impl Action for UserAction {
    fn base_mut(&mut self) -> Option<&mut ActionBase> {
        Some(&mut self.base)
    }

    fn as_before(&mut self) -> Option<&mut dyn Before> {
        Some(self)
    }

    fn as_bind(&mut self) -> Option<&mut dyn Bind> {
        Some(self)
    }

    fn as_logger(&mut self) -> Option<&mut dyn WantsLogger> {
        Some(self)
    }
}

impl UserAction {
    fn show(&mut self, scope: &mut Scope<'_>) -> String {
        if let Some(logger) = &self.logger {
            logger.debug(&format!("查看用户{}", scope.param(0).unwrap_or_default()));
        }
        format!("user {}", scope.param(0).unwrap_or_default())
    }

    fn save(&mut self, scope: &mut Scope<'_>) -> Result<(), serde_json::Error> {
        scope.serve_json(&json!({ "id": self.id, "name": self.name }))
    }
}

fn build_app(config: &Config) -> App {
    let mut app = App::new("root", "/", config);
    app.set_var("title", json!("webframe"));

    app.get("/", |scope: &mut Scope<'_>| scope.render("index.html", json!({})));
    app.get("/api/ping", |scope: &mut Scope<'_>| {
        let ip = scope.ip();
        scope.disable_http_cache();
        scope.serve_json(&json!({ "pong": true, "ip": ip }))
    });
    app.auto_controller::<UserAction>()
        .map_with(
            Mapping::new("show").methods(&[HttpRequestMethod::Get]).path(r"/(\d+)"),
            UserAction::show,
        )
        .map_with(Mapping::new("save").methods(&[HttpRequestMethod::Post]), UserAction::save);

    for line in app.describe() {
        info!("路由：{}", line);
    }
    app
}

/// 管理控制台：读取标准输入中的指令
async fn console(handle: ServerHandle) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                handle.stop();
                println!("停机指令已激活，服务器将停止接受新的连接...");
                break;
            }
            "help" => {
                println!("== webframe Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("===================");
            }
            "status" => {
                println!("== webframe 状态 ==");
                println!("当前活跃连接数: {}", handle.active_connections());
                println!("===================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

fn main() {
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
    }

    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("配置文件已载入");

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads().max(1))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let mut server = Server::new(config.clone());
    server.add_app(build_app(&config));
    let handle = server.handle();

    runtime.block_on(async move {
        tokio::spawn(console(handle));
        if let Err(e) = server.run().await {
            error!("服务器启动失败：{}", e);
            process::exit(1);
        }
    });
    runtime.shutdown_timeout(Duration::from_secs(1));
    info!("服务器已停止");
}
