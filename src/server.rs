// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器
//!
//! 基于 Tokio 的 TCP 接入层。每个连接在独立的任务中读取并解析请求，
//! 按请求路径选出对应的应用，再把阻塞的拦截器链放到 `spawn_blocking` 线程中执行，
//! 最后把响应缓冲区一次性写回客户端并关闭连接。

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
};

use crate::{
    app::App,
    config::Config,
    exception::Exception,
    request::{expected_length, Request},
    response::ResponseWriter,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("服务器状态锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 服务器的运行状态：停机标志与活跃连接数，可以在控制台等其他任务中持有
#[derive(Clone, Default)]
pub struct ServerHandle {
    shutdown_flag: Arc<Mutex<bool>>,
    active_connection: Arc<Mutex<u32>>,
    notify: Arc<Notify>,
}

impl ServerHandle {
    /// 发出停机信号，接入循环会在当前等待结束后退出
    pub fn stop(&self) {
        *lock(&self.shutdown_flag) = true;
        self.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        *lock(&self.shutdown_flag)
    }

    pub fn active_connections(&self) -> u32 {
        *lock(&self.active_connection)
    }

    fn connection_opened(&self) {
        *lock(&self.active_connection) += 1;
    }

    fn connection_closed(&self) {
        let mut count = lock(&self.active_connection);
        *count = count.saturating_sub(1);
    }
}

/// 以基础路径区分的多个应用
pub struct Server {
    config: Arc<Config>,
    apps: Vec<Arc<App>>,
    handle: ServerHandle,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            apps: vec![],
            handle: ServerHandle::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// 添加应用；基础路径相同的旧应用被替换
    pub fn add_app(&mut self, app: App) -> &mut Self {
        if let Some(pos) = self.apps.iter().position(|a| a.base_path() == app.base_path()) {
            warn!("基础路径{}上的应用{}被替换", app.base_path(), self.apps[pos].name());
            self.apps.remove(pos);
        }
        info!("应用{}挂载在{}", app.name(), app.base_path());
        self.apps.push(Arc::new(app));
        self
    }

    pub fn apps(&self) -> &[Arc<App>] {
        &self.apps
    }

    /// 选出处理该路径的应用：第一个基础路径是请求路径前缀的非根应用，否则为根应用
    pub fn dispatch(&self, path: &str) -> Option<&Arc<App>> {
        self.apps
            .iter()
            .filter(|app| app.base_path() != "/")
            .find(|app| {
                let base = app.base_path();
                path == base
                    || path
                        .strip_prefix(base)
                        .map_or(false, |rest| rest.starts_with('/'))
            })
            .or_else(|| self.apps.iter().find(|app| app.base_path() == "/"))
    }

    /// 在当前线程中处理一个已解析的请求
    pub fn process(&self, request: Request) -> ResponseWriter {
        match self.dispatch(request.path()) {
            Some(app) => app.serve(request),
            None => {
                warn!("[ID{}]没有应用处理路径{}", request.id(), request.path());
                let mut response = ResponseWriter::for_request(&request);
                response.error(404, "Not Found");
                response
            }
        }
    }

    /// 按配置绑定地址并开始服务
    pub async fn run(self) -> Result<(), Exception> {
        let address = match self.config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        let socket = SocketAddrV4::new(address, self.config.port());
        info!("服务端将在{}上监听Socket连接", socket);
        let listener = TcpListener::bind(socket).await.map_err(|e| {
            error!("无法绑定端口：{}，错误：{}", self.config.port(), e);
            Exception::BindFailed(format!("{}: {}", socket, e))
        })?;
        info!("端口{}绑定完成", self.config.port());
        self.serve(listener).await;
        Ok(())
    }

    /// 在给定的监听器上运行接入循环，直到收到停机信号
    pub async fn serve(self, listener: TcpListener) {
        let handle = self.handle.clone();
        let server = Arc::new(self);
        let mut id: u128 = 0;

        loop {
            if handle.is_stopped() {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }

            let (stream, addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!("接受连接失败：{}", e);
                        continue;
                    }
                },
                _ = handle.notify.notified() => continue,
            };
            debug!("[ID{}]TCP连接已建立：{}", id, addr);

            let server = Arc::clone(&server);
            let handle = handle.clone();
            tokio::spawn(async move {
                handle.connection_opened();
                handle_connection(server, stream, addr, id).await;
                handle.connection_closed();
            });
            id += 1;
        }
    }
}

/// 读取完整的请求报文。请求超过上限时返回 `PayloadTooLarge`。
async fn read_request(stream: &mut TcpStream, max_size: usize, id: u128) -> Result<Vec<u8>, Exception> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = vec![0u8; 4096];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return Err(Exception::MalformedRequest);
            }
        };
        if n == 0 {
            return Ok(buffer);
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > max_size {
            return Err(Exception::PayloadTooLarge);
        }
        if let Some(total) = expected_length(&buffer) {
            if total > max_size {
                return Err(Exception::PayloadTooLarge);
            }
            if buffer.len() >= total {
                return Ok(buffer);
            }
        }
    }
}

async fn write_response(stream: &mut TcpStream, response: ResponseWriter, id: u128) {
    let bytes = response.flush();
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}

async fn handle_connection(server: Arc<Server>, mut stream: TcpStream, addr: SocketAddr, id: u128) {
    let buffer = match read_request(&mut stream, server.config.max_request_size(), id).await {
        Ok(buffer) if buffer.is_empty() => return,
        Ok(buffer) => buffer,
        Err(e) => {
            warn!("[ID{}]读取请求失败：{}", id, e);
            let mut response = ResponseWriter::new();
            response.error(e.status_code(), &e.to_string());
            write_response(&mut stream, response, id).await;
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕", id);

    let mut request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            let mut response = ResponseWriter::new();
            response.error(e.status_code(), &e.to_string());
            write_response(&mut stream, response, id).await;
            return;
        }
    };
    request.set_remote_addr(addr);

    let worker = Arc::clone(&server);
    let response = match tokio::task::spawn_blocking(move || worker.process(request)).await {
        Ok(response) => response,
        Err(e) => {
            error!("[ID{}]处理请求的任务异常退出：{}", id, e);
            let mut response = ResponseWriter::new();
            response.error(500, "Internal Server Error");
            response
        }
    };
    write_response(&mut stream, response, id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, scope::Scope};

    fn config() -> Config {
        Config::new().with_app(
            AppConfig::default()
                .with_static_dir("no-such-static")
                .with_template_dir("no-such-templates")
                .with_check_xsrf(false)
                .with_session(false)
                .with_static_file_version(false),
        )
    }

    fn request(path: &str) -> Request {
        Request::try_from(format!("GET {} HTTP/1.1\r\n\r\n", path).as_bytes(), 0).unwrap()
    }

    #[test]
    fn test_dispatch_by_base_path() {
        let config = config();
        let mut root = App::new("root", "/", &config);
        root.get("/", |_: &mut Scope<'_>| "root");
        root.get("/blogger", |_: &mut Scope<'_>| "root blogger");
        let mut blog = App::new("blog", "/blog", &config);
        blog.get("/", |_: &mut Scope<'_>| "blog");

        let mut server = Server::new(config);
        server.add_app(root).add_app(blog);

        assert_eq!(server.dispatch("/blog/post").map(|a| a.name()), Some("blog"));
        assert_eq!(server.dispatch("/blog").map(|a| a.name()), Some("blog"));
        assert_eq!(server.dispatch("/blogger").map(|a| a.name()), Some("root"));
        assert_eq!(server.process(request("/blog")).body(), b"blog");
        assert_eq!(server.process(request("/blogger")).body(), b"root blogger");
    }

    #[test]
    fn test_no_app_is_404() {
        let server = Server::new(config());
        assert_eq!(server.process(request("/")).status_code(), 404);
    }

    #[test]
    fn test_handle_counts_and_stop() {
        let handle = ServerHandle::default();
        handle.connection_opened();
        handle.connection_opened();
        handle.connection_closed();
        assert_eq!(handle.active_connections(), 1);
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
    }
}
