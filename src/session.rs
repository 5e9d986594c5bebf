// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Session 模块
//!
//! 框架只依赖 [`SessionStore`] trait：给定请求与响应缓冲区，返回本次请求的 Session 句柄。
//! 内置的 [`MemoryStore`] 以 Cookie 中的会话 ID 为键，把数据保存在进程内存中，
//! 超过 `session_timeout` 未访问的会话会被清理。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde_json::Value;

use crate::{
    exception::Exception,
    param::SESSION_COOKIE,
    request::Request,
    response::{Cookie, ResponseWriter},
};

type SessionData = Arc<Mutex<HashMap<String, Value>>>;

fn lock_data(data: &SessionData) -> MutexGuard<'_, HashMap<String, Value>> {
    match data.lock() {
        Ok(lock) => lock,
        Err(poisoned) => {
            warn!("Session数据锁被污染，恢复并继续");
            poisoned.into_inner()
        }
    }
}

/// 一个会话的句柄。克隆得到的句柄共享同一份数据。
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    data: SessionData,
}

impl Session {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        lock_data(&self.data).get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        lock_data(&self.data).insert(key.to_string(), value);
    }

    pub fn delete(&self, key: &str) -> Option<Value> {
        lock_data(&self.data).remove(key)
    }
}

/// Session 存储
pub trait SessionStore: Send + Sync {
    fn session(&self, request: &Request, response: &mut ResponseWriter) -> Result<Session, Exception>;
}

struct Entry {
    session: Session,
    last_access: Instant,
}

/// 进程内存中的 Session 存储
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Entry>>,
    timeout: Duration,
}

impl MemoryStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.sessions.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("Session存储锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清理超时的会话，返回清理的数量
    pub fn gc(&self) -> usize {
        let timeout = self.timeout;
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_access.elapsed() < timeout);
        before - sessions.len()
    }
}

impl SessionStore for MemoryStore {
    fn session(&self, request: &Request, response: &mut ResponseWriter) -> Result<Session, Exception> {
        let timeout = self.timeout;
        let mut sessions = self.lock();
        if let Some(id) = request.cookie(SESSION_COOKIE) {
            if let Some(entry) = sessions.get_mut(id) {
                if entry.last_access.elapsed() < timeout {
                    entry.last_access = Instant::now();
                    return Ok(entry.session.clone());
                }
                debug!("[ID{}]会话{}已过期", request.id(), id);
            }
        }

        sessions.retain(|_, entry| entry.last_access.elapsed() < timeout);
        let id = uuid::Uuid::new_v4().simple().to_string();
        let session = Session::new(&id);
        sessions.insert(
            id.clone(),
            Entry {
                session: session.clone(),
                last_access: Instant::now(),
            },
        );
        response.set_cookie(&Cookie::new(SESSION_COOKIE, &id).http_only());
        debug!("[ID{}]创建新会话{}", request.id(), id);
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(cookie: Option<&str>) -> Request {
        let raw = match cookie {
            Some(c) => format!("GET / HTTP/1.1\r\nCookie: {}={}\r\n\r\n", SESSION_COOKIE, c),
            None => "GET / HTTP/1.1\r\n\r\n".to_string(),
        };
        Request::try_from(raw.as_bytes(), 0).unwrap()
    }

    #[test]
    fn test_session_handle_shares_data() {
        let session = Session::new("abc");
        let other = session.clone();
        session.set("user", Value::from("alice"));
        assert_eq!(other.get("user"), Some(Value::from("alice")));
        assert_eq!(other.delete("user"), Some(Value::from("alice")));
        assert_eq!(session.get("user"), None);
    }

    #[test]
    fn test_memory_store_creates_and_reuses() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let mut response = ResponseWriter::new();
        let session = store.session(&request_with_cookie(None), &mut response).unwrap();
        session.set("n", Value::from(1));

        let set_cookie = response.header("Set-Cookie").unwrap().to_string();
        assert!(set_cookie.starts_with(&format!("{}={}", SESSION_COOKIE, session.id())));

        let mut response = ResponseWriter::new();
        let again = store
            .session(&request_with_cookie(Some(session.id())), &mut response)
            .unwrap();
        assert_eq!(again.id(), session.id());
        assert_eq!(again.get("n"), Some(Value::from(1)));
        assert!(response.header("Set-Cookie").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_memory_store_expires() {
        let store = MemoryStore::new(Duration::from_millis(0));
        let mut response = ResponseWriter::new();
        let first = store.session(&request_with_cookie(None), &mut response).unwrap();
        let second = store
            .session(&request_with_cookie(Some(first.id())), &mut ResponseWriter::new())
            .unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(store.gc(), 1);
    }
}
