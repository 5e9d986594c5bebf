// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};

use super::Interceptor;
use crate::{
    cache::FileCache,
    context::Context,
    param::{mime_for, HttpRequestMethod},
    util::{resolve_under, web_time},
};

/// 超过该大小的文件不进入缓存
const MAX_CACHED_FILE_SIZE: u64 = 4 * 1024 * 1024;

const INDEX_FILES: [&str; 2] = ["index.html", "index.htm"];

/// 静态文件拦截器。
///
/// GET/HEAD 请求的路径若对应静态目录下的普通文件，直接返回文件内容，不再执行后续拦截器与处理器。
/// 否则继续链条；链条结束后没有匹配的路由且响应未写入时，依次尝试该路径下的 `index.html` 与 `index.htm`。
pub struct StaticInterceptor {
    root: PathBuf,
    cache: FileCache,
}

impl StaticInterceptor {
    pub fn new(root: &str, cache_size: usize) -> Self {
        Self {
            root: PathBuf::from(root),
            cache: FileCache::from_capacity(cache_size),
        }
    }

    fn load(&self, path: &Path, id: u128) -> Option<Bytes> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let key = path.to_string_lossy().to_string();
        let modified = metadata.modified().ok();
        if let Some(modified) = modified {
            if let Some(bytes) = self.cache.find(&key, modified) {
                debug!("[ID{}]缓存命中：{}", id, key);
                return Some(bytes);
            }
        }

        let bytes = match fs::read(path) {
            Ok(content) => Bytes::from(content),
            Err(e) => {
                error!("[ID{}]无法读取文件{}：{}", id, key, e);
                return None;
            }
        };
        if let Some(modified) = modified {
            if FileCache::should_cache(metadata.len(), MAX_CACHED_FILE_SIZE) {
                self.cache.push(&key, bytes.clone(), modified);
            }
        }
        Some(bytes)
    }

    /// 把文件写入响应，文件不存在或不是普通文件时返回 `false`
    fn serve(&self, ctx: &mut Context<'_>, path: &Path) -> bool {
        let id = ctx.id();
        let Some(content) = self.load(path, id) else {
            return false;
        };
        let range = ctx.request().range();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();

        let response = ctx.response_mut();
        response.set_header("Content-Type", mime_for(extension));
        response.set_header("Accept-Ranges", "bytes");
        if let Some(modified) = modified {
            response.set_header("Last-Modified", &web_time(&DateTime::<Utc>::from(modified)));
        }

        let file_size = content.len() as u64;
        match range {
            Some((start, end)) => {
                let end = end.unwrap_or(file_size.saturating_sub(1));
                if start >= file_size || end >= file_size || start > end {
                    warn!(
                        "[ID{}]无效的Range请求: start={}, end={}, file_size={}",
                        id, start, end, file_size
                    );
                    response.set_header("Content-Range", &format!("bytes */{}", file_size));
                    response.write_header(416);
                    return true;
                }
                debug!("[ID{}]处理Range请求: bytes {}-{}/{}", id, start, end, file_size);
                response.set_header("Content-Range", &format!("bytes {}-{}/{}", start, end, file_size));
                response.write_header(206);
                response.write(&content[start as usize..=end as usize]);
            }
            None => {
                response.write_header(200);
                response.write(&content);
            }
        }
        debug!("[ID{}]返回静态文件{}", id, path.display());
        true
    }
}

impl Interceptor for StaticInterceptor {
    fn intercept(&self, ctx: &mut Context<'_>) {
        let method = ctx.request().method();
        if method != HttpRequestMethod::Get && method != HttpRequestMethod::Head {
            ctx.invoke();
            return;
        }

        let full = match resolve_under(&self.root, ctx.request().path()) {
            Ok(full) => full,
            Err(e) => {
                warn!("[ID{}]请求的路径{}无法映射到静态目录：{}", ctx.id(), ctx.request().path(), e);
                ctx.invoke();
                return;
            }
        };
        if self.serve(ctx, &full) {
            return;
        }

        ctx.invoke();

        // 只有未匹配路由的请求才回退到 index 文件
        if ctx.response().written() || ctx.matched() {
            return;
        }
        for index in INDEX_FILES {
            if self.serve(ctx, &full.join(index)) {
                return;
            }
        }
    }
}
