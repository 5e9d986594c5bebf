// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了框架在启动与请求处理生命周期中可能出现的各类异常。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析、路由注册、文件系统、配置加载以及模板渲染错误。
//! - **语义映射**：请求级的变体都对应一个 HTTP 状态码，见 [`Exception::status_code`]。
//! - **处理器错误不在此列**：处理器返回的错误以 [`crate::reply::Reply`] 的形式在管线中流动。

use std::fmt;

/// 框架内部发生的异常类型。
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 客户端使用了框架不支持的 HTTP 方法。
    UnSupportedRequestMethod,
    /// 客户端使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求行或请求头格式不正确。
    MalformedRequest,
    /// 请求体超出了配置允许的上限。
    PayloadTooLarge,
    /// 在指定的资源根目录下未找到所请求的文件。
    FileNotFound,
    /// 请求的路径格式非法或包含越权尝试（如目录遍历）。
    InvalidPath,
    /// 路由模式无法编译为正则表达式：(模式, 原因)。
    InvalidRoutePattern(String, String),
    /// 配置文件无法读取。
    ConfigUnreadable(String),
    /// 模板文件不存在。
    TemplateNotFound(String),
    /// 模板渲染失败。
    RenderFailed(String),
    /// Session 存储无法完成读写。
    SessionStoreFailure(String),
    /// 监听地址无法绑定。
    BindFailed(String),
}

use Exception::*;

impl Exception {
    /// 请求级异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest | InvalidPath => 400,
            UnSupportedRequestMethod => 405,
            UnsupportedHttpVersion => 505,
            PayloadTooLarge => 413,
            FileNotFound | TemplateNotFound(_) => 404,
            InvalidRoutePattern(..)
            | ConfigUnreadable(_)
            | RenderFailed(_)
            | SessionStoreFailure(_)
            | BindFailed(_) => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            UnSupportedRequestMethod => write!(f, "Unsupported request method"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            MalformedRequest => write!(f, "Malformed HTTP request"),
            PayloadTooLarge => write!(f, "Request payload too large"),
            FileNotFound => write!(f, "File not found (404)"),
            InvalidPath => write!(f, "Invalid path (400)"),
            InvalidRoutePattern(pattern, reason) => {
                write!(f, "Error in route regex {:?}: {}", pattern, reason)
            }
            ConfigUnreadable(reason) => write!(f, "Config file unreadable: {}", reason),
            TemplateNotFound(name) => write!(f, "No template file {} found", name),
            RenderFailed(reason) => write!(f, "Render failed: {}", reason),
            SessionStoreFailure(reason) => write!(f, "Session store failure: {}", reason),
            BindFailed(reason) => write!(f, "Failed to bind listener: {}", reason),
        }
    }
}

impl std::error::Error for Exception {}
