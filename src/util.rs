use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::exception::Exception;

/// 以 RFC 1123 格式输出 HTTP 日期，时区固定写作 GMT
pub fn web_time(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// 规范化路由路径：去掉结尾的 `/`，空路径视为 `/`
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// 拼接 URL 路径片段，保证片段之间恰好一个 `/`
pub fn join_path(base: &str, sub: &str) -> String {
    let base = base.trim_end_matches('/');
    let sub = sub.trim_start_matches('/');
    if sub.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, sub)
    }
}

/// 将 `user[name][first]` 形式的表单键拆分为 `["user", "name", "first"]`。
///
/// 不含方括号的键原样返回单个片段；括号不配对或出现空片段时返回错误。
pub fn split_bracket_key(key: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let (head, mut rest) = match key.find('[') {
        Some(idx) => (&key[..idx], &key[idx..]),
        None => {
            if key.contains(']') {
                return Err(format!("unbalanced ']' in {}", key));
            }
            return Ok(vec![key.to_string()]);
        }
    };
    if head.is_empty() || head.contains(']') {
        return Err(format!("unknown character in {}", key));
    }
    parts.push(head.to_string());
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(format!("unexpected {:?} in {}", rest, key));
        }
        let close = rest
            .find(']')
            .ok_or_else(|| format!("unclosed '[' in {}", key))?;
        let segment = &rest[1..close];
        if segment.is_empty() || segment.contains('[') {
            return Err(format!("empty segment in {}", key));
        }
        parts.push(segment.to_string());
        rest = &rest[close + 1..];
    }
    Ok(parts)
}

/// 把表单键拆成字段路径：含 `.` 时按点分隔，否则按方括号语法拆分
pub fn split_form_key(key: &str) -> Result<Vec<String>, String> {
    if key.contains('.') {
        let names: Vec<String> = key.split('.').map(str::to_string).collect();
        if names.iter().any(String::is_empty) {
            return Err(format!("empty segment in {}", key));
        }
        Ok(names)
    } else {
        split_bracket_key(key)
    }
}

/// 首字母大写，其余保持不变。用于根据控制器方法名生成 `Before/After` 钩子中的动作名。
pub fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// 由类型名推导控制器的默认挂载路径：去掉模块前缀与 `Action` 后缀并转为小写
pub fn controller_path(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    let short = short.strip_suffix("Action").unwrap_or(short);
    format!("/{}", short.to_lowercase())
}

/// 将请求路径安全地映射到根目录下，拒绝任何 `..` 或绝对路径成分
pub fn resolve_under(root: &Path, request_path: &str) -> Result<PathBuf, Exception> {
    let relative = request_path.trim_start_matches('/');
    let mut full = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => full.push(part),
            Component::CurDir => {}
            _ => return Err(Exception::InvalidPath),
        }
    }
    Ok(full)
}
