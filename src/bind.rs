// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单绑定模块
//!
//! 把请求表单中的字段写入控制器结构体。表单键支持两种路径写法：
//! `user.profile.age` 与 `user[profile][age]`，路径中的每一段与字段名大小写不敏感地匹配。
//!
//! 绑定是逐字段尽力而为的：某个字段转换失败只记录日志并保持默认值，
//! 不会让整个请求失败。XSRF 令牌字段总是被跳过。
//!
//! 结构体通过 [`form_struct!`](crate::form_struct) 宏声明可绑定字段，
//! 标量类型通过 [`FromFormValue`] 从字符串转换。

use std::error::Error;
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use log::{debug, warn};

use crate::{param::XSRF_TAG, request::Form, util::split_form_key};

#[derive(Debug, Clone, PartialEq)]
pub enum BindError {
    /// 路径指向一个不存在的字段
    UnknownField(String),
    /// 路径在标量字段之后还有多余的层级
    NotAStruct(String),
    /// 路径为空，无法确定目标字段
    EmptyPath,
    /// 值无法转换为目标类型：(值, 原因)
    Parse(String, String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::UnknownField(name) => write!(f, "unknown field {}", name),
            BindError::NotAStruct(name) => write!(f, "{} is not a struct", name),
            BindError::EmptyPath => write!(f, "empty field path"),
            BindError::Parse(value, reason) => write!(f, "cannot convert {:?}: {}", value, reason),
        }
    }
}

impl Error for BindError {}

/// 可以接收表单值的目标
pub trait Bind {
    /// `path` 为剩余的字段路径，`values` 为该表单键的全部值
    fn bind(&mut self, path: &[String], values: &[String]) -> Result<(), BindError>;
}

/// 从单个表单字符串转换而来的类型
pub trait FromFormValue: Sized {
    fn from_form_value(value: &str) -> Result<Self, String>;
}

/// 标量字段的绑定：路径必须已经走完，取第一个值转换后写入
pub fn bind_value<T: FromFormValue>(target: &mut T, path: &[String], values: &[String]) -> Result<(), BindError> {
    if let Some(extra) = path.first() {
        return Err(BindError::NotAStruct(extra.clone()));
    }
    let Some(raw) = values.first() else {
        return Ok(());
    };
    *target = T::from_form_value(raw).map_err(|reason| BindError::Parse(raw.clone(), reason))?;
    Ok(())
}

/// 表单键与字段名是否匹配：忽略大小写与下划线
pub fn field_matches(key: &str, field: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect()
    };
    normalize(key) == normalize(field)
}

/// 把整个表单绑定到目标上，返回成功绑定的字段数
pub fn bind_form(target: &mut dyn Bind, form: &Form, id: u128) -> usize {
    let mut bound = 0;
    for (key, values) in form.iter() {
        if key.is_empty() || key == XSRF_TAG {
            continue;
        }
        let path = match split_form_key(key) {
            Ok(path) => path,
            Err(e) => {
                warn!("[ID{}]无法识别的表单键{}：{}", id, key, e);
                continue;
            }
        };
        match target.bind(&path, values) {
            Ok(()) => bound += 1,
            Err(BindError::UnknownField(name)) => {
                debug!("[ID{}]表单键{}没有对应的字段{}", id, key, name)
            }
            Err(e) => warn!("[ID{}]绑定表单字段{}失败：{}", id, key, e),
        }
    }
    bound
}

/// 为实现了 [`FromFormValue`] 的叶子类型生成 [`Bind`] 实现
#[macro_export]
macro_rules! bind_from_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl $crate::bind::Bind for $t {
                fn bind(
                    &mut self,
                    path: &[String],
                    values: &[String],
                ) -> Result<(), $crate::bind::BindError> {
                    $crate::bind::bind_value(self, path, values)
                }
            }
        )*
    };
}

/// 声明结构体中可以从表单绑定的字段，并生成 [`Bind`] 实现
///
/// ```ignore
/// form_struct!(User { id, name, profile });
/// ```
#[macro_export]
macro_rules! form_struct {
    ($t:ty { $($field:ident),* $(,)? }) => {
        impl $crate::bind::Bind for $t {
            fn bind(
                &mut self,
                path: &[String],
                values: &[String],
            ) -> Result<(), $crate::bind::BindError> {
                let Some((head, rest)) = path.split_first() else {
                    return Err($crate::bind::BindError::EmptyPath);
                };
                $(
                    if $crate::bind::field_matches(head, stringify!($field)) {
                        return $crate::bind::Bind::bind(&mut self.$field, rest, values);
                    }
                )*
                Err($crate::bind::BindError::UnknownField(head.clone()))
            }
        }
    };
}

impl FromFormValue for String {
    fn from_form_value(value: &str) -> Result<Self, String> {
        Ok(value.to_string())
    }
}

impl FromFormValue for bool {
    fn from_form_value(value: &str) -> Result<Self, String> {
        Ok(value != "false" && value != "0")
    }
}

macro_rules! from_str_value {
    ($($t:ty),*) => {
        $(
            impl FromFormValue for $t {
                fn from_form_value(value: &str) -> Result<Self, String> {
                    value.trim().parse::<$t>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

from_str_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

const TIME_WITH_ZONE: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
const TIME_PLAIN: &str = "%Y-%m-%d %H:%M:%S";
const DATE_ONLY: &str = "%Y-%m-%d";

impl FromFormValue for DateTime<FixedOffset> {
    fn from_form_value(value: &str) -> Result<Self, String> {
        if let Ok(t) = DateTime::parse_from_str(value, TIME_WITH_ZONE) {
            return Ok(t);
        }
        let naive = NaiveDateTime::from_form_value(value)?;
        let utc = FixedOffset::east_opt(0).ok_or_else(|| "invalid offset".to_string())?;
        naive
            .and_local_timezone(utc)
            .single()
            .ok_or_else(|| format!("unsupported time format {}", value))
    }
}

impl FromFormValue for NaiveDateTime {
    fn from_form_value(value: &str) -> Result<Self, String> {
        if let Ok(t) = DateTime::parse_from_str(value, TIME_WITH_ZONE) {
            return Ok(t.naive_local());
        }
        if let Ok(t) = NaiveDateTime::parse_from_str(value, TIME_PLAIN) {
            return Ok(t);
        }
        NaiveDate::parse_from_str(value, DATE_ONLY)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| format!("unsupported time format {}", value))
    }
}

impl FromFormValue for NaiveDate {
    fn from_form_value(value: &str) -> Result<Self, String> {
        NaiveDateTime::from_form_value(value).map(|t| t.date())
    }
}

bind_from_value!(
    String,
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    NaiveDateTime,
    NaiveDate,
    DateTime<FixedOffset>,
);

/// 多值字段：所有值都转换成功才写入
impl<T: FromFormValue> Bind for Vec<T> {
    fn bind(&mut self, path: &[String], values: &[String]) -> Result<(), BindError> {
        if let Some(extra) = path.first() {
            return Err(BindError::NotAStruct(extra.clone()));
        }
        let parsed = values
            .iter()
            .map(|v| T::from_form_value(v).map_err(|reason| BindError::Parse(v.clone(), reason)))
            .collect::<Result<Vec<T>, BindError>>()?;
        *self = parsed;
        Ok(())
    }
}

/// 可选字段按需分配
impl<T: Bind + Default> Bind for Option<T> {
    fn bind(&mut self, path: &[String], values: &[String]) -> Result<(), BindError> {
        let mut inner = self.take().unwrap_or_default();
        let result = inner.bind(path, values);
        *self = Some(inner);
        result
    }
}

impl<T: Bind + ?Sized> Bind for Box<T> {
    fn bind(&mut self, path: &[String], values: &[String]) -> Result<(), BindError> {
        (**self).bind(path, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[derive(Default, Debug)]
    struct Profile {
        age: u8,
        score: f64,
    }
    form_struct!(Profile { age, score });

    #[derive(Default, Debug)]
    struct User {
        id: i64,
        name: String,
        active: bool,
        tags: Vec<String>,
        profile: Option<Profile>,
        born: NaiveDate,
    }
    form_struct!(User { id, name, active, tags, profile, born });

    fn form(pairs: &[(&str, &str)]) -> Form {
        let mut form = Form::new();
        for (k, v) in pairs {
            form.append(k, v);
        }
        form
    }

    #[test]
    fn test_scalar_binding() {
        let mut user = User::default();
        let bound = bind_form(&mut user, &form(&[("id", "42"), ("name", "alice")]), 0);
        assert_eq!(bound, 2);
        assert_eq!(user.id, 42);
        assert_eq!(user.name, "alice");
    }

    #[test]
    fn test_bad_number_leaves_default() {
        let mut user = User::default();
        let bound = bind_form(&mut user, &form(&[("id", "notanumber"), ("name", "bob")]), 0);
        assert_eq!(bound, 1);
        assert_eq!(user.id, 0);
        assert_eq!(user.name, "bob");
    }

    #[test]
    fn test_nested_paths_allocate_on_demand() {
        let mut user = User::default();
        bind_form(
            &mut user,
            &form(&[("profile.age", "30"), ("User[Profile][Score]", "1.5")]),
            0,
        );
        let profile = user.profile.expect("profile allocated");
        assert_eq!(profile.age, 30);
        assert_eq!(profile.score, 0.0);

        let mut user = User::default();
        bind_form(&mut user, &form(&[("profile[score]", "1.5")]), 0);
        assert_eq!(user.profile.unwrap().score, 1.5);
    }

    #[test]
    fn test_bool_slice_and_xsrf() {
        let mut user = User::default();
        let bound = bind_form(
            &mut user,
            &form(&[
                ("active", "0"),
                ("tags", "a"),
                ("tags", "b"),
                ("_xsrf", "token"),
                ("", "empty"),
            ]),
            0,
        );
        assert_eq!(bound, 2);
        assert!(!user.active);
        assert_eq!(user.tags, vec!["a", "b"]);

        bind_form(&mut user, &form(&[("active", "yes")]), 0);
        assert!(user.active);
    }

    #[test]
    fn test_time_formats() {
        let t = NaiveDateTime::from_form_value("2014-01-18 08:30:00.123 +0800").unwrap();
        assert_eq!(t.hour(), 8);
        let t = NaiveDateTime::from_form_value("2014-01-18 08:30:00").unwrap();
        assert_eq!(t.minute(), 30);
        let d = NaiveDate::from_form_value("2014-01-18").unwrap();
        assert_eq!(d.day(), 18);
        assert!(NaiveDate::from_form_value("18/01/2014").is_err());

        let mut user = User::default();
        bind_form(&mut user, &form(&[("born", "1990-05-01")]), 0);
        assert_eq!(user.born.year(), 1990);
    }

    #[test]
    fn test_unknown_and_malformed_keys_are_skipped() {
        let mut user = User::default();
        let bound = bind_form(
            &mut user,
            &form(&[("nosuch", "1"), ("name[", "x"), ("id.extra", "5")]),
            0,
        );
        assert_eq!(bound, 0);
        assert_eq!(user.id, 0);
    }

    #[test]
    fn test_field_matches() {
        assert!(field_matches("CreatedAt", "created_at"));
        assert!(field_matches("ID", "id"));
        assert!(!field_matches("ids", "id"));
    }
}
