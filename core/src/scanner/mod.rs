// Scanner module - 扫描请求模块
// 定义批量扫描请求、单个扫描目标以及批次级别的选项

pub mod command;
pub mod output;

use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// sqlmap 接受的 --level 范围
pub const LEVEL_RANGE: std::ops::RangeInclusive<u8> = 1..=5;
/// sqlmap 接受的 --risk 范围
pub const RISK_RANGE: std::ops::RangeInclusive<u8> = 1..=3;
/// sqlmap 接受的 --threads 范围
pub const THREADS_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// 批次级别的扫描选项，同一批次内的所有任务只读共享
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub level: u8,
    pub risk: u8,
    pub threads: u8,
    pub time_based: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            level: 1,
            risk: 1,
            threads: 1,
            time_based: false,
        }
    }
}

/// 单个扫描目标
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub http_method: String,
    /// 逗号分隔的表单参数名
    #[serde(default, deserialize_with = "null_as_default")]
    pub form_params: String,
    /// 逗号分隔的 JSON 参数名，优先于 form_params
    #[serde(default, deserialize_with = "null_as_default")]
    pub body_params: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: HashMap<String, String>,
}

impl ScanTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// 大写的 HTTP 方法，未指定时为 GET
    pub fn method(&self) -> String {
        let method = self.http_method.trim();
        if method.is_empty() {
            "GET".to_string()
        } else {
            method.to_uppercase()
        }
    }
}

/// 批量扫描请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanBatch {
    #[serde(default = "default_one")]
    pub threads: u8,
    #[serde(default = "default_one")]
    pub level: u8,
    #[serde(default = "default_one")]
    pub risk: u8,
    #[serde(default)]
    pub time_based: bool,
    #[serde(rename = "url")]
    pub targets: Vec<ScanTarget>,
}

impl ScanBatch {
    pub fn new(options: ScanOptions, targets: Vec<ScanTarget>) -> Self {
        Self {
            threads: options.threads,
            level: options.level,
            risk: options.risk,
            time_based: options.time_based,
            targets,
        }
    }

    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            level: self.level,
            risk: self.risk,
            threads: self.threads,
            time_based: self.time_based,
        }
    }

    /// 校验整个批次，任何一项不合法则整批拒绝
    pub fn validate(&self) -> Result<()> {
        check_range("level", self.level, &LEVEL_RANGE)?;
        check_range("risk", self.risk, &RISK_RANGE)?;
        check_range("threads", self.threads, &THREADS_RANGE)?;

        for (index, target) in self.targets.iter().enumerate() {
            if target.url.trim().is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "url[{}].url must not be empty",
                    index
                )));
            }
        }
        Ok(())
    }
}

fn check_range(field: &str, value: u8, range: &std::ops::RangeInclusive<u8>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!(
            "{} must be between {} and {}, got {}",
            field,
            range.start(),
            range.end(),
            value
        )))
    }
}

fn default_one() -> u8 {
    1
}

// 客户端常发送 null 代替空字符串
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
