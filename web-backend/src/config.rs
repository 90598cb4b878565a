use anyhow::{Context, Result};
use sqlmap_core::jobs::runner::{DEFAULT_PYTHON, DEFAULT_SQLMAP_PATH};
use sqlmap_core::ToolInvocation;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// 服务配置，启动时从环境变量（以及可选的 .env 文件）读取一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_address: String,
    pub python: String,
    pub sqlmap_path: String,
    /// actix worker 数量，未设置时使用 actix 默认值
    pub workers: Option<usize>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let workers = match lookup("SQLMAP_WORKERS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid SQLMAP_WORKERS value: {}", raw))?,
            ),
            None => None,
        };

        Ok(Self {
            bind_address: var("SQLMAP_BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            python: var("SQLMAP_PYTHON", DEFAULT_PYTHON),
            sqlmap_path: var("SQLMAP_PATH", DEFAULT_SQLMAP_PATH),
            workers,
        })
    }

    pub fn tool(&self) -> ToolInvocation {
        ToolInvocation::sqlmap(&self.python, &self.sqlmap_path)
    }
}
