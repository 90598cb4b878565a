// Jobs module - 扫描任务模块
// 任务模型、注册表、单任务执行器和批量分发器

pub mod dispatcher;
pub mod registry;
pub mod runner;

use crate::scanner::output::extract_payload;
use crate::scanner::ScanTarget;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 任务 ID，进程生命周期内唯一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// 任务状态，只会从 running 单向迁移到某个终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Done,
    Cancelled,
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// 任务的终态结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub vulnerable: bool,
    pub payload: String,
}

impl JobOutcome {
    pub fn skipped() -> Self {
        Self::empty(JobStatus::Skipped)
    }

    pub fn cancelled() -> Self {
        Self::empty(JobStatus::Cancelled)
    }

    /// 扫描完成但没有任何发现（启动失败、runner panic 等）
    pub fn no_findings() -> Self {
        Self::empty(JobStatus::Done)
    }

    /// 根据 sqlmap 的合并输出生成 done 结果
    pub fn from_output(output: &str) -> Self {
        let payload = extract_payload(output).unwrap_or_default().to_string();
        Self {
            status: JobStatus::Done,
            vulnerable: !payload.is_empty(),
            payload,
        }
    }

    fn empty(status: JobStatus) -> Self {
        Self {
            status,
            vulnerable: false,
            payload: String::new(),
        }
    }
}

/// 注册表内部保存的任务记录
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// 创建任务时的请求快照，不可变
    pub target: ScanTarget,
    pub status: JobStatus,
    pub vulnerable: bool,
    pub payload: String,
}

impl Job {
    pub fn new(id: JobId, target: ScanTarget) -> Self {
        Self {
            id,
            target,
            status: JobStatus::Running,
            vulnerable: false,
            payload: String::new(),
        }
    }

    pub fn apply(&mut self, outcome: JobOutcome) {
        self.status = outcome.status;
        self.vulnerable = outcome.vulnerable;
        self.payload = outcome.payload;
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            url: self.target.url.clone(),
            vulnerable: self.vulnerable,
            payload: self.payload.clone(),
            status: self.status,
        }
    }
}

/// 对外暴露的任务视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub url: String,
    pub vulnerable: bool,
    pub payload: String,
    pub status: JobStatus,
}
