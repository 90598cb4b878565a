// sqlmap Core Library
// 核心功能库，包含 sqlmap 命令构建、输出解析和扫描任务编排

pub mod jobs;
pub mod scanner;

// 重新导出常用类型
pub use jobs::dispatcher::BatchDispatcher;
pub use jobs::registry::{CreatedJob, JobRegistry};
pub use jobs::runner::{JobRunner, ToolInvocation};
pub use jobs::{Job, JobId, JobOutcome, JobSnapshot, JobStatus};
pub use scanner::command::{build_command, SqlmapCommand, Technique};
pub use scanner::output::extract_payload;
pub use scanner::{ScanBatch, ScanOptions, ScanTarget};

pub mod error {
    use crate::jobs::JobId;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum CoreError {
        #[error("Scan ID not found: {0}")]
        JobNotFound(JobId),

        #[error("Invalid scan request: {0}")]
        InvalidInput(String),
    }

    pub type Result<T> = std::result::Result<T, CoreError>;
}
