use super::{Job, JobId, JobOutcome, JobSnapshot, JobStatus};
use crate::error::{CoreError, Result};
use crate::scanner::ScanTarget;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// create 的返回值：初始快照和该任务的取消信号
#[derive(Debug, Clone)]
pub struct CreatedJob {
    pub snapshot: JobSnapshot,
    pub signal: CancellationToken,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    // 只有非终态任务才有取消信号
    signals: HashMap<JobId, CancellationToken>,
}

/// 任务注册表，进程内唯一的任务状态来源。
///
/// 两张表放在同一把读写锁下，每个操作都是一个完整的临界区，
/// 因此取消和自然完成对同一个任务只会有一方写入终态。
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配 ID，写入 running 状态并安装取消信号
    pub async fn create(&self, target: ScanTarget) -> CreatedJob {
        let id = JobId::new();
        let job = Job::new(id, target);
        let snapshot = job.snapshot();
        let signal = CancellationToken::new();

        let mut inner = self.inner.write().await;
        inner.jobs.insert(id, job);
        inner.signals.insert(id, signal.clone());
        drop(inner);

        tracing::debug!(job_id = %id, url = %snapshot.url, "Job created");
        CreatedJob { snapshot, signal }
    }

    pub async fn get(&self, id: &JobId) -> Result<JobSnapshot> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(id)
            .map(Job::snapshot)
            .ok_or(CoreError::JobNotFound(*id))
    }

    /// 由任务自己的 runner 调用，写入终态。
    ///
    /// 返回 `Ok(false)` 表示任务已经是终态（通常是已被取消），本次写入被忽略。
    pub async fn complete(&self, id: &JobId, outcome: JobOutcome) -> Result<bool> {
        let mut inner = self.inner.write().await;
        inner.signals.remove(id);

        let job = inner.jobs.get_mut(id).ok_or(CoreError::JobNotFound(*id))?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        job.apply(outcome);
        Ok(true)
    }

    /// 取消任务：触发信号、标记 cancelled、移除信号，在同一个临界区内完成。
    ///
    /// 任务不存在或已经结束时返回 `JobNotFound`，所以重复取消第二次会失败。
    pub async fn cancel(&self, id: &JobId) -> Result<JobSnapshot> {
        let mut inner = self.inner.write().await;
        let signal = inner
            .signals
            .remove(id)
            .ok_or(CoreError::JobNotFound(*id))?;
        signal.cancel();

        let job = inner.jobs.get_mut(id).ok_or(CoreError::JobNotFound(*id))?;
        job.apply(JobOutcome::cancelled());
        tracing::info!(job_id = %id, "Job cancelled");
        Ok(job.snapshot())
    }

    /// 调用时刻所有任务的快照，顺序不固定
    pub async fn list(&self) -> Vec<JobSnapshot> {
        let inner = self.inner.read().await;
        inner.jobs.values().map(Job::snapshot).collect()
    }

    /// 仍在运行中的任务数
    pub async fn running(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .count()
    }
}
