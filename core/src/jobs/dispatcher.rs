use super::registry::JobRegistry;
use super::runner::JobRunner;
use super::{JobId, JobOutcome, JobSnapshot};
use crate::error::Result;
use crate::scanner::{ScanBatch, ScanOptions, ScanTarget};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;

/// 批量分发器：每个扫描目标创建一个任务并启动独立的 runner，不等待结果
#[derive(Clone, Default)]
pub struct BatchDispatcher {
    registry: JobRegistry,
    runner: JobRunner,
}

impl BatchDispatcher {
    pub fn new(registry: JobRegistry, runner: JobRunner) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// 校验批次，为每个目标创建任务并后台执行，立即返回所有 running 快照
    pub async fn dispatch(&self, batch: ScanBatch) -> Result<Vec<JobSnapshot>> {
        batch.validate()?;
        let options = batch.options();

        let mut snapshots = Vec::with_capacity(batch.targets.len());
        for target in batch.targets {
            let created = self.registry.create(target.clone()).await;
            self.spawn_job(created.snapshot.id, target, options, created.signal);
            snapshots.push(created.snapshot);
        }

        tracing::info!(
            jobs = snapshots.len(),
            level = options.level,
            risk = options.risk,
            threads = options.threads,
            time_based = options.time_based,
            "Scan batch dispatched"
        );
        Ok(snapshots)
    }

    fn spawn_job(
        &self,
        id: JobId,
        target: ScanTarget,
        options: ScanOptions,
        signal: CancellationToken,
    ) {
        let runner = self.runner.clone();
        spawn_supervised(self.registry.clone(), id, async move {
            runner.run(id, &target, &options, signal).await
        });
    }
}

/// 后台执行一个任务并把结果写回注册表；任务 panic 时按无发现完成
fn spawn_supervised<F>(registry: JobRegistry, id: JobId, job: F)
where
    F: Future<Output = JobOutcome> + Send + 'static,
{
    // 不保留 JoinHandle，任务结果只通过注册表回传
    tokio::spawn(async move {
        // panic 只影响当前任务，任务仍然要落到终态
        let outcome = match AssertUnwindSafe(job).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(job_id = %id, "Job runner panicked");
                JobOutcome::no_findings()
            }
        };

        match registry.complete(&id, outcome).await {
            Ok(true) => tracing::debug!(job_id = %id, "Job completed"),
            Ok(false) => tracing::debug!(job_id = %id, "Job already terminal, result dropped"),
            Err(e) => tracing::warn!(job_id = %id, "Failed to record job result: {}", e),
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::jobs::runner::ToolInvocation;
    use crate::jobs::JobStatus;
    use std::collections::HashSet;
    use std::time::Duration;

    fn dispatcher(script: &str) -> BatchDispatcher {
        BatchDispatcher::new(
            JobRegistry::new(),
            JobRunner::new(ToolInvocation::new("sh", ["-c", script])),
        )
    }

    fn batch(urls: &[&str]) -> ScanBatch {
        ScanBatch::new(
            ScanOptions::default(),
            urls.iter().map(|url| ScanTarget::new(*url)).collect(),
        )
    }

    async fn wait_terminal(registry: &JobRegistry, id: &JobId) -> JobSnapshot {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = registry.get(id).await.unwrap();
                if snapshot.status.is_terminal() {
                    return snapshot;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("job should reach a terminal state")
    }

    #[tokio::test]
    async fn dispatch_returns_one_running_snapshot_per_target() {
        let dispatcher = dispatcher("sleep 30");

        let snapshots = dispatcher
            .dispatch(batch(&["http://a/?id=FUZZ", "http://b/?id=FUZZ", "http://c/?id=FUZZ"]))
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 3);
        let ids: HashSet<JobId> = snapshots.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);
        for snapshot in &snapshots {
            assert_eq!(snapshot.status, JobStatus::Running);
            assert!(!snapshot.vulnerable);
            assert!(snapshot.payload.is_empty());
        }

        for id in ids {
            dispatcher.registry().cancel(&id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn invalid_batch_creates_no_jobs() {
        let dispatcher = dispatcher("true");
        let mut invalid = batch(&["http://a/?id=FUZZ"]);
        invalid.risk = 9;

        let err = dispatcher.dispatch(invalid).await.unwrap_err();

        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(dispatcher.registry().list().await.is_empty());
    }

    #[tokio::test]
    async fn jobs_reach_done_with_parsed_payload() {
        let dispatcher = dispatcher("echo '    Payload: id=1 AND 5=5'");

        let snapshots = dispatcher.dispatch(batch(&["http://a/?id=FUZZ"])).await.unwrap();
        let done = wait_terminal(dispatcher.registry(), &snapshots[0].id).await;

        assert_eq!(done.status, JobStatus::Done);
        assert!(done.vulnerable);
        assert_eq!(done.payload, "id=1 AND 5=5");
    }

    #[tokio::test]
    async fn non_actionable_target_is_skipped() {
        let dispatcher = dispatcher("echo 'Payload: should never run'");

        let snapshots = dispatcher.dispatch(batch(&["http://a/static"])).await.unwrap();
        let skipped = wait_terminal(dispatcher.registry(), &snapshots[0].id).await;

        assert_eq!(skipped.status, JobStatus::Skipped);
        assert!(!skipped.vulnerable);
        assert!(skipped.payload.is_empty());
    }

    #[tokio::test]
    async fn cancel_stops_running_job_and_stays_cancelled() {
        let dispatcher = dispatcher("sleep 30");
        let id = dispatcher
            .dispatch(batch(&["http://a/?id=FUZZ"]))
            .await
            .unwrap()[0]
            .id;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = dispatcher.registry().cancel(&id).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Cancelled);

        // 给 runner 时间走完取消分支并尝试写入
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(dispatcher.registry().get(&id).await.unwrap().status, JobStatus::Cancelled);
        assert_eq!(dispatcher.registry().running().await, 0);
        assert!(dispatcher.registry().cancel(&id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_jobs_do_not_affect_siblings() {
        let dispatcher = BatchDispatcher::new(
            JobRegistry::new(),
            JobRunner::new(ToolInvocation::new("/nonexistent/sqlmap", Vec::<String>::new())),
        );

        let snapshots = dispatcher
            .dispatch(batch(&["http://a/?id=FUZZ", "http://b/plain"]))
            .await
            .unwrap();

        let failed = wait_terminal(dispatcher.registry(), &snapshots[0].id).await;
        let skipped = wait_terminal(dispatcher.registry(), &snapshots[1].id).await;
        assert_eq!(failed.status, JobStatus::Done);
        assert!(!failed.vulnerable);
        assert_eq!(skipped.status, JobStatus::Skipped);
    }

    async fn exploding_runner() -> JobOutcome {
        panic!("runner exploded")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn panicking_job_completes_without_findings_and_spares_siblings() {
        let registry = JobRegistry::new();
        let exploding = registry.create(ScanTarget::new("http://a/?id=FUZZ")).await;
        let sibling = registry.create(ScanTarget::new("http://b/?id=FUZZ")).await;
        let exploding_id = exploding.snapshot.id;
        let sibling_id = sibling.snapshot.id;

        spawn_supervised(registry.clone(), exploding_id, exploding_runner());
        spawn_supervised(registry.clone(), sibling_id, async {
            JobOutcome::from_output("Payload: id=1 OR 1=1")
        });

        let exploded = wait_terminal(&registry, &exploding_id).await;
        assert_eq!(exploded.status, JobStatus::Done);
        assert!(!exploded.vulnerable);
        assert!(exploded.payload.is_empty());

        let finished = wait_terminal(&registry, &sibling_id).await;
        assert_eq!(finished.status, JobStatus::Done);
        assert!(finished.vulnerable);
        assert_eq!(finished.payload, "id=1 OR 1=1");
        assert_eq!(registry.running().await, 0);
    }
}
