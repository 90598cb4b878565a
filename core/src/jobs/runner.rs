//! 单个扫描任务的执行器
//!
//! 构建参数、启动 sqlmap、在进程退出和取消信号之间竞争，最终产出唯一的终态结果。

use super::{JobId, JobOutcome};
use crate::scanner::command::{build_command, SqlmapCommand};
use crate::scanner::{ScanOptions, ScanTarget};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Split};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_SQLMAP_PATH: &str = "./sqlmap/sqlmap.py";

/// 外部工具的调用方式：可执行程序 + 固定前缀参数，之后追加 sqlmap 参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl ToolInvocation {
    pub fn new<I, S>(program: impl Into<String>, prefix_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            prefix_args: prefix_args.into_iter().map(Into::into).collect(),
        }
    }

    /// `python3 ./sqlmap/sqlmap.py ...`
    pub fn sqlmap(python: impl Into<String>, script: impl Into<String>) -> Self {
        Self::new(python, [script.into()])
    }

    fn command(&self, sqlmap: &SqlmapCommand) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(&sqlmap.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn command_line(&self, sqlmap: &SqlmapCommand) -> String {
        std::iter::once(&self.program)
            .chain(&self.prefix_args)
            .chain(&sqlmap.args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ToolInvocation {
    fn default() -> Self {
        Self::sqlmap(DEFAULT_PYTHON, DEFAULT_SQLMAP_PATH)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobRunner {
    tool: Arc<ToolInvocation>,
}

impl JobRunner {
    pub fn new(tool: ToolInvocation) -> Self {
        Self {
            tool: Arc::new(tool),
        }
    }

    /// 执行一个任务直到完成或被取消，两者只会发生其一
    pub async fn run(
        &self,
        job_id: JobId,
        target: &ScanTarget,
        options: &ScanOptions,
        cancel: CancellationToken,
    ) -> JobOutcome {
        let Some(sqlmap) = build_command(target, options) else {
            info!(job_id = %job_id, url = %target.url, "No injectable parameter, skipping");
            return JobOutcome::skipped();
        };

        if cancel.is_cancelled() {
            return JobOutcome::cancelled();
        }

        debug!(job_id = %job_id, command = %self.tool.command_line(&sqlmap), "Launching sqlmap");
        let start = Instant::now();

        let mut child = match self.tool.command(&sqlmap).spawn() {
            Ok(child) => child,
            Err(e) => {
                // 启动失败也算完成，只是没有任何发现
                warn!(job_id = %job_id, program = %self.tool.program, "Failed to launch sqlmap: {}", e);
                return JobOutcome::from_output(&format!(
                    "failed to launch {}: {}",
                    self.tool.program, e
                ));
            }
        };

        let reader = tokio::spawn(collect_output(child.stdout.take(), child.stderr.take()));
        let reader_abort = reader.abort_handle();

        // 进程退出后还要等管道关闭（后台子进程可能仍持有），所以整个收尾过程都要和取消信号竞争
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = child.start_kill() {
                    warn!(job_id = %job_id, "Failed to kill sqlmap process: {}", e);
                }
                reader_abort.abort();
                info!(job_id = %job_id, elapsed = ?start.elapsed(), "sqlmap run cancelled");
                JobOutcome::cancelled()
            }
            (status, output) = async { (child.wait().await, reader.await) } => {
                let mut output = output.unwrap_or_default();
                match status {
                    Ok(status) => {
                        debug!(job_id = %job_id, %status, elapsed = ?start.elapsed(), "sqlmap exited");
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, "Failed to wait for sqlmap: {}", e);
                        output.push_str(&format!("\nfailed to wait for sqlmap: {}", e));
                    }
                }
                trace!(job_id = %job_id, output = %output, "sqlmap output");

                let outcome = JobOutcome::from_output(&output);
                info!(
                    job_id = %job_id,
                    vulnerable = outcome.vulnerable,
                    payload = %outcome.payload,
                    "sqlmap run finished"
                );
                outcome
            }
        }
    }
}

/// 同时读取 stdout 和 stderr，按到达顺序逐行合并到一个缓冲区
async fn collect_output(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> String {
    let mut out = stdout.map(|s| BufReader::new(s).split(b'\n'));
    let mut err = stderr.map(|s| BufReader::new(s).split(b'\n'));
    let mut buffer = String::new();

    while out.is_some() || err.is_some() {
        tokio::select! {
            segment = next_segment(&mut out), if out.is_some() => match segment {
                Some(line) => push_line(&mut buffer, &line),
                None => out = None,
            },
            segment = next_segment(&mut err), if err.is_some() => match segment {
                Some(line) => push_line(&mut buffer, &line),
                None => err = None,
            },
        }
    }
    buffer
}

async fn next_segment<R>(lines: &mut Option<Split<R>>) -> Option<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_segment().await.ok().flatten(),
        None => None,
    }
}

fn push_line(buffer: &mut String, line: &[u8]) {
    buffer.push_str(&String::from_utf8_lossy(line));
    buffer.push('\n');
}
