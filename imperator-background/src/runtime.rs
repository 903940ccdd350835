//! tokio 后台处理器（TokioBackgroundProcessor）
//!
//! `commit` 时取得命令的自有副本并投递到 tokio 运行时：
//! - 选项 `delay_ms`（u64）指定延迟执行，缺省使用配置中的 `default_delay`；
//! - 通过信号量限制同时执行的动作数量；
//! - 动作在阻塞线程池中运行（动作本身是同步的）；
//! - 已结束的任务在下一次 `commit` 或 `pending` 时回收，结果只写入日志；
//! - `drain` 等待尚未回收的任务并返回各自结果。
//!
//! 注意：`commit` 返回时动作通常尚未执行，处理器不保证执行顺序。
//!
use crate::error::BackgroundError;
use bon::Builder;
use imperator::{BackgroundOptions, BackgroundProcessor, Dispatchable, ProcessorError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// 延迟执行选项的键（毫秒）
pub const DELAY_OPTION: &str = "delay_ms";

type JobHandle = JoinHandle<anyhow::Result<()>>;

#[derive(Builder, Clone, Debug)]
pub struct TokioProcessorConfig {
    /// 同时执行的动作上限（至少为 1）
    #[builder(default = 8)]
    pub max_concurrency: usize,
    /// 未指定 `delay_ms` 时的延迟
    #[builder(default)]
    pub default_delay: Duration,
}

impl Default for TokioProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            default_delay: Duration::ZERO,
        }
    }
}

pub struct TokioBackgroundProcessor {
    handle: Handle,
    config: TokioProcessorConfig,
    permits: Arc<Semaphore>,
    tasks: Mutex<Vec<JobHandle>>,
    closed: AtomicBool,
}

impl TokioBackgroundProcessor {
    pub fn new(handle: Handle, config: TokioProcessorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            handle,
            config,
            permits,
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// 使用当前所在的 tokio 运行时
    pub fn from_current(config: TokioProcessorConfig) -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?, config))
    }

    pub fn config(&self) -> &TokioProcessorConfig {
        &self.config
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<JobHandle>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 回收已结束的任务，返回剩余任务
    fn live_tasks(&self) -> MutexGuard<'_, Vec<JobHandle>> {
        let mut tasks = self.tasks();
        tasks.retain(|task| !task.is_finished());
        tasks
    }

    /// 尚未结束的任务数
    pub fn pending(&self) -> usize {
        self.live_tasks().len()
    }

    /// 关闭后拒绝新的提交；已投递的任务不受影响
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 等待尚未回收的任务结束，按投递顺序返回结果
    ///
    /// 此前已被回收的任务不在结果中，其失败已通过 `tracing` 记录。
    pub async fn drain(&self) -> Vec<anyhow::Result<()>> {
        let tasks = std::mem::take(&mut *self.tasks());
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            results.push(match task.await {
                Ok(result) => result,
                Err(join_err) => Err(anyhow::Error::new(join_err)),
            });
        }
        results
    }

    fn delay_for(&self, options: &BackgroundOptions) -> Result<Duration, BackgroundError> {
        match options.get(DELAY_OPTION) {
            None => Ok(self.config.default_delay),
            Some(value) => value
                .as_u64()
                .map(Duration::from_millis)
                .ok_or_else(|| BackgroundError::InvalidOption {
                    key: DELAY_OPTION.to_string(),
                    reason: format!("expected milliseconds as u64, got {value}"),
                }),
        }
    }
}

impl BackgroundProcessor for TokioBackgroundProcessor {
    fn commit(
        &self,
        command: &dyn Dispatchable,
        options: &BackgroundOptions,
    ) -> Result<(), ProcessorError> {
        let (name, id) = (command.name(), command.id());
        if self.is_closed() {
            return Err(BackgroundError::Closed { command: name }.into());
        }

        let delay = self.delay_for(options)?;
        let job = command.detach();
        let permits = self.permits.clone();
        tracing::debug!(command = name, id = %id, delay_ms = delay.as_millis() as u64, "command enqueued");

        let task: JobHandle = self.handle.spawn(async move {
            let result = run_job(job, permits, delay).await;
            match &result {
                Ok(()) => tracing::debug!(command = name, id = %id, "background command finished"),
                Err(err) => tracing::error!(command = name, id = %id, error = %err, "background command failed"),
            }
            result
        });

        self.live_tasks().push(task);
        Ok(())
    }
}

async fn run_job(
    job: Box<dyn Dispatchable>,
    permits: Arc<Semaphore>,
    delay: Duration,
) -> anyhow::Result<()> {
    let (command, id) = (job.name(), job.id());
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| BackgroundError::Aborted {
            command,
            id,
            reason: e.to_string(),
        })?;

    tokio::task::spawn_blocking(move || job.run())
        .await
        .map_err(|e| BackgroundError::Aborted {
            command,
            id,
            reason: e.to_string(),
        })?
}
