use super::{BackgroundProcessor, Dispatchable};
use crate::attributes::Attributes;
use crate::command::CommandId;
use crate::error::ProcessorError;
use crate::options::BackgroundOptions;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 一次提交的记录
#[derive(Builder, Clone, Debug, Serialize)]
pub struct CommitRecord {
    id: CommandId,
    command: &'static str,
    attributes: Attributes,
    options: BackgroundOptions,
    committed_at: DateTime<Utc>,
}

impl CommitRecord {
    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn options(&self) -> &BackgroundOptions {
        &self.options
    }

    pub fn committed_at(&self) -> &DateTime<Utc> {
        &self.committed_at
    }
}

/// 记录型处理器（测试替身）
///
/// 每次 `commit` 追加一条 [`CommitRecord`]，并保留命令副本，
/// 测试可以断言“这个实例被提交了几次、带了什么选项”，
/// 也可以用 [`TestBackgroundProcessor::perform_all`] 模拟后台执行。
#[derive(Default)]
pub struct TestBackgroundProcessor {
    entries: Mutex<Vec<(CommitRecord, Box<dyn Dispatchable>)>>,
}

impl TestBackgroundProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(CommitRecord, Box<dyn Dispatchable>)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 全部提交记录（按提交顺序）
    pub fn commits(&self) -> Vec<CommitRecord> {
        self.entries().iter().map(|(r, _)| r.clone()).collect()
    }

    pub fn last(&self) -> Option<CommitRecord> {
        self.entries().last().map(|(r, _)| r.clone())
    }

    /// 指定实例是否被提交过
    pub fn includes(&self, id: CommandId) -> bool {
        self.count_of(id) > 0
    }

    pub fn count_of(&self, id: CommandId) -> usize {
        self.entries().iter().filter(|(r, _)| r.id == id).count()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// 取出全部已记录的命令并依次执行，返回各自结果
    pub fn perform_all(&self) -> Vec<anyhow::Result<()>> {
        let drained = std::mem::take(&mut *self.entries());
        drained.into_iter().map(|(_, command)| command.run()).collect()
    }
}

impl BackgroundProcessor for TestBackgroundProcessor {
    fn commit(
        &self,
        command: &dyn Dispatchable,
        options: &BackgroundOptions,
    ) -> Result<(), ProcessorError> {
        let record = CommitRecord::builder()
            .id(command.id())
            .command(command.name())
            .attributes(command.attributes().clone())
            .options(options.clone())
            .committed_at(Utc::now())
            .build();
        tracing::debug!(command = record.command, id = %record.id, "commit recorded");
        self.entries().push((record, command.detach()));
        Ok(())
    }
}
