use crate::command::{Command, CommandInstance};
use crate::processor::{BackgroundProcessor, NullBackgroundProcessor};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 命令上下文（Command Context）
///
/// 持有 `commit` 使用的后台处理器，替代进程级可变全局量：
/// 在上下文中构造的实例都会提交到同一个处理器。
/// 默认上下文使用 [`NullBackgroundProcessor`]，提交即空操作。
///
/// 典型用法：
/// ```rust
/// use imperator::context::CommandContext;
/// use imperator::processor::TestBackgroundProcessor;
/// use std::sync::Arc;
///
/// let recorder = Arc::new(TestBackgroundProcessor::new());
/// let ctx = CommandContext::new(recorder.clone());
/// assert!(recorder.commits().is_empty());
/// # let _ = ctx;
/// ```
#[derive(Clone)]
pub struct CommandContext {
    processor: Arc<dyn BackgroundProcessor>,
}

impl CommandContext {
    pub fn new(processor: Arc<dyn BackgroundProcessor>) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &Arc<dyn BackgroundProcessor> {
        &self.processor
    }

    /// 在本上下文中构造实例
    pub fn instance<C, I, K, V>(&self, input: I) -> CommandInstance<C>
    where
        C: Command + Default,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.instance_with(C::default(), input)
    }

    pub fn instance_with<C, I, K, V>(&self, handler: C, input: I) -> CommandInstance<C>
    where
        C: Command,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        CommandInstance::build(Arc::new(handler), input, self.clone())
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(Arc::new(NullBackgroundProcessor))
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext").finish_non_exhaustive()
    }
}
