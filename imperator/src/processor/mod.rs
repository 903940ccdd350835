//! 后台处理器（BackgroundProcessor）
//!
//! `commit` 的去向。处理器自行决定立即执行、入队延后执行，或仅做记录：
//! - [`NullBackgroundProcessor`]：空操作，默认处理器；
//! - [`TestBackgroundProcessor`]：记录每次提交，供测试断言；
//! - 真实执行器由外部 crate 提供（见 `imperator-background`）。
//!
//! 处理器拿到的是类型擦除后的 [`Dispatchable`]，可读取任意属性，
//! 也可通过 `detach` 取得同一标识的副本用于延后执行。
//!
use crate::attributes::Attributes;
use crate::command::CommandId;
use crate::error::ProcessorError;
use crate::options::BackgroundOptions;

mod null;
mod recording;

pub use null::NullBackgroundProcessor;
pub use recording::{CommitRecord, TestBackgroundProcessor};

/// 处理器视角下的命令实例
pub trait Dispatchable: Send + Sync {
    fn id(&self) -> CommandId;

    fn name(&self) -> &'static str;

    fn attributes(&self) -> &Attributes;

    /// 执行动作，丢弃输出，动作错误原样装入 `anyhow::Error`
    fn run(&self) -> anyhow::Result<()>;

    /// 同一实例（相同标识）的自有副本
    fn detach(&self) -> Box<dyn Dispatchable>;
}

/// 后台处理器
pub trait BackgroundProcessor: Send + Sync {
    /// 接收一次提交；`options` 为已合并的投递选项
    fn commit(
        &self,
        command: &dyn Dispatchable,
        options: &BackgroundOptions,
    ) -> Result<(), ProcessorError>;
}
