//! 统一错误定义
//!
//! 生命周期层只引入 [`InvalidCommandError`] 一种自有失败；
//! 动作与后台处理器产生的错误原样透传（分别包裹在
//! [`PerformError::Action`] 与 [`CommitError::Processor`] 中，或直接返回）。
//!
use crate::attributes::Attributes;
use crate::command::CommandId;
use crate::options::BackgroundOptions;
use thiserror::Error;

/// 后台处理器错误：保留原始错误，可通过 `downcast_ref` 还原
pub type ProcessorError = anyhow::Error;

/// 属性访问错误
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("undeclared attribute: command={command}, attribute={attribute}")]
    Undeclared {
        command: &'static str,
        attribute: String,
    },

    #[error("attribute serde error: command={command}, attribute={attribute}, reason={source}")]
    Serde {
        command: &'static str,
        attribute: String,
        source: serde_json::Error,
    },
}

/// 命令校验未通过
///
/// 携带出错实例的快照（标识、属性值、实例级后台选项）以及未通过的校验规则名称。
#[derive(Clone, Debug, Error)]
#[error("invalid command: command={command}, id={id}, failed={failed:?}")]
pub struct InvalidCommandError {
    command: &'static str,
    id: CommandId,
    attributes: Attributes,
    background: BackgroundOptions,
    failed: Vec<String>,
}

impl InvalidCommandError {
    pub(crate) fn new(
        command: &'static str,
        id: CommandId,
        attributes: Attributes,
        background: BackgroundOptions,
        failed: Vec<String>,
    ) -> Self {
        Self {
            command,
            id,
            attributes,
            background,
            failed,
        }
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 实例级后台选项（不含类型级选项）
    pub fn background(&self) -> &BackgroundOptions {
        &self.background
    }

    /// 未通过的校验规则名称
    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}

/// `perform_checked` 的失败：校验未通过，或动作本身返回的错误
#[derive(Debug, Error)]
pub enum PerformError<E> {
    #[error(transparent)]
    Invalid(#[from] InvalidCommandError),

    #[error(transparent)]
    Action(E),
}

impl<E> PerformError<E> {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    /// 取出动作错误；校验失败时返回 `None`
    pub fn into_action(self) -> Option<E> {
        match self {
            Self::Action(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

/// `commit_checked` 的失败：校验未通过，或后台处理器返回的错误
#[derive(Debug, Error)]
pub enum CommitError {
    #[error(transparent)]
    Invalid(#[from] InvalidCommandError),

    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl CommitError {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}
