use imperator::CommandId;
use thiserror::Error;

/// 执行器自身产生的错误（动作错误不在此列，原样透传）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("background processor closed: command={command}")]
    Closed { command: &'static str },

    #[error("invalid background option: key={key}, reason={reason}")]
    InvalidOption { key: String, reason: String },

    #[error("background job aborted: command={command}, id={id}, reason={reason}")]
    Aborted {
        command: &'static str,
        id: CommandId,
        reason: String,
    },
}
