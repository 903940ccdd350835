//! 后台处理器实现（imperator-background）
//!
//! 为 `imperator` 的 `BackgroundProcessor` 协议提供可直接使用的执行器：
//! - [`InlineBackgroundProcessor`]：在调用线程内立即执行动作；
//! - [`TokioBackgroundProcessor`]：投递到 tokio 运行时，限制并发并支持延迟执行。
//!
pub mod error;
pub mod inline;
pub mod runtime;

pub use error::BackgroundError;
pub use inline::InlineBackgroundProcessor;
pub use runtime::{TokioBackgroundProcessor, TokioProcessorConfig};
