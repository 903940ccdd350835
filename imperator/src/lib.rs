//! 命令对象基础库（imperator）
//!
//! 以“命令”为单位组织应用逻辑：
//! - 定义期声明带类型的属性（`attribute`）、默认值与校验规则；
//! - 批量赋值时过滤未声明的键（`attributes`）；
//! - 生命周期：`perform` / `perform_checked` 在调用线程内执行动作，
//!   `commit` / `commit_checked` 将实例交给后台处理器（`processor`）；
//! - 处理器通过上下文（`context`）注入，默认是空处理器。
//!
//! 典型用法：
//! 1. 为一个类型实现 [`Command`]，在 `define` 中声明属性，在 `action` 中编写逻辑；
//! 2. 用 [`CommandInstance::new`] 或 [`CommandContext::instance`] 构造实例；
//! 3. 调用 `perform_checked` 同步执行，或 `commit_checked` 交给后台。
//!
pub mod attribute;
pub mod attributes;
pub mod command;
pub mod context;
pub mod definition;
pub mod error;
pub mod options;
pub mod processor;
pub mod validation;

pub use attribute::{AttributeSchema, AttributeType};
pub use attributes::Attributes;
pub use command::{ClosureCommand, Command, CommandId, CommandInstance};
pub use context::CommandContext;
pub use definition::CommandDefinition;
pub use error::{AttributeError, CommitError, InvalidCommandError, PerformError, ProcessorError};
pub use options::BackgroundOptions;
pub use processor::{
    BackgroundProcessor, Dispatchable, NullBackgroundProcessor, TestBackgroundProcessor,
};
pub use validation::Validator;
