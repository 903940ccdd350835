//! 命令（Command）
//!
//! 一个命令类型 = 定义期声明（属性、后台选项、校验规则）+ 唯一的动作。
//! 命令实例（[`CommandInstance`]）持有属性值，并提供生命周期操作：
//!
//! ```text
//! [已构造] --perform()-------------------------> [动作已执行]
//! [已构造] --perform_checked()--> 校验 --通过--> [动作已执行]
//!                                       \-失败-> InvalidCommandError
//! [已构造] --commit()--------------------------> [已交给后台处理器]
//! [已构造] --commit_checked()---> 校验 --通过--> [已交给后台处理器]
//!                                       \-失败-> InvalidCommandError
//! ```
//!
//! 每次调用均为终态，实例可以被重复执行或提交。
//!
use crate::attributes::Attributes;
use crate::context::CommandContext;
use crate::definition::{CommandDefinition, definition_of};
use crate::error::{AttributeError, CommitError, InvalidCommandError, PerformError, ProcessorError};
use crate::options::BackgroundOptions;
use crate::processor::Dispatchable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 命令类型
///
/// `Self` 承载动作所需的依赖（仓储、计数器等），由所有实例共享；
/// 属性值则保存在各自的 [`CommandInstance`] 中。
///
/// 关联常量：
/// - `NAME`：命令的稳定名称，用于日志与后台投递。
pub trait Command: Send + Sync + Sized + 'static {
    const NAME: &'static str;

    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    /// 定义期声明，整个进程内每个类型只调用一次
    fn define(_definition: &mut CommandDefinition) {}

    /// 命令的动作
    fn action(&self, command: &CommandInstance<Self>) -> Result<Self::Output, Self::Error>;

    /// 实例使用的名称，默认即 `NAME`
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// 实例使用的定义，默认取注册表中按类型缓存的定义
    fn definition(&self) -> Arc<CommandDefinition> {
        definition_of::<Self>()
    }
}

/// 命令实例标识：每次构造生成，属性值相同的两个实例也互不相同
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CommandId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 命令实例
pub struct CommandInstance<C: Command> {
    id: CommandId,
    handler: Arc<C>,
    definition: Arc<CommandDefinition>,
    attributes: Attributes,
    background: BackgroundOptions,
    context: CommandContext,
}

impl<C: Command + Default> CommandInstance<C> {
    /// 以默认上下文（空处理器）构造实例
    pub fn new<I, K, V>(input: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::with_handler(C::default(), input)
    }
}

impl<C: Command + Default> Default for CommandInstance<C> {
    fn default() -> Self {
        Self::new(std::iter::empty::<(String, Value)>())
    }
}

impl<C: Command> CommandInstance<C> {
    pub fn with_handler<I, K, V>(handler: C, input: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::build(Arc::new(handler), input, CommandContext::default())
    }

    pub(crate) fn build<I, K, V>(handler: Arc<C>, input: I, context: CommandContext) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let definition = handler.definition();
        let attributes = Attributes::new(handler.name(), definition.shared_schema(), input);
        Self {
            id: CommandId::new(),
            handler,
            definition,
            attributes,
            background: BackgroundOptions::new(),
            context,
        }
    }

    /// 切换实例所在的上下文（后台处理器）
    pub fn with_context(mut self, context: CommandContext) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.handler.name()
    }

    pub fn handler(&self) -> &C {
        &self.handler
    }

    pub fn definition(&self) -> &CommandDefinition {
        &self.definition
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn get(&self, name: &str) -> Result<Option<&Value>, AttributeError> {
        self.attributes.get(name)
    }

    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AttributeError> {
        self.attributes.get_as(name)
    }

    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), AttributeError> {
        self.attributes.set(name, value)
    }

    /// 设置实例级后台选项（覆盖类型级同名选项）
    pub fn set_background_option(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.background.insert(key, value);
    }

    /// 合并后的后台选项：类型级 < 实例级
    pub fn background_options(&self) -> BackgroundOptions {
        self.definition.background_options().merged(&self.background)
    }

    /// 每次调用都重新校验当前属性值
    pub fn is_valid(&self) -> bool {
        self.definition.is_valid(&self.attributes)
    }

    pub fn failed_rules(&self) -> Vec<String> {
        self.definition.failed_rules(&self.attributes)
    }

    pub fn validate(&self) -> Result<(), InvalidCommandError> {
        let failed = self.failed_rules();
        if failed.is_empty() {
            return Ok(());
        }

        tracing::warn!(command = self.name(), id = %self.id, failed = ?failed, "command is invalid");
        Err(InvalidCommandError::new(
            self.name(),
            self.id,
            self.attributes.clone(),
            self.background.clone(),
            failed,
        ))
    }

    /// 直接执行动作，不做校验；动作错误原样返回
    pub fn perform(&self) -> Result<C::Output, C::Error> {
        tracing::debug!(command = self.name(), id = %self.id, "performing command");
        self.handler.action(self)
    }

    /// 校验通过后执行动作；未通过时动作不会被执行
    pub fn perform_checked(&self) -> Result<C::Output, PerformError<C::Error>> {
        self.validate()?;
        self.perform().map_err(PerformError::Action)
    }

    /// 以合并后的选项提交给后台处理器，不做校验
    pub fn commit(&self) -> Result<(), ProcessorError> {
        self.commit_with(BackgroundOptions::new())
    }

    /// 提交并附带单次调用的选项（优先级最高）
    pub fn commit_with(&self, options: impl Into<BackgroundOptions>) -> Result<(), ProcessorError> {
        let options = self.background_options().merged(&options.into());
        tracing::debug!(
            command = self.name(),
            id = %self.id,
            options = ?options,
            "committing command to background processor"
        );
        self.context.processor().commit(self, &options)
    }

    pub fn commit_checked(&self) -> Result<(), CommitError> {
        self.commit_checked_with(BackgroundOptions::new())
    }

    /// 校验通过后提交；未通过时不会触达处理器
    pub fn commit_checked_with(&self, options: impl Into<BackgroundOptions>) -> Result<(), CommitError> {
        self.validate()?;
        Ok(self.commit_with(options)?)
    }

    /// 同一实例的副本（标识不变），供处理器延后执行
    fn duplicate(&self) -> Self {
        Self {
            id: self.id,
            handler: self.handler.clone(),
            definition: self.definition.clone(),
            attributes: self.attributes.clone(),
            background: self.background.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C: Command> fmt::Debug for CommandInstance<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInstance")
            .field("name", &self.name())
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("background", &self.background)
            .finish()
    }
}

impl<C: Command> Dispatchable for CommandInstance<C> {
    fn id(&self) -> CommandId {
        self.id
    }

    fn name(&self) -> &'static str {
        CommandInstance::name(self)
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn run(&self) -> anyhow::Result<()> {
        self.perform().map(|_| ()).map_err(anyhow::Error::new)
    }

    fn detach(&self) -> Box<dyn Dispatchable> {
        Box::new(self.duplicate())
    }
}

type ActionFn<O, E> = Arc<dyn Fn(&Attributes) -> Result<O, E> + Send + Sync>;

/// 以闭包作为动作的命令类型
///
/// 定义不进入类型注册表，而是随值携带；同一个 `ClosureCommand` 的所有实例共享定义。
pub struct ClosureCommand<O, E> {
    name: &'static str,
    definition: Arc<CommandDefinition>,
    action: ActionFn<O, E>,
}

impl<O, E> ClosureCommand<O, E>
where
    O: 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    pub fn new<F>(name: &'static str, action: F) -> Self
    where
        F: Fn(&Attributes) -> Result<O, E> + Send + Sync + 'static,
    {
        Self {
            name,
            definition: Arc::new(CommandDefinition::new()),
            action: Arc::new(action),
        }
    }

    /// 定义期声明（属性、选项、规则）
    pub fn define<F>(mut self, define: F) -> Self
    where
        F: FnOnce(&mut CommandDefinition),
    {
        define(Arc::make_mut(&mut self.definition));
        self
    }

    /// 在此命令类型下构造实例
    pub fn instance<I, K, V>(&self, input: I) -> CommandInstance<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        CommandInstance::with_handler(self.clone(), input)
    }
}

impl<O, E> Clone for ClosureCommand<O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            definition: self.definition.clone(),
            action: self.action.clone(),
        }
    }
}

impl<O, E> Command for ClosureCommand<O, E>
where
    O: 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    const NAME: &'static str = "closure";

    type Output = O;
    type Error = E;

    fn action(&self, command: &CommandInstance<Self>) -> Result<O, E> {
        (self.action)(command.attributes())
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn definition(&self) -> Arc<CommandDefinition> {
        self.definition.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeType;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("command test exception")]
    struct CommandTestException;

    #[derive(Default)]
    struct MethodTestCommand {
        runs: Arc<AtomicUsize>,
    }

    impl Command for MethodTestCommand {
        const NAME: &'static str = "method_test";
        type Output = usize;
        type Error = CommandTestException;

        fn define(def: &mut CommandDefinition) {
            def.attribute("fail", AttributeType::Boolean).default(false);
            def.attribute("ok", AttributeType::Boolean).default(true);
            def.validate("ok", |a: &Attributes| {
                a.get_as::<bool>("ok").ok().flatten().unwrap_or(false)
            });
        }

        fn action(&self, command: &CommandInstance<Self>) -> Result<usize, CommandTestException> {
            if command.get_as::<bool>("fail").ok().flatten().unwrap_or(false) {
                return Err(CommandTestException);
            }
            Ok(self.runs.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[test]
    fn perform_runs_action_every_time_regardless_of_validity() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut cmd = CommandInstance::with_handler(
            MethodTestCommand { runs: runs.clone() },
            [("ok", false)],
        );
        assert!(!cmd.is_valid());
        assert_eq!(cmd.perform().unwrap(), 1);
        assert_eq!(cmd.perform().unwrap(), 2);

        cmd.set("ok", true).unwrap();
        assert!(cmd.is_valid());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn perform_propagates_action_error_unchanged() {
        let cmd = CommandInstance::<MethodTestCommand>::new([("fail", true)]);
        assert!(matches!(cmd.perform(), Err(CommandTestException)));

        match cmd.perform_checked() {
            Err(PerformError::Action(CommandTestException)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn perform_checked_does_not_run_invalid_command() {
        let runs = Arc::new(AtomicUsize::new(0));
        let cmd = CommandInstance::with_handler(
            MethodTestCommand { runs: runs.clone() },
            [("ok", false), ("fail", true)],
        );

        let err = cmd.perform_checked().unwrap_err();
        assert!(err.is_invalid());
        match err {
            PerformError::Invalid(invalid) => {
                assert_eq!(invalid.command(), "method_test");
                assert_eq!(invalid.id(), cmd.id());
                assert_eq!(invalid.failed(), ["ok".to_string()]);
                assert_eq!(invalid.attributes().get("ok").unwrap(), Some(&json!(false)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn instances_with_equal_values_have_distinct_ids() {
        let a = CommandInstance::<MethodTestCommand>::default();
        let b = CommandInstance::<MethodTestCommand>::default();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.attributes().to_map(), b.attributes().to_map());
    }

    #[test]
    fn closure_command_runs_stored_action() {
        let dsl = ClosureCommand::new("dsl_test", |attrs: &Attributes| {
            match attrs.get_as::<String>("greeting") {
                Ok(Some(g)) => Ok(format!("{g}, world")),
                _ => Err(CommandTestException),
            }
        })
        .define(|def| {
            def.attribute("greeting", AttributeType::String).default("hello");
        });

        let cmd = dsl.instance(std::iter::empty::<(String, Value)>());
        assert_eq!(cmd.name(), "dsl_test");
        assert_eq!(cmd.perform().unwrap(), "hello, world");

        let cmd = dsl.instance([("greeting", Value::Null)]);
        assert!(matches!(cmd.perform(), Err(CommandTestException)));
    }

    #[test]
    fn detached_copy_keeps_identity_and_values() {
        let cmd = CommandInstance::<MethodTestCommand>::new([("fail", true)]);
        let copy = cmd.detach();
        assert_eq!(copy.id(), cmd.id());
        assert_eq!(copy.name(), "method_test");
        assert_eq!(copy.attributes().get("fail").unwrap(), Some(&json!(true)));
        assert!(copy.run().unwrap_err().downcast_ref::<CommandTestException>().is_some());
    }
}
