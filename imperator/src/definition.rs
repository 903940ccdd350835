//! 命令定义（CommandDefinition）与定义注册表
//!
//! 命令类型在定义期（`Command::define`）声明：
//! - 属性（`attribute`）；
//! - 类型级后台投递选项（`background`）；
//! - 命名校验规则（`validate`）；
//! - 继承父类型的全部定义（`inherit`）。
//!
//! 定义按类型只构建一次，以 `TypeId` 为键缓存于进程级注册表，构建后不可变。
//!
use crate::attribute::{AttributeDeclaration, AttributeSchema, AttributeType};
use crate::attributes::Attributes;
use crate::command::Command;
use crate::options::BackgroundOptions;
use crate::validation::Validator;
use dashmap::DashMap;
use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::{Arc, LazyLock};

static DEFINITIONS: LazyLock<DashMap<TypeId, Arc<CommandDefinition>>> =
    LazyLock::new(DashMap::new);

#[derive(Clone, Default)]
pub struct CommandDefinition {
    schema: Arc<AttributeSchema>,
    background: BackgroundOptions,
    validators: Vec<(String, Arc<dyn Validator>)>,
}

impl CommandDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// 声明属性，返回声明以便继续设置默认值
    pub fn attribute(&mut self, name: impl Into<String>, ty: AttributeType) -> &mut AttributeDeclaration {
        Arc::make_mut(&mut self.schema).declare(name, ty)
    }

    /// 声明类型级后台投递选项（按键合并到已有选项）
    pub fn background(&mut self, options: impl Into<BackgroundOptions>) -> &mut Self {
        self.background.merge(&options.into());
        self
    }

    /// 登记命名校验规则；同名规则被替换
    pub fn validate<V>(&mut self, name: impl Into<String>, validator: V) -> &mut Self
    where
        V: Validator + 'static,
    {
        let name = name.into();
        let validator: Arc<dyn Validator> = Arc::new(validator);
        match self.validators.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = validator,
            None => self.validators.push((name, validator)),
        }
        self
    }

    /// 继承父类型的定义：属性、选项与规则以父类型为底，当前定义优先
    pub fn inherit<P: Command>(&mut self) -> &mut Self {
        let parent = definition_of::<P>();
        self.extend(&parent);
        self
    }

    pub(crate) fn extend(&mut self, parent: &CommandDefinition) {
        Arc::make_mut(&mut self.schema).inherit(&parent.schema);
        self.background = parent.background.merged(&self.background);

        let own = std::mem::replace(&mut self.validators, parent.validators.clone());
        for (name, validator) in own {
            match self.validators.iter_mut().find(|(n, _)| *n == name) {
                Some(slot) => slot.1 = validator,
                None => self.validators.push((name, validator)),
            }
        }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub(crate) fn shared_schema(&self) -> Arc<AttributeSchema> {
        self.schema.clone()
    }

    pub fn background_options(&self) -> &BackgroundOptions {
        &self.background
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(|(name, _)| name.as_str())
    }

    /// 所有规则均满足时返回 `true`；无规则时恒为 `true`
    pub fn is_valid(&self, attributes: &Attributes) -> bool {
        self.validators.iter().all(|(_, v)| v.is_valid(attributes))
    }

    /// 返回未通过的规则名称
    pub fn failed_rules(&self, attributes: &Attributes) -> Vec<String> {
        self.validators
            .iter()
            .filter(|(_, v)| !v.is_valid(attributes))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("schema", &self.schema)
            .field("background", &self.background)
            .field("rules", &self.rule_names().collect::<Vec<_>>())
            .finish()
    }
}

/// 获取（必要时构建并缓存）命令类型的定义
///
/// 构建时不持有注册表锁，`define` 内部可以安全地 `inherit` 其他类型。
pub fn definition_of<C: Command>() -> Arc<CommandDefinition> {
    let key = TypeId::of::<C>();
    if let Some(found) = DEFINITIONS.get(&key) {
        return found.clone();
    }

    let mut definition = CommandDefinition::new();
    C::define(&mut definition);
    tracing::debug!(
        command = C::NAME,
        rust_type = type_name::<C>(),
        attributes = definition.schema().len(),
        "command definition registered"
    );

    DEFINITIONS
        .entry(key)
        .or_insert_with(|| Arc::new(definition))
        .clone()
}
