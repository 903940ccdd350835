//! 校验能力（Validator）
//!
//! 命令只关心“当前属性值是否可接受”这一问题，具体规则库由外部提供。
//! 本模块提供：
//! - 面向属性的基础规则：[`Present`]（已赋值）、[`Satisfies`]（值满足谓词）；
//! - 组合：[`AllOf`]（全部满足）、[`AnyOf`]（任一满足）、[`Not`]（取反）；
//! - 闭包 `Fn(&Attributes) -> bool` 直接视为校验器。
//!
//! 规则读取的是赋值后（已按声明类型转换）的属性值；未声明的属性一律视为不满足。
//!
use crate::attributes::Attributes;
use serde_json::Value;
use std::fmt;

/// 校验器核心 trait
pub trait Validator: Send + Sync {
    /// 检查属性值是否满足规则
    fn is_valid(&self, attributes: &Attributes) -> bool;

    /// 与另一条规则同时成立
    fn and<V>(self, other: V) -> AllOf
    where
        Self: Sized + 'static,
        V: Validator + 'static,
    {
        AllOf::new().with(self).with(other)
    }

    /// 两条规则之一成立
    fn or<V>(self, other: V) -> AnyOf
    where
        Self: Sized + 'static,
        V: Validator + 'static,
    {
        AnyOf::new().with(self).with(other)
    }

    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

impl<F> Validator for F
where
    F: Fn(&Attributes) -> bool + Send + Sync,
{
    fn is_valid(&self, attributes: &Attributes) -> bool {
        self(attributes)
    }
}

/// 要求属性已赋值
pub struct Present(pub &'static str);

impl Validator for Present {
    fn is_valid(&self, attributes: &Attributes) -> bool {
        attributes.is_set(self.0).unwrap_or(false)
    }
}

type ValuePredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// 要求属性已赋值且值满足谓词
pub struct Satisfies {
    attribute: &'static str,
    predicate: ValuePredicate,
}

impl Satisfies {
    pub fn new<F>(attribute: &'static str, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            attribute,
            predicate: Box::new(predicate),
        }
    }
}

impl Validator for Satisfies {
    fn is_valid(&self, attributes: &Attributes) -> bool {
        match attributes.get(self.attribute) {
            Ok(Some(value)) => (self.predicate)(value),
            _ => false,
        }
    }
}

impl fmt::Debug for Satisfies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Satisfies")
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

/// 全部规则成立；没有规则时恒成立
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn Validator>>);

impl AllOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Validator + 'static>(mut self, rule: V) -> Self {
        self.0.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Validator for AllOf {
    fn is_valid(&self, attributes: &Attributes) -> bool {
        self.0.iter().all(|rule| rule.is_valid(attributes))
    }

    // 连续的 and 展平为同一层
    fn and<V>(self, other: V) -> AllOf
    where
        Self: Sized + 'static,
        V: Validator + 'static,
    {
        self.with(other)
    }
}

/// 任一规则成立；没有规则时恒不成立
#[derive(Default)]
pub struct AnyOf(Vec<Box<dyn Validator>>);

impl AnyOf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<V: Validator + 'static>(mut self, rule: V) -> Self {
        self.0.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Validator for AnyOf {
    fn is_valid(&self, attributes: &Attributes) -> bool {
        self.0.iter().any(|rule| rule.is_valid(attributes))
    }

    fn or<V>(self, other: V) -> AnyOf
    where
        Self: Sized + 'static,
        V: Validator + 'static,
    {
        self.with(other)
    }
}

pub struct Not<V>(pub V);

impl<V: Validator> Validator for Not<V> {
    fn is_valid(&self, attributes: &Attributes) -> bool {
        !self.0.is_valid(attributes)
    }
}
