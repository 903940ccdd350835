//! 属性声明（AttributeSchema）
//!
//! 每个命令类型在定义期登记一组有序的属性声明：名称、语义类型与默认值。
//! - 同名重复声明会原位覆盖；
//! - 子类型通过 `inherit` 合并父类型声明，自身声明优先；
//! - 默认值在实例构造时才求值（生产者形式每个实例重新求值）。
//!
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// i64 可精确表示的浮点区间 [-2^63, 2^63)
const I64_LOWER: f64 = -9_223_372_036_854_775_808.0;
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

/// 属性的语义类型标签
///
/// 赋值时按标签做宽松转换，无法转换的值原样保留；`null` 永不转换。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
    Object,
    Any,
}

impl AttributeType {
    /// 将值按当前类型标签做宽松转换
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (_, Value::Null) => Value::Null,
            (Self::String, Value::Number(n)) => Value::String(n.to_string()),
            (Self::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => Value::String(s),
            },
            (Self::Integer, Value::Number(n)) => match n.as_f64() {
                Some(f)
                    if !n.is_i64()
                        && !n.is_u64()
                        && f.fract() == 0.0
                        && (I64_LOWER..I64_UPPER).contains(&f) =>
                {
                    Value::from(f as i64)
                }
                _ => Value::Number(n),
            },
            (Self::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::String(s)),
                Err(_) => Value::String(s),
            },
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Number(n)),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Value::Bool(true),
                "false" | "0" | "no" | "off" => Value::Bool(false),
                _ => Value::String(s),
            },
            (Self::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(1) => Value::Bool(true),
                Some(0) => Value::Bool(false),
                _ => Value::Number(n),
            },
            (_, other) => other,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

type DefaultProducer = Arc<dyn Fn() -> Value + Send + Sync>;

/// 默认值：字面量或无参生产者
#[derive(Clone)]
pub enum AttributeDefault {
    Value(Value),
    Producer(DefaultProducer),
}

impl AttributeDefault {
    /// 求值默认值（生产者每次调用都会重新执行）
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for AttributeDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// 单个属性声明
#[derive(Clone, Debug)]
pub struct AttributeDeclaration {
    name: String,
    ty: AttributeType,
    default: Option<AttributeDefault>,
}

impl AttributeDeclaration {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// 设置字面量默认值
    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(AttributeDefault::Value(value.into()));
        self
    }

    /// 设置生产者默认值，每个实例构造时求值
    pub fn default_with<F>(&mut self, producer: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(AttributeDefault::Producer(Arc::new(producer)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> AttributeType {
        self.ty
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// 求值并按声明类型转换默认值；无默认值时返回 `None`
    pub fn resolve_default(&self) -> Option<Value> {
        self.default
            .as_ref()
            .map(|d| self.ty.coerce(d.resolve()))
            .filter(|v| !v.is_null())
    }
}

/// 属性声明表：有序、名称唯一
#[derive(Clone, Debug, Default)]
pub struct AttributeSchema {
    declarations: Vec<AttributeDeclaration>,
    index: HashMap<String, usize>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记属性；同名声明原位覆盖（保留原有顺序位置）
    pub fn declare(&mut self, name: impl Into<String>, ty: AttributeType) -> &mut AttributeDeclaration {
        self.insert(AttributeDeclaration::new(name, ty))
    }

    fn insert(&mut self, declaration: AttributeDeclaration) -> &mut AttributeDeclaration {
        let pos = match self.index.get(declaration.name()) {
            Some(&pos) => {
                self.declarations[pos] = declaration;
                pos
            }
            None => {
                let pos = self.declarations.len();
                self.index.insert(declaration.name().to_string(), pos);
                self.declarations.push(declaration);
                pos
            }
        };
        &mut self.declarations[pos]
    }

    /// 以父类型声明为底，叠加当前声明（当前声明优先，与调用先后无关）
    pub fn inherit(&mut self, parent: &AttributeSchema) {
        let own = std::mem::replace(self, parent.clone());
        for declaration in own.declarations {
            self.insert(declaration);
        }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn declaration(&self, name: &str) -> Option<&AttributeDeclaration> {
        self.position(name).map(|pos| &self.declarations[pos])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn declaration_at(&self, pos: usize) -> &AttributeDeclaration {
        &self.declarations[pos]
    }

    /// 解析默认值（构造时调用）
    pub fn default_for(&self, name: &str) -> Option<Value> {
        self.declaration(name).and_then(AttributeDeclaration::resolve_default)
    }

    /// 按声明顺序返回全部属性名（批量赋值白名单）
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declarations.iter().map(AttributeDeclaration::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeDeclaration> {
        self.declarations.iter()
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn declare_keeps_order_and_overwrites_in_place() {
        let mut schema = AttributeSchema::new();
        schema.declare("a", AttributeType::String);
        schema.declare("b", AttributeType::Integer);
        schema.declare("a", AttributeType::Boolean).default(true);

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(schema.declaration("a").unwrap().ty(), AttributeType::Boolean);
        assert_eq!(schema.default_for("a"), Some(json!(true)));
        assert!(schema.is_declared("b"));
        assert!(!schema.is_declared("c"));
    }

    #[test]
    fn producer_default_is_evaluated_on_each_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut schema = AttributeSchema::new();
        let counter = calls.clone();
        schema
            .declare("seq", AttributeType::Integer)
            .default_with(move || json!(counter.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(schema.default_for("seq"), Some(json!(0)));
        assert_eq!(schema.default_for("seq"), Some(json!(1)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn inherit_puts_parent_first_and_own_declarations_win() {
        let mut parent = AttributeSchema::new();
        parent.declare("foo", AttributeType::String).default("parent");
        parent.declare("bar", AttributeType::Integer);

        let mut child = AttributeSchema::new();
        child.declare("foo", AttributeType::String).default("child");
        child.declare("baz", AttributeType::Boolean);
        child.inherit(&parent);

        let names: Vec<_> = child.names().collect();
        assert_eq!(names, vec!["foo", "bar", "baz"]);
        assert_eq!(child.default_for("foo"), Some(json!("child")));
        assert_eq!(child.len(), 3);
    }

    #[test]
    fn coerce_is_lenient() {
        assert_eq!(AttributeType::String.coerce(json!(12)), json!("12"));
        assert_eq!(AttributeType::String.coerce(json!(false)), json!("false"));
        assert_eq!(AttributeType::Integer.coerce(json!("42")), json!(42));
        assert_eq!(AttributeType::Integer.coerce(json!(3.0)), json!(3));
        assert_eq!(AttributeType::Integer.coerce(json!(3.5)), json!(3.5));
        assert_eq!(AttributeType::Integer.coerce(json!(-2.0)), json!(-2));
        assert_eq!(AttributeType::Integer.coerce(json!(1e300)), json!(1e300));
        assert_eq!(AttributeType::Integer.coerce(json!(-1e19)), json!(-1e19));
        assert_eq!(AttributeType::Integer.coerce(json!(9.3e18)), json!(9.3e18));
        assert_eq!(AttributeType::Integer.coerce(json!("abc")), json!("abc"));
        assert_eq!(AttributeType::Float.coerce(json!("1.5")), json!(1.5));
        assert_eq!(AttributeType::Float.coerce(json!(2)), json!(2.0));
        assert_eq!(AttributeType::Boolean.coerce(json!("yes")), json!(true));
        assert_eq!(AttributeType::Boolean.coerce(json!(0)), json!(false));
        assert_eq!(AttributeType::Boolean.coerce(json!(" Off ")), json!(false));
        assert_eq!(AttributeType::Boolean.coerce(json!("y")), json!("y"));
        assert_eq!(AttributeType::Boolean.coerce(json!("t")), json!("t"));
        assert_eq!(AttributeType::Array.coerce(json!([1, 2])), json!([1, 2]));
        assert_eq!(AttributeType::Any.coerce(json!({"k": 1})), json!({"k": 1}));
        assert_eq!(AttributeType::Integer.coerce(Value::Null), Value::Null);
    }

    #[test]
    fn missing_default_resolves_to_none() {
        let mut schema = AttributeSchema::new();
        schema.declare("plain", AttributeType::String);
        assert_eq!(schema.default_for("plain"), None);
        assert_eq!(schema.default_for("undeclared"), None);
        assert!(!schema.declaration("plain").unwrap().has_default());
    }
}
