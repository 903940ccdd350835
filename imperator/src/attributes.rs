//! 属性值（Attributes）
//!
//! 单个命令实例持有的属性值集合，与其类型的 [`AttributeSchema`] 绑定：
//! - 构造即批量赋值：未声明的键被丢弃，缺省的键取默认值；
//! - 读取/写入未声明的属性返回 [`AttributeError::Undeclared`]；
//! - 已声明但未赋值的属性读取结果为 `Ok(None)`。
//!
use crate::attribute::AttributeSchema;
use crate::error::AttributeError;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Attributes {
    command: &'static str,
    schema: Arc<AttributeSchema>,
    values: Vec<Option<Value>>,
}

impl Attributes {
    /// 按声明顺序批量赋值
    ///
    /// 显式传入的 `null` 视为“已提供但未赋值”，不会回落到默认值。
    pub fn new<I, K, V>(command: &'static str, schema: Arc<AttributeSchema>, input: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut supplied: HashMap<String, Value> = HashMap::new();
        for (key, value) in input {
            let key = key.into();
            if schema.is_declared(&key) {
                supplied.insert(key, value.into());
            } else {
                tracing::debug!(command, attribute = %key, "discarding undeclared attribute");
            }
        }

        let values = schema
            .iter()
            .map(|decl| match supplied.remove(decl.name()) {
                Some(value) => Some(decl.ty().coerce(value)).filter(|v| !v.is_null()),
                None => decl.resolve_default(),
            })
            .collect();

        Self {
            command,
            schema,
            values,
        }
    }

    /// 所属命令名称
    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    fn position(&self, name: &str) -> Result<usize, AttributeError> {
        self.schema
            .position(name)
            .ok_or_else(|| AttributeError::Undeclared {
                command: self.command,
                attribute: name.to_string(),
            })
    }

    pub fn get(&self, name: &str) -> Result<Option<&Value>, AttributeError> {
        let pos = self.position(name)?;
        Ok(self.values[pos].as_ref())
    }

    /// 读取并反序列化为目标类型
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AttributeError> {
        match self.get(name)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| AttributeError::Serde {
                    command: self.command,
                    attribute: name.to_string(),
                    source,
                }),
        }
    }

    /// 写入属性值（按声明类型转换）；写入 `null` 等同于 [`Attributes::unset`]
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), AttributeError> {
        let pos = self.position(name)?;
        let value = serde_json::to_value(value).map_err(|source| AttributeError::Serde {
            command: self.command,
            attribute: name.to_string(),
            source,
        })?;
        let ty = self.schema.declaration_at(pos).ty();
        self.values[pos] = Some(ty.coerce(value)).filter(|v| !v.is_null());
        Ok(())
    }

    pub fn unset(&mut self, name: &str) -> Result<(), AttributeError> {
        let pos = self.position(name)?;
        self.values[pos] = None;
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> Result<bool, AttributeError> {
        Ok(self.get(name)?.is_some())
    }

    /// 批量更新：仅接受已声明的键，不补默认值
    pub fn assign<I, K, V>(&mut self, input: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in input {
            let key = key.into();
            let value: Value = value.into();
            if let Err(err) = self.set(&key, value) {
                tracing::debug!(command = self.command, attribute = %key, error = %err, "discarding attribute");
            }
        }
    }

    /// 按声明顺序遍历 (名称, 当前值)
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.schema
            .names()
            .zip(self.values.iter())
            .map(|(name, value)| (name, value.as_ref()))
    }

    /// 已赋值属性的 JSON 对象快照
    pub fn to_map(&self) -> Map<String, Value> {
        self.iter()
            .filter_map(|(name, value)| value.map(|v| (name.to_string(), v.clone())))
            .collect()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let set: Vec<_> = self
            .iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        let mut map = serializer.serialize_map(Some(set.len()))?;
        for (name, value) in set {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeType;
    use serde_json::json;

    fn schema() -> Arc<AttributeSchema> {
        let mut schema = AttributeSchema::new();
        schema.declare("gets_default", AttributeType::String).default("foo");
        schema.declare("declared_attr", AttributeType::String);
        schema.declare("count", AttributeType::Integer);
        Arc::new(schema)
    }

    #[test]
    fn undeclared_keys_are_dropped_and_unreadable() {
        let attrs = Attributes::new("attr_cmd", schema(), [("undeclared_attr", "foo")]);
        match attrs.get("undeclared_attr").unwrap_err() {
            AttributeError::Undeclared { command, attribute } => {
                assert_eq!(command, "attr_cmd");
                assert_eq!(attribute, "undeclared_attr");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!attrs.to_map().contains_key("undeclared_attr"));
    }

    #[test]
    fn defaults_fill_missing_keys_and_are_overridden_by_input() {
        let attrs = Attributes::new("attr_cmd", schema(), [("declared_attr", "bar")]);
        assert_eq!(attrs.get("gets_default").unwrap(), Some(&json!("foo")));
        assert_eq!(attrs.get("declared_attr").unwrap(), Some(&json!("bar")));
        assert_eq!(attrs.get("count").unwrap(), None);

        let attrs = Attributes::new("attr_cmd", schema(), [("gets_default", "bar")]);
        assert_eq!(attrs.get_as::<String>("gets_default").unwrap(), Some("bar".to_string()));
    }

    #[test]
    fn explicit_null_is_unset_without_default() {
        let attrs = Attributes::new("attr_cmd", schema(), [("gets_default", Value::Null)]);
        assert_eq!(attrs.get("gets_default").unwrap(), None);
    }

    #[test]
    fn set_coerces_and_rejects_undeclared() {
        let mut attrs = Attributes::new("attr_cmd", schema(), Map::new());
        attrs.set("count", "7").unwrap();
        assert_eq!(attrs.get_as::<i64>("count").unwrap(), Some(7));

        attrs.set("count", Option::<i64>::None).unwrap();
        assert!(!attrs.is_set("count").unwrap());

        assert!(matches!(
            attrs.set("nope", 1),
            Err(AttributeError::Undeclared { .. })
        ));
    }

    #[test]
    fn get_as_reports_decode_errors() {
        let attrs = Attributes::new("attr_cmd", schema(), [("declared_attr", "text")]);
        assert!(matches!(
            attrs.get_as::<i64>("declared_attr"),
            Err(AttributeError::Serde { .. })
        ));
    }

    #[test]
    fn assign_filters_like_construction() {
        let mut attrs = Attributes::new("attr_cmd", schema(), Map::new());
        attrs.assign([("declared_attr", json!("x")), ("other", json!(1))]);
        assert_eq!(attrs.get("declared_attr").unwrap(), Some(&json!("x")));
        assert!(attrs.get("other").is_err());
    }

    #[test]
    fn serializes_set_values_in_order() {
        let attrs = Attributes::new("attr_cmd", schema(), [("count", 2)]);
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json, json!({"gets_default": "foo", "count": 2}));
        assert_eq!(attrs.to_map().len(), 2);
    }
}
