//! 后台投递选项（BackgroundOptions）
//!
//! 键为字符串、值为任意 JSON 的映射，按层合并：
//! 类型级（定义期 `background`）< 实例级 < 单次 `commit_with` 调用。
//!
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackgroundOptions(Map<String, Value>);

impl BackgroundOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个选项并返回自身，便于链式构造
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// 合并另一组选项，同名键以 `other` 为准
    pub fn merge(&mut self, other: &BackgroundOptions) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn merged(&self, other: &BackgroundOptions) -> Self {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for BackgroundOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for BackgroundOptions
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for BackgroundOptions
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overrides_colliding_keys_and_keeps_others() {
        let class_level = BackgroundOptions::from([("any_option", "foo"), ("queue", "default")]);
        let call = BackgroundOptions::new().with("any_option", "bar");

        let merged = class_level.merged(&call);
        assert_eq!(merged.get("any_option"), Some(&json!("bar")));
        assert_eq!(merged.get("queue"), Some(&json!("default")));
        assert_eq!(merged.len(), 2);
        assert_eq!(class_level.get("any_option"), Some(&json!("foo")));
    }

    #[test]
    fn serializes_as_plain_object() {
        let opts = BackgroundOptions::new().with("delay_ms", 10);
        assert_eq!(serde_json::to_value(&opts).unwrap(), json!({"delay_ms": 10}));

        let back: BackgroundOptions = serde_json::from_value(json!({"retry": true})).unwrap();
        assert_eq!(back.get("retry"), Some(&json!(true)));
    }
}
