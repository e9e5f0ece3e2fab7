//! Fingerprint Module
//!
//! Turns a structured call context into a stable cache key.
//!
//! Each registered strategy names one component of the context and how to
//! canonicalize it. Components are rendered as `name{<compact JSON>}` in
//! registration order, joined with `:` and hashed with SHA-1, so equal
//! contexts always give equal digests regardless of map iteration order.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use crate::error::{CacheError, Result};

/// Named components fed to [`FingerprintBuilder::build`].
pub type Context = Map<String, Value>;

/// Canonicalizes one component of a context.
pub type Canonicalizer = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Lowercase hex SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

// == Canonicalizers ==
/// Passes the value through unchanged.
pub fn identity(value: &Value) -> Result<Value> {
    Ok(value.clone())
}

/// Turns an object into `[key, value]` pairs sorted by key.
pub fn dict_strategy(value: &Value) -> Result<Value> {
    let object = value.as_object().ok_or_else(|| {
        CacheError::Canonicalization(format!("expected an object, got {}", shape(value)))
    })?;
    let mut pairs: Vec<(&String, &Value)> = object.iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    Ok(Value::Array(
        pairs
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::String(k.clone()), v.clone()]))
            .collect(),
    ))
}

/// Selects the listed fields of an object, in the listed order; absent
/// fields canonicalize to `null`. Suited to picking request headers.
pub fn pick_strategy<I, S>(fields: I) -> Canonicalizer
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
    Arc::new(move |value: &Value| {
        let object = value.as_object().ok_or_else(|| {
            CacheError::Canonicalization(format!("expected an object, got {}", shape(value)))
        })?;
        Ok(Value::Array(
            fields
                .iter()
                .map(|f| object.get(f).cloned().unwrap_or(Value::Null))
                .collect(),
        ))
    })
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// == Fingerprint Builder ==
/// Ordered set of canonicalization strategies.
#[derive(Clone, Default)]
pub struct FingerprintBuilder {
    strategies: Vec<(String, Canonicalizer)>,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers how to canonicalize component `name`.
    ///
    /// Registering a name twice replaces its canonicalizer but keeps its
    /// original position.
    pub fn add_strategy<F>(&mut self, name: impl Into<String>, canonicalizer: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.add_canonicalizer(name, Arc::new(canonicalizer))
    }

    /// Registers an already shared canonicalizer.
    pub fn add_canonicalizer(
        &mut self,
        name: impl Into<String>,
        canonicalizer: Canonicalizer,
    ) -> &mut Self {
        let name = name.into();
        match self.strategies.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = canonicalizer,
            None => self.strategies.push((name, canonicalizer)),
        }
        self
    }

    /// Registers component `name` with no canonicalization.
    pub fn add_identity(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_strategy(name, identity)
    }

    /// Registered component names, in order.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|(n, _)| n.as_str())
    }

    // == Build ==
    /// Hashes the canonicalized context into a 40-character hex digest.
    ///
    /// Every registered component must be present in `context`; extra
    /// entries are ignored.
    pub fn build(&self, context: &Context) -> Result<String> {
        let mut rendered = Vec::with_capacity(self.strategies.len());
        for (name, canonicalize) in &self.strategies {
            let raw = context.get(name).ok_or_else(|| {
                CacheError::Canonicalization(format!("missing component '{}'", name))
            })?;
            let canonical = canonicalize(raw)?;
            rendered.push(format!("{}{{{}}}", name, serde_json::to_string(&canonical)?));
        }
        Ok(sha1_hex(rendered.join(":").as_bytes()))
    }

    /// Returns `prefix:<digest>`.
    pub fn build_key(&self, prefix: &str, context: &Context) -> Result<String> {
        Ok(format!("{}:{}", prefix, self.build(context)?))
    }
}

impl fmt::Debug for FingerprintBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintBuilder")
            .field("components", &self.components().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        value.as_object().cloned().unwrap()
    }

    fn dict_builder() -> FingerprintBuilder {
        let mut builder = FingerprintBuilder::new();
        builder.add_strategy("a", dict_strategy);
        builder
    }

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_rendering_matches_component_format() {
        let mut builder = FingerprintBuilder::new();
        builder.add_identity("args").add_strategy("kwargs", dict_strategy);

        let digest = builder
            .build(&ctx(json!({"args": [1, "a"], "kwargs": {"y": 2, "x": 1}})))
            .unwrap();
        let expected = sha1_hex(br#"args{[1,"a"]}:kwargs{[["x",1],["y",2]]}"#);
        assert_eq!(digest, expected);
        assert_eq!(digest.len(), 40);
    }

    #[test]
    fn test_dict_strategy_sorts_pairs() {
        let mut object = Map::new();
        object.insert("y".to_string(), json!(2));
        object.insert("x".to_string(), json!(1));

        assert_eq!(
            dict_strategy(&Value::Object(object)).unwrap(),
            json!([["x", 1], ["y", 2]])
        );
    }

    #[test]
    fn test_dict_order_does_not_change_digest() {
        let builder = dict_builder();

        let first = builder.build(&ctx(json!({"a": {"x": 1, "y": 2}}))).unwrap();
        let second = builder.build(&ctx(json!({"a": {"y": 2, "x": 1}}))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_changed_value_changes_digest() {
        let builder = dict_builder();

        let first = builder.build(&ctx(json!({"a": {"x": 1, "y": 2}}))).unwrap();
        let second = builder.build(&ctx(json!({"a": {"x": 1, "y": 3}}))).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_equal_builders_agree() {
        let first = dict_builder();
        let second = dict_builder();
        let context = ctx(json!({"a": {"k": [1, 2]}}));

        assert_eq!(first.build(&context).unwrap(), second.build(&context).unwrap());
    }

    #[test]
    fn test_registration_order_matters() {
        let mut forward = FingerprintBuilder::new();
        forward.add_identity("a").add_identity("b");
        let mut backward = FingerprintBuilder::new();
        backward.add_identity("b").add_identity("a");
        let context = ctx(json!({"a": 1, "b": 2}));

        assert_ne!(
            forward.build(&context).unwrap(),
            backward.build(&context).unwrap()
        );
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut builder = FingerprintBuilder::new();
        builder.add_identity("a").add_identity("b");
        builder.add_strategy("a", dict_strategy);

        assert_eq!(builder.components().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(builder.build(&ctx(json!({"a": 1, "b": 2}))).is_err());
    }

    #[test]
    fn test_build_key() {
        let builder = dict_builder();
        let context = ctx(json!({"a": {}}));

        let key = builder.build_key("module.func", &context).unwrap();
        assert_eq!(key, format!("module.func:{}", builder.build(&context).unwrap()));
    }

    #[test]
    fn test_missing_component_is_an_error() {
        let builder = dict_builder();
        let result = builder.build(&ctx(json!({"other": 1})));
        assert!(matches!(result, Err(CacheError::Canonicalization(_))));
    }

    #[test]
    fn test_unsupported_shape_propagates() {
        let builder = dict_builder();
        let result = builder.build(&ctx(json!({"a": [1, 2]})));
        assert!(matches!(result, Err(CacheError::Canonicalization(_))));
    }

    #[test]
    fn test_pick_strategy() {
        let pick = pick_strategy(["accept", "x-missing"]);
        let picked = pick(&json!({"accept": "text/html", "cookie": "c=1"})).unwrap();
        assert_eq!(picked, json!(["text/html", null]));

        assert!(pick(&json!("nope")).is_err());
    }

    #[test]
    fn test_extra_context_entries_are_ignored() {
        let builder = dict_builder();
        let plain = builder.build(&ctx(json!({"a": {"x": 1}}))).unwrap();
        let extra = builder.build(&ctx(json!({"a": {"x": 1}, "b": 5}))).unwrap();
        assert_eq!(plain, extra);
    }
}
