//! Memoization Module
//!
//! Caches function results under keys fingerprinted from the call's
//! arguments: positional arguments as-is, keyword arguments sorted by name.

use std::any::type_name;
use std::panic::Location;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::facade::get_or_set_with;
use crate::cache::{CacheBackend, Expiry};
use crate::error::Result;
use crate::fingerprint::{dict_strategy, Context, FingerprintBuilder};

// == Memoizer ==
/// Memoizes calls into one backend.
pub struct Memoizer {
    backend: Arc<dyn CacheBackend>,
    key: Option<String>,
    expiry: Expiry,
    fingerprint: FingerprintBuilder,
}

impl Memoizer {
    // == Constructor ==
    pub fn new(backend: Arc<dyn CacheBackend>, key: Option<String>, expiry: Expiry) -> Self {
        let mut fingerprint = FingerprintBuilder::new();
        fingerprint
            .add_identity("args")
            .add_strategy("kwargs", dict_strategy);
        Self {
            backend,
            key,
            expiry,
            fingerprint,
        }
    }

    /// Key under which a call is cached. A call without arguments uses the
    /// base key alone.
    pub fn key_for(&self, base: &str, args: &[Value], kwargs: &Map<String, Value>) -> Result<String> {
        if args.is_empty() && kwargs.is_empty() {
            return Ok(base.to_string());
        }
        let mut context = Context::new();
        context.insert("args".to_string(), Value::Array(args.to_vec()));
        context.insert("kwargs".to_string(), Value::Object(kwargs.clone()));
        self.fingerprint.build_key(base, &context)
    }

    // == Call ==
    /// Runs `f` unless a result for these arguments is cached.
    #[track_caller]
    pub fn call<T, F>(&self, args: &[Value], kwargs: &Map<String, Value>, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        let base = self.base_key::<F>(Location::caller());
        let key = self.key_for(&base, args, kwargs)?;
        Ok(get_or_set_with(&*self.backend, &key, f, self.expiry).0)
    }

    // == Wrap ==
    /// Wraps a one-argument function. The argument is serialized: an array
    /// becomes positional arguments, an object keyword arguments, `null`
    /// (or `()`) no arguments, and any other value a single positional
    /// argument.
    #[track_caller]
    pub fn wrap<A, T, F>(self, f: F) -> impl Fn(A) -> Result<T>
    where
        A: Serialize,
        T: Serialize + DeserializeOwned,
        F: Fn(A) -> T,
    {
        let base = self.base_key::<F>(Location::caller());
        move |arg: A| -> Result<T> {
            let (args, kwargs) = split_arguments(serde_json::to_value(&arg)?);
            let key = self.key_for(&base, &args, &kwargs)?;
            Ok(get_or_set_with(&*self.backend, &key, || f(arg), self.expiry).0)
        }
    }

    /// Explicit key, else the function's type name plus the wrapping call
    /// site. Closures in one function share a type name, so the site keeps
    /// them apart.
    fn base_key<F>(&self, site: &Location<'_>) -> String {
        self.key.clone().unwrap_or_else(|| {
            format!(
                "{}@{}:{}:{}",
                type_name::<F>(),
                site.file(),
                site.line(),
                site.column()
            )
        })
    }
}

fn split_arguments(value: Value) -> (Vec<Value>, Map<String, Value>) {
    match value {
        Value::Null => (Vec::new(), Map::new()),
        Value::Array(args) => (args, Map::new()),
        Value::Object(kwargs) => (Vec::new(), kwargs),
        other => (vec![other], Map::new()),
    }
}
