//! External value source for dependency names no resolve provides.

use crate::core::Value;
use std::collections::HashMap;

/// Supplies values for names that are neither resolves nor built-in locals.
pub trait Injector: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Injector backed by a fixed name → value map.
///
/// ```rust
/// use waypoint::resolve::{Injector, StaticInjector};
/// use serde_json::json;
///
/// let injector = StaticInjector::new().with("apiBase", json!("/api"));
/// assert_eq!(injector.get("apiBase"), Some(json!("/api")));
/// assert!(!injector.has("missing"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticInjector {
    values: HashMap<String, Value>,
}

impl StaticInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }
}

impl Injector for StaticInjector {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    fn has(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}
