//! Scratch storage scoped to one phase or one request.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Typed, string-keyed scratch values belonging to one component.
#[derive(Default)]
pub struct Scratch {
    values: HashMap<String, Box<dyn Any + Send>>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_owned(), Box::new(value));
    }

    /// Value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Scratch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("Scratch").field("keys", &keys).finish()
    }
}
