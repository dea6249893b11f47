use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::Value;

/// The object-with-named-fields capability
///
/// Object literals and host-provided objects are addressed through this
/// interface only; the language core never depends on a concrete backing.
/// Mutating methods report whether the object accepted the operation.
pub trait ScriptObject {
    /// Key names, in the object's natural order
    fn keys(&self) -> Vec<String>;

    /// Value stored under the key, if any
    fn get(&self, key: &str) -> Option<Value>;

    /// Stores a value under the key; returns whether the write was accepted
    fn set(&self, key: &str, value: Value) -> bool;

    /// Removes the key; returns whether the removal was accepted
    fn try_clear(&self, key: &str) -> bool;
}

/// Materialises a script object into a key → T map via a caller-supplied
/// mapper
pub fn to_map<T>(obj: &dyn ScriptObject, mut mapper: impl FnMut(Value) -> T) -> HashMap<String, T> {
    let mut map = HashMap::new();
    for key in obj.keys() {
        if let Some(value) = obj.get(&key) {
            map.insert(key, mapper(value));
        }
    }
    map
}

/// The built-in object literal: an insertion-ordered map plus a tag list
#[derive(Default)]
pub struct ObjectValue {
    entries: RefCell<Vec<(String, Value)>>,
    index: RefCell<HashMap<String, usize>>,
    tags: RefCell<Vec<String>>,
}

impl ObjectValue {
    /// Creates an empty object
    pub fn new() -> Self {
        ObjectValue::default()
    }

    /// Tags attached to this object, in order
    pub fn tags(&self) -> Vec<String> {
        self.tags.borrow().clone()
    }

    /// Appends a tag
    pub fn add_tag(&self, tag: impl Into<String>) {
        self.tags.borrow_mut().push(tag.into());
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True when the object holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl ScriptObject for ObjectValue {
    fn keys(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    fn get(&self, key: &str) -> Option<Value> {
        let index = *self.index.borrow().get(key)?;
        Some(self.entries.borrow()[index].1.clone())
    }

    fn set(&self, key: &str, value: Value) -> bool {
        let mut index = self.index.borrow_mut();
        let mut entries = self.entries.borrow_mut();
        match index.get(key) {
            Some(&i) => entries[i].1 = value,
            None => {
                index.insert(key.to_string(), entries.len());
                entries.push((key.to_string(), value));
            }
        }
        true
    }

    fn try_clear(&self, key: &str) -> bool {
        let mut index = self.index.borrow_mut();
        let Some(removed) = index.remove(key) else {
            return false;
        };
        let mut entries = self.entries.borrow_mut();
        entries.remove(removed);
        for slot in index.values_mut() {
            if *slot > removed {
                *slot -= 1;
            }
        }
        true
    }
}

/// A script object backed by host-supplied closures
///
/// Reads go through the getter; writes are rejected unless a setter was
/// provided. Clearing is never accepted.
pub struct ClosureObject {
    keys: Box<dyn Fn() -> Vec<String>>,
    getter: Box<dyn Fn(&str) -> Option<Value>>,
    setter: Option<Box<dyn Fn(&str, Value) -> bool>>,
}

impl ClosureObject {
    /// Creates a read-only closure-backed object
    pub fn read_only(
        keys: impl Fn() -> Vec<String> + 'static,
        getter: impl Fn(&str) -> Option<Value> + 'static,
    ) -> Self {
        ClosureObject {
            keys: Box::new(keys),
            getter: Box::new(getter),
            setter: None,
        }
    }

    /// Creates a read-write closure-backed object
    pub fn read_write(
        keys: impl Fn() -> Vec<String> + 'static,
        getter: impl Fn(&str) -> Option<Value> + 'static,
        setter: impl Fn(&str, Value) -> bool + 'static,
    ) -> Self {
        ClosureObject {
            keys: Box::new(keys),
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
        }
    }
}

impl ScriptObject for ClosureObject {
    fn keys(&self) -> Vec<String> {
        (self.keys)()
    }

    fn get(&self, key: &str) -> Option<Value> {
        (self.getter)(key)
    }

    fn set(&self, key: &str, value: Value) -> bool {
        match &self.setter {
            Some(setter) => setter(key, value),
            None => false,
        }
    }

    fn try_clear(&self, _key: &str) -> bool {
        false
    }
}

/// A script object over a host JSON map, exposing host data fields
pub struct JsonObject {
    map: RefCell<serde_json::Map<String, serde_json::Value>>,
}

impl JsonObject {
    /// Wraps a JSON object map
    pub fn new(map: serde_json::Map<String, serde_json::Value>) -> Self {
        JsonObject {
            map: RefCell::new(map),
        }
    }

    /// The current JSON contents
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.map.borrow().clone())
    }
}

impl ScriptObject for JsonObject {
    fn keys(&self) -> Vec<String> {
        self.map.borrow().keys().cloned().collect()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.map.borrow().get(key).map(Value::from_json)
    }

    fn set(&self, key: &str, value: Value) -> bool {
        self.map.borrow_mut().insert(key.to_string(), value.to_json());
        true
    }

    fn try_clear(&self, key: &str) -> bool {
        self.map.borrow_mut().remove(key).is_some()
    }
}

/// Builds a new object literal carrying the keys of both arguments, with the
/// later object overriding the earlier; values are carried by reference
pub fn merged(first: &dyn ScriptObject, second: &dyn ScriptObject) -> ObjectValue {
    let result = ObjectValue::new();
    for key in first.keys() {
        if let Some(value) = first.get(&key) {
            result.set(&key, value);
        }
    }
    for key in second.keys() {
        if let Some(value) = second.get(&key) {
            result.set(&key, value);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_value_insertion_order() {
        let obj = ObjectValue::new();
        obj.set("b", Value::Int(2));
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(3));
        assert_eq!(obj.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(obj.get("b"), Some(Value::Int(3)));
    }

    #[test]
    fn test_object_value_try_clear() {
        let obj = ObjectValue::new();
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(2));
        assert!(obj.try_clear("a"));
        assert!(!obj.try_clear("a"));
        assert_eq!(obj.get("b"), Some(Value::Int(2)));
        assert_eq!(obj.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_closure_object_read_only_rejects_writes() {
        let obj = ClosureObject::read_only(
            || vec!["version".to_string()],
            |key| (key == "version").then(|| Value::Int(3)),
        );
        assert_eq!(obj.get("version"), Some(Value::Int(3)));
        assert!(!obj.set("version", Value::Int(4)));
        assert!(!obj.try_clear("version"));
    }

    #[test]
    fn test_json_object_bridges_values() {
        let map = match serde_json::json!({"n": 5, "s": "x"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let obj = JsonObject::new(map);
        assert_eq!(obj.get("n"), Some(Value::Int(5)));
        assert!(obj.set("t", Value::Bool(true)));
        assert_eq!(obj.get("t"), Some(Value::Bool(true)));
        assert!(obj.try_clear("s"));
        assert_eq!(obj.get("s"), None);
    }

    #[test]
    fn test_merge_later_overrides() {
        let a = ObjectValue::new();
        a.set("x", Value::Int(1));
        a.set("y", Value::Int(2));
        let b = ObjectValue::new();
        b.set("y", Value::Int(9));
        b.set("z", Value::Int(3));

        let merged = merged(&a, &b);
        assert_eq!(merged.get("x"), Some(Value::Int(1)));
        assert_eq!(merged.get("y"), Some(Value::Int(9)));
        assert_eq!(merged.get("z"), Some(Value::Int(3)));
    }

    #[test]
    fn test_to_map_with_mapper() {
        let obj = ObjectValue::new();
        obj.set("a", Value::Int(1));
        obj.set("b", Value::Int(2));
        let map = to_map(&obj, |v| v.try_int().unwrap_or(0) * 10);
        assert_eq!(map.get("a"), Some(&10));
        assert_eq!(map.get("b"), Some(&20));
    }
}
