use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::parser::Node;
use crate::runtime::script_object::{ObjectValue, ScriptObject};

/// Runtime value representation
///
/// Strings, lists, lambdas and scriptables are held by reference: cloning a
/// `Value` never deep-copies container contents.
#[derive(Clone)]
pub enum Value {
    /// Null value; matches type only with another null
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed 32-bit integer value
    Int(i32),
    /// 32-bit floating-point value
    Float(f32),
    /// String value
    String(String),
    /// List of values (reference-counted)
    List(Rc<Vec<Value>>),
    /// First-class function value
    Lambda(Rc<Lambda>),
    /// Script object handle
    Scriptable(Rc<dyn ScriptObject>),
    /// Opaque host value, operated on only by host-registered operators
    Extrinsic(Extrinsic),
}

/// A first-class function: parameter names plus a reference to the body nodes
#[derive(Debug)]
pub struct Lambda {
    /// Parameter names in declaration order
    pub params: Vec<String>,
    /// Body expression nodes, evaluated per call
    pub body: Vec<Rc<Node>>,
}

/// Host value opaque to the interpreter core
#[derive(Clone)]
pub struct Extrinsic {
    label: &'static str,
    value: Rc<dyn Any>,
}

impl Extrinsic {
    /// Wraps a host value
    pub fn new<T: Any>(value: T) -> Self {
        Extrinsic {
            label: std::any::type_name::<T>(),
            value: Rc::new(value),
        }
    }

    /// The host type's name, for display and error messages
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Downcasts back to the host type
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.value.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Extrinsic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<extrinsic {}>", self.label)
    }
}

impl Value {
    /// Creates a list value from a vector of values
    pub fn list(values: Vec<Value>) -> Self {
        Value::List(Rc::new(values))
    }

    /// Creates a lambda value
    pub fn lambda(params: Vec<String>, body: Vec<Rc<Node>>) -> Self {
        Value::Lambda(Rc::new(Lambda { params, body }))
    }

    /// Wraps a script object handle
    pub fn scriptable(obj: Rc<dyn ScriptObject>) -> Self {
        Value::Scriptable(obj)
    }

    /// Wraps an opaque host value
    pub fn extrinsic<T: Any>(value: T) -> Self {
        Value::Extrinsic(Extrinsic::new(value))
    }

    /// Returns the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Lambda(_) => "lambda",
            Value::Scriptable(_) => "object",
            Value::Extrinsic(_) => "extrinsic",
        }
    }

    /// Strict truth: exactly boolean `true`, or a list whose every element
    /// is strictly true
    pub fn is_strictly_true(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::List(items) => items.iter().all(Value::is_strictly_true),
            _ => false,
        }
    }

    /// Loose truth: strictly true, a non-zero number, a non-empty string,
    /// or a list whose every element is loosely true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => items.iter().all(Value::is_truthy),
            _ => false,
        }
    }

    /// The integer payload, when this is an int
    pub fn try_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The float payload, promoting an int
    pub fn try_float(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f32),
            _ => None,
        }
    }

    /// The bool payload, when this is a bool
    pub fn try_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string payload, when this is a string
    pub fn try_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The list payload, when this is a list
    pub fn try_list(&self) -> Option<&Rc<Vec<Value>>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// The script object handle, when this is a scriptable
    pub fn try_scriptable(&self) -> Option<&Rc<dyn ScriptObject>> {
        match self {
            Value::Scriptable(obj) => Some(obj),
            _ => None,
        }
    }

    /// True for numeric values
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Plain text form, used by string operators: strings render without
    /// quotes, everything else renders as displayed
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Converts to a host JSON value
    ///
    /// Scriptables materialise through their key capability; lambdas and
    /// extrinsics have no data form and render as descriptive strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f as f64)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Scriptable(obj) => {
                let mut map = serde_json::Map::new();
                for key in obj.keys() {
                    let value = obj.get(&key).unwrap_or(Value::Null);
                    map.insert(key, value.to_json());
                }
                serde_json::Value::Object(map)
            }
            Value::Lambda(lambda) => {
                serde_json::Value::String(format!("<lambda({} params)>", lambda.params.len()))
            }
            Value::Extrinsic(e) => serde_json::Value::String(format!("<extrinsic {}>", e.label())),
        }
    }

    /// Converts a host JSON value into a script value
    ///
    /// Numbers in i32 range become ints; everything else numeric becomes a
    /// float. Objects become map-backed scriptables.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if let Ok(small) = i32::try_from(i) {
                        return Value::Int(small);
                    }
                }
                Value::Float(n.as_f64().unwrap_or(0.0) as f32)
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let obj = ObjectValue::new();
                for (key, value) in map {
                    obj.set(key, Value::from_json(value));
                }
                Value::Scriptable(Rc::new(obj))
            }
        }
    }
}

/// Formats a float so that it re-parses as a float
pub(crate) fn format_float(f: f32) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::Scriptable(a), Value::Scriptable(b)) => Rc::ptr_eq(a, b),
            (Value::Extrinsic(a), Value::Extrinsic(b)) => Rc::ptr_eq(&a.value, &b.value),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(fl) => write!(f, "{}", format_float(*fl)),
            Value::String(s) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Lambda(lambda) => write!(f, "<lambda({} params)>", lambda.params.len()),
            Value::Scriptable(obj) => {
                for (i, key) in obj.keys().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    let value = obj.get(key).unwrap_or(Value::Null);
                    write!(f, "{{{} {}}}", key, value)?;
                }
                Ok(())
            }
            Value::Extrinsic(e) => write!(f, "<extrinsic {}>", e.label()),
        }
    }
}
