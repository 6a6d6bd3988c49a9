//! Runtime value model: a closed tagged union of variants, plus the
//! HashKey derivation used by the Hash variant and the `Index` opcode.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

/// A value's hashable identity, derived from Integer/Boolean/String.
/// Any other variant fails at runtime with "unusable as hash key".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(Rc<String>),
}

pub type HashMapT = IndexMap<HashKey, (Value, Value), BuildHasherDefault<FxHasher>>;

/// Runtime object variants. Every opcode knows exactly which variants it
/// accepts, so matches across this enum are written exhaustively rather
/// than with a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    String(Rc<String>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashMapT>),
    CompiledFunction(Rc<CompiledFunction>),
}

/// An owned, immutable instruction sequence produced by the compiler for
/// a function literal's body. Lives in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::String(Rc::new(s.into()))
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::String(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::CompiledFunction(_) => "COMPILED_FUNCTION",
        }
    }

    pub fn inspect(&self) -> String {
        match self {
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
            Value::String(s) => s.as_str().to_string(),
            Value::Array(elements) => {
                let items: Vec<String> = elements.iter().map(Value::inspect).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Hash(pairs) => {
                let items: Vec<String> = pairs
                    .values()
                    .map(|(k, v)| format!("{}: {}", k.inspect(), v.inspect()))
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::CompiledFunction(f) => format!("CompiledFunction[{:p}]", Rc::as_ptr(f)),
        }
    }

    /// False and Null are falsy; every other value is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    pub fn hash_key(&self) -> Result<HashKey, String> {
        match self {
            Value::Integer(i) => Ok(HashKey::Integer(*i)),
            Value::Boolean(b) => Ok(HashKey::Boolean(*b)),
            Value::String(s) => Ok(HashKey::String(s.clone())),
            other => Err(format!("unusable as hash key: {}", other.type_tag())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inspect())
    }
}
