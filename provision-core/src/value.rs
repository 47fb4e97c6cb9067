use crate::error::ProvisionError;
use crate::id::{Fingerprint, ObjectId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A typed value passed to or returned from a behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// No value (operations that only change state)
    Unit,
    Bool(bool),
    U64(u64),
    /// An identity or object
    Id(ObjectId),
    /// A content fingerprint
    Hash(Fingerprint),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<ObjectId> {
        match self {
            Value::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<Fingerprint> {
        match self {
            Value::Hash(hash) => Some(*hash),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::U64(_) => "u64",
            Value::Id(_) => "id",
            Value::Hash(_) => "hash",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(value) => write!(f, "{}", value),
            Value::U64(value) => write!(f, "{}", value),
            Value::Id(id) => write!(f, "{}", id),
            Value::Hash(hash) => write!(f, "{}", hash),
            Value::Text(text) => write!(f, "{:?}", text),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Id(id)
    }
}

impl From<Fingerprint> for Value {
    fn from(hash: Fingerprint) -> Self {
        Value::Hash(hash)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Positional arguments of a call, a spawn or an initializer
///
/// The typed accessors fail with `InvalidParameters` when a slot is missing
/// or holds a value of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Args(Vec<Value>);

impl Args {
    pub fn new() -> Self {
        Args(Vec::new())
    }

    /// Append a value, builder style
    pub fn with(mut self, value: impl Into<Value>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.iter()
    }

    /// Fail unless exactly `expected` arguments were supplied
    pub fn expect_len(&self, expected: usize) -> Result<(), ProvisionError> {
        if self.0.len() != expected {
            return Err(ProvisionError::InvalidParameters(format!(
                "expected {} argument(s), got {}",
                expected,
                self.0.len()
            )));
        }
        Ok(())
    }

    fn slot(&self, index: usize) -> Result<&Value, ProvisionError> {
        self.0.get(index).ok_or_else(|| {
            ProvisionError::InvalidParameters(format!("missing argument #{}", index))
        })
    }

    fn mismatch(index: usize, expected: &str, found: &Value) -> ProvisionError {
        ProvisionError::InvalidParameters(format!(
            "argument #{} must be {}, found {}",
            index,
            expected,
            found.type_name()
        ))
    }

    pub fn bool(&self, index: usize) -> Result<bool, ProvisionError> {
        let value = self.slot(index)?;
        value.as_bool().ok_or_else(|| Self::mismatch(index, "bool", value))
    }

    pub fn u64(&self, index: usize) -> Result<u64, ProvisionError> {
        let value = self.slot(index)?;
        value.as_u64().ok_or_else(|| Self::mismatch(index, "u64", value))
    }

    pub fn id(&self, index: usize) -> Result<ObjectId, ProvisionError> {
        let value = self.slot(index)?;
        value.as_id().ok_or_else(|| Self::mismatch(index, "id", value))
    }

    pub fn hash(&self, index: usize) -> Result<Fingerprint, ProvisionError> {
        let value = self.slot(index)?;
        value.as_hash().ok_or_else(|| Self::mismatch(index, "hash", value))
    }

    pub fn text(&self, index: usize) -> Result<&str, ProvisionError> {
        let value = self.slot(index)?;
        value.as_text().ok_or_else(|| Self::mismatch(index, "text", value))
    }

    pub fn list(&self, index: usize) -> Result<&[Value], ProvisionError> {
        let value = self.slot(index)?;
        value.as_list().ok_or_else(|| Self::mismatch(index, "list", value))
    }

    /// A list argument whose every element is a u64
    pub fn u64_list(&self, index: usize) -> Result<Vec<u64>, ProvisionError> {
        self.list(index)?
            .iter()
            .map(|item| item.as_u64().ok_or_else(|| Self::mismatch(index, "list of u64", item)))
            .collect()
    }
}

impl From<Vec<Value>> for Args {
    fn from(values: Vec<Value>) -> Self {
        Args(values)
    }
}

impl FromIterator<Value> for Args {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Args(iter.into_iter().collect())
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Build an [`Args`] list from anything convertible into a [`Value`]
#[macro_export]
macro_rules! args {
    () => {
        $crate::value::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::value::Args::from(vec![$($crate::value::Value::from($value)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors() {
        let owner = ObjectId::from_label("owner");
        let args = args!["Clone One", "C1", 42u64, owner, true];

        assert_eq!(args.len(), 5);
        assert_eq!(args.text(0).unwrap(), "Clone One");
        assert_eq!(args.text(1).unwrap(), "C1");
        assert_eq!(args.u64(2).unwrap(), 42);
        assert_eq!(args.id(3).unwrap(), owner);
        assert!(args.bool(4).unwrap());
    }

    #[test]
    fn test_missing_and_mistyped_arguments() {
        let args = args!["only text"];

        let err = args.u64(0).unwrap_err();
        assert_eq!(err.code(), "InvalidParameters");
        assert!(err.to_string().contains("must be u64"));

        let err = args.text(1).unwrap_err();
        assert!(err.to_string().contains("missing argument #1"));

        assert!(args.expect_len(1).is_ok());
        assert!(args.expect_len(2).is_err());
    }

    #[test]
    fn test_u64_lists() {
        let args = args![vec![0u64, 4u64], vec![Value::U64(1), Value::from("x")]];
        assert_eq!(args.u64_list(0).unwrap(), vec![0, 4]);
        assert!(args.u64_list(1).is_err());
    }

    #[test]
    fn test_display() {
        let args = Args::new().with("uri").with(3u64);
        assert_eq!(args.to_string(), "(\"uri\", 3)");
        assert_eq!(args!().to_string(), "()");
    }
}
