//! Runtime utilities used by the derived code.
//!
//! `#[derive(RefcodeObject)]` turns every field into a [`Value`] with [`ToValue`] and
//! assigns decoded values back with [`FromValue`]. Implement both traits for your own
//! field types if the built-in set is not enough.
//!
//! Conversions into handle types (`List`, `Map`, `Shared<T>`, ...) keep identity.
//! `Vec<T>` is a convenience that copies: a `Vec` field decodes correctly, but two
//! `Vec` fields can never share one list.

use crate::error::{RefcodeError, Result};
use crate::record::{CanonicalType, EnumValue, Record, RecordRef};
use crate::value::{Date, List, Map, Set, Shared, Tuple, Value};
use chrono::NaiveDate;

/// Converts a field into a graph value.
pub trait ToValue {
    /// Produces the value. Handle types return a clone of the handle.
    fn to_value(&self) -> Value;
}

/// Converts a decoded graph value into a field.
pub trait FromValue: Sized {
    /// Consumes the value.
    fn from_value(value: Value) -> Result<Self>;
}

/// Assigns `value` to `slot`, tagging a conversion failure with the record and field.
pub fn assign_field<T, F>(slot: &mut T, value: Value, record: F, field: &str) -> Result<()>
where
    T: FromValue,
    F: FnOnce() -> CanonicalType,
{
    *slot = T::from_value(value).map_err(|e| e.in_field(record().to_string(), field))?;
    Ok(())
}

fn mismatch(expected: &'static str, found: &Value) -> RefcodeError {
    RefcodeError::ValueMismatch {
        expected,
        found: found.type_label().to_owned(),
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

macro_rules! impl_integer_value {
    ($($t:ty),*) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::Int(i) => <$t>::try_from(i).map_err(|_| RefcodeError::ValueMismatch {
                            expected: stringify!($t),
                            found: format!("out-of-range integer {i}"),
                        }),
                        other => Err(mismatch(stringify!($t), &other)),
                    }
                }
            }
        )*
    }
}

impl_integer_value!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("f64", &other)),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Date(Date::new(*self))
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(d.get()),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::None, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(List::from_vec(self.iter().map(ToValue::to_value).collect()))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(l) => l.to_vec().into_iter().map(T::from_value).collect(),
            Value::Tuple(t) => t.items().iter().cloned().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: Record> ToValue for Shared<T> {
    fn to_value(&self) -> Value {
        Value::Record(RecordRef::from_shared(self.clone()))
    }
}

impl<T: Record> FromValue for Shared<T> {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Record(r) => r.downcast::<T>().ok_or_else(|| RefcodeError::ValueMismatch {
                expected: std::any::type_name::<T>(),
                found: format!("record '{}'", r.record_type()),
            }),
            other => Err(mismatch(std::any::type_name::<T>(), &other)),
        }
    }
}

macro_rules! impl_handle_value {
    ($($t:ident => $variant:ident, $label:literal);* $(;)?) => {
        $(
            impl ToValue for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(self.clone())
                }
            }

            impl FromValue for $t {
                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(h) => Ok(h),
                        other => Err(mismatch($label, &other)),
                    }
                }
            }
        )*
    }
}

impl_handle_value!(
    RecordRef => Record, "record";
    List => List, "list";
    Set => Set, "set";
    Map => Map, "map";
    Date => Date, "date";
    EnumValue => Enum, "enum";
);

impl ToValue for Tuple {
    fn to_value(&self) -> Value {
        Value::Tuple(self.clone())
    }
}

/// Tuples come back from the wire as lists; the elements are copied into a new tuple.
impl FromValue for Tuple {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Tuple(t) => Ok(t),
            Value::List(l) => Ok(Tuple::new(l.to_vec())),
            other => Err(mismatch("tuple", &other)),
        }
    }
}
