//! User-defined records and enumerations.
//!
//! Records are plain Rust structs that implement [`Record`], almost always through
//! `#[derive(RefcodeObject)]`. The trait is the codec's view of "an object with
//! named fields": a stable, ordered list of serializable fields and a way to assign
//! a field by name on a default-constructed instance.
//!
//! Records are shared through [`Shared<T>`](crate::value::Shared) and travel inside
//! a [`Value`] as a type-erased [`RecordRef`], which can be downcast back to the
//! typed handle without losing identity.
//!
//! Fieldless Rust enums implement [`EnumMember`] (via `#[derive(RefcodeEnum)]`) and
//! travel as [`EnumValue`].

use crate::error::{RefcodeError, Result};
use crate::value::{Shared, Value};
use std::any::Any;
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Member attribute holding the member's value.
pub const MEMBER_VALUE_ATTR: &str = "_value_";
/// Member attribute holding the member's name.
pub const MEMBER_NAME_ATTR: &str = "_name_";
/// Member attribute holding the declaration position. Redundant on the wire.
pub const SORT_ORDER_ATTR: &str = "_sort_order_";
/// Member attribute pointing back at the enumeration type. Redundant on the wire.
pub const OWNER_ATTR: &str = "__objclass__";

/// The `namespace/name` string that identifies a record or enumeration type on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalType {
    namespace: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl CanonicalType {
    /// Creates a canonical type. Use [`validate`](Self::validate) to check it.
    pub fn new(
        namespace: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Splits a `namespace/name` string. Returns `None` unless there is exactly one `/`
    /// and the name is not empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, name) = s.split_once('/')?;
        let parsed = Self::new(namespace.to_owned(), name.to_owned());
        parsed.validate().ok()?;
        Some(parsed)
    }

    /// The namespace part (a Rust module path by default).
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The type name part.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks that the type can be written as a single `namespace/name` token.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("empty type name in namespace '{}'", self.namespace));
        }
        if self.namespace.contains('/') || self.name.contains('/') {
            return Err(format!("'{self}' contains more than one '/'"));
        }
        Ok(())
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A user-defined record type the codec can traverse and rebuild.
///
/// Implementations must keep [`fields`](Self::fields) in a stable order and must be
/// side-effect free to default-construct, since decoding creates a default instance
/// and assigns fields one by one.
pub trait Record: 'static {
    /// The canonical type written into `__ci`.
    fn canonical_type() -> CanonicalType
    where
        Self: Sized;

    /// The serializable fields, in declaration order, excluding skipped fields.
    fn fields(&self) -> Vec<(&'static str, Value)>;

    /// Assigns a field by its wire name. Returns `Ok(false)` if no such field exists.
    fn set_field(&mut self, name: &str, value: Value) -> Result<bool>;
}

/// Object-safe view of a `RefCell<T: Record>`. This is what a [`RecordRef`] points at.
pub trait RecordCell {
    /// The record's canonical type.
    fn record_type(&self) -> CanonicalType;

    /// Borrows the record and collects its fields.
    fn field_values(&self) -> Result<Vec<(&'static str, Value)>>;

    /// Mutably borrows the record and assigns one field.
    fn assign(&self, name: &str, value: Value) -> Result<bool>;

    /// Upcasts for downcasting back to `RefCell<T>`.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Record> RecordCell for RefCell<T> {
    fn record_type(&self) -> CanonicalType {
        T::canonical_type()
    }

    fn field_values(&self) -> Result<Vec<(&'static str, Value)>> {
        let record = self.try_borrow().map_err(|_| {
            RefcodeError::Internal(format!("record '{}' is mutably borrowed", T::canonical_type()))
        })?;
        Ok(record.fields())
    }

    fn assign(&self, name: &str, value: Value) -> Result<bool> {
        let mut record = self.try_borrow_mut().map_err(|_| {
            RefcodeError::Internal(format!("record '{}' is already borrowed", T::canonical_type()))
        })?;
        record.set_field(name, value)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-erased shared handle to a record.
#[derive(Clone)]
pub struct RecordRef(Rc<dyn RecordCell>);

impl RecordRef {
    /// Moves a record into a new shared handle.
    pub fn new<T: Record>(record: T) -> Self {
        Self(Rc::new(RefCell::new(record)))
    }

    /// Erases a typed handle. The result shares identity with `shared`.
    pub fn from_shared<T: Record>(shared: Shared<T>) -> Self {
        Self(shared)
    }

    /// Recovers the typed handle if the record is a `T`.
    pub fn downcast<T: Record>(&self) -> Option<Shared<T>> {
        Rc::clone(&self.0).into_any().downcast::<RefCell<T>>().ok()
    }

    /// The record's canonical type.
    pub fn record_type(&self) -> CanonicalType {
        self.0.record_type()
    }

    /// The record's serializable fields.
    pub fn fields(&self) -> Result<Vec<(&'static str, Value)>> {
        self.0.field_values()
    }

    /// Assigns a field by wire name.
    pub fn set_field(&self, name: &str, value: Value) -> Result<bool> {
        self.0.assign(name, value)
    }

    /// Returns true if both handles point at the same record.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(@{:#x})", self.record_type(), self.addr())
    }
}

/// A fieldless Rust enum whose variants can be written as enumeration members.
pub trait EnumMember: Sized + 'static {
    /// The canonical type written into `__cci`.
    fn canonical_type() -> CanonicalType;

    /// The variant name.
    fn member_name(&self) -> &'static str;

    /// The variant's discriminant.
    fn member_value(&self) -> i64;

    /// Zero-based position of the variant in the declaration.
    fn declaration_index(&self) -> usize;

    /// Looks a variant up by name.
    fn from_member_name(name: &str) -> Option<Self>;

    /// Erases the member.
    fn to_enum_value(&self) -> EnumValue {
        EnumValue::new(
            Self::canonical_type(),
            self.member_name(),
            self.member_value(),
            self.declaration_index(),
        )
    }
}

/// A type-erased enumeration member.
///
/// Two `EnumValue`s are equal (and identical, for the encoder) when they name the same
/// member of the same type.
#[derive(Debug, Clone)]
pub struct EnumValue {
    canonical: CanonicalType,
    name: &'static str,
    value: i64,
    sort_order: usize,
}

impl EnumValue {
    /// Creates a member description.
    pub fn new(
        canonical: CanonicalType,
        name: &'static str,
        value: i64,
        sort_order: usize,
    ) -> Self {
        Self {
            canonical,
            name,
            value,
            sort_order,
        }
    }

    /// The enumeration's canonical type.
    pub fn canonical_type(&self) -> &CanonicalType {
        &self.canonical
    }

    /// The member name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The member's discriminant.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// The member's attribute bag, including the attributes the encoder skips.
    pub fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![
            (MEMBER_VALUE_ATTR, Value::Int(self.value)),
            (MEMBER_NAME_ATTR, Value::Str(self.name.to_owned())),
            (SORT_ORDER_ATTR, Value::Int(self.sort_order as i64)),
        ]
    }

    /// Converts back to the typed member if the types match.
    pub fn to_member<T: EnumMember>(&self) -> Option<T> {
        if self.canonical != T::canonical_type() {
            return None;
        }
        T::from_member_name(self.name)
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical && self.name == other.name
    }
}

impl Eq for EnumValue {}

impl Hash for EnumValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
        self.name.hash(state);
    }
}
