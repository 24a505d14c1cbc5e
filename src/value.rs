//! The runtime object model the codec reads and rebuilds.
//!
//! A [`Value`] is either a plain scalar (string, boolean, integer, float), absence
//! (`None`), or a *handle* to a shared allocation: records, lists, tuples, sets,
//! maps, and dates. Handles carry identity. Cloning a `Value::List` clones the
//! pointer, not the list, so two fields holding clones of the same handle are
//! "the same list" for the encoder and will decode as one list again.
//!
//! Enumeration members have no allocation; their identity is their
//! `(canonical type, member name)` pair.
//!
//! ## Equality
//!
//! `PartialEq`/`Hash` on `Value` are the semantics used for set members and map keys:
//! scalars, dates, tuples and enumeration members compare by value, everything
//! mutable compares by identity. Use [`Value::graph_eq`] for a structural, cycle-safe
//! comparison of two graphs.
//!
//! ## Cycles
//!
//! Handles are reference counted. A graph that contains a cycle keeps itself alive
//! after the last outside handle is dropped; clear one edge of the cycle if the
//! memory matters.

use crate::depth;
use crate::record::{EnumValue, Record, RecordRef};
use chrono::NaiveDate;
use indexmap::{IndexMap, IndexSet};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Shared, mutable ownership of a typed record.
pub type Shared<T> = Rc<RefCell<T>>;

/// Wraps a record into a [`Shared`] handle.
pub fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// The structural category of a value, decided by its runtime shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// String, boolean, integer or float. Always inlined by value.
    Simple,
    /// Absence. Always inlined.
    None,
    /// A user-defined record.
    Record,
    /// An ordered, growable sequence.
    Sequence,
    /// A fixed ordered sequence.
    Tuple,
    /// An unordered collection of distinct members.
    Set,
    /// An association from keys to values.
    Mapping,
    /// A member of a user-defined enumeration.
    Enumeration,
    /// A calendar date.
    Date,
}

impl Category {
    /// Returns true for the categories that are never identity-tracked.
    pub fn is_inline(self) -> bool {
        matches!(self, Self::Simple | Self::None)
    }
}

/// The key the encoder uses to tell two values apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Address of a handle's shared allocation.
    Address(usize),
    /// Enumeration member: canonical type string and member name.
    Member(String, &'static str),
}

macro_rules! impl_cell_handle {
    ($name:ident, $inner:ty) => {
        impl $name {
            /// Immutably borrows the contents.
            ///
            /// # Panics
            ///
            /// Panics if the contents are currently mutably borrowed.
            pub fn borrow(&self) -> Ref<'_, $inner> {
                self.0.borrow()
            }

            /// Mutably borrows the contents.
            ///
            /// # Panics
            ///
            /// Panics if the contents are currently borrowed.
            pub fn borrow_mut(&self) -> RefMut<'_, $inner> {
                self.0.borrow_mut()
            }

            /// Returns true if both handles point at the same allocation.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Rc::ptr_eq(&self.0, &other.0)
            }

            /// Number of elements.
            pub fn len(&self) -> usize {
                self.0.borrow().len()
            }

            /// Returns true if there are no elements.
            pub fn is_empty(&self) -> bool {
                self.0.borrow().is_empty()
            }

            pub(crate) fn addr(&self) -> usize {
                Rc::as_ptr(&self.0) as *const () as usize
            }

            pub(crate) fn try_read(&self) -> crate::Result<Ref<'_, $inner>> {
                self.0.try_borrow().map_err(|_| {
                    crate::RefcodeError::Internal(format!(
                        "{} at {:#x} is mutably borrowed",
                        stringify!($name),
                        self.addr()
                    ))
                })
            }

            pub(crate) fn try_write(&self) -> crate::Result<RefMut<'_, $inner>> {
                self.0.try_borrow_mut().map_err(|_| {
                    crate::RefcodeError::Internal(format!(
                        "{} at {:#x} is already borrowed",
                        stringify!($name),
                        self.addr()
                    ))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self(Rc::new(RefCell::new(<$inner>::default())))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0.try_borrow() {
                    Ok(inner) => write!(
                        f,
                        "{}(@{:#x}, len={})",
                        stringify!($name),
                        self.addr(),
                        inner.len()
                    ),
                    Err(_) => write!(f, "{}(@{:#x}, <borrowed>)", stringify!($name), self.addr()),
                }
            }
        }
    };
}

/// Shared handle to an ordered sequence.
#[derive(Clone)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl_cell_handle!(List, Vec<Value>);

impl List {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a list owning `items`.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Appends an element.
    pub fn push(&self, item: impl Into<Value>) {
        self.0.borrow_mut().push(item.into());
    }

    /// Returns a clone of the element at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Clones the current elements out of the list.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }
}

/// Shared handle to an insertion-ordered set.
#[derive(Clone)]
pub struct Set(Rc<RefCell<IndexSet<Value>>>);

impl_cell_handle!(Set, IndexSet<Value>);

impl Set {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a member; returns false if an equal member was already present.
    pub fn insert(&self, item: impl Into<Value>) -> bool {
        self.0.borrow_mut().insert(item.into())
    }

    /// Returns true if an equal member is present.
    pub fn contains(&self, item: &Value) -> bool {
        self.0.borrow().contains(item)
    }

    /// Clones the members out in insertion order.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().iter().cloned().collect()
    }
}

/// Shared handle to an insertion-ordered mapping.
#[derive(Clone)]
pub struct Map(Rc<RefCell<IndexMap<Value, Value>>>);

impl_cell_handle!(Map, IndexMap<Value, Value>);

impl Map {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the previous value for an equal key.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Clones the entries out in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Shared handle to an immutable ordered sequence.
#[derive(Clone)]
pub struct Tuple(Rc<[Value]>);

impl Tuple {
    /// Creates a tuple from its elements.
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::from(items))
    }

    /// The elements.
    pub fn items(&self) -> &[Value] {
        &self.0
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the tuple has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tuple(@{:#x}, len={})", self.addr(), self.len())
    }
}

/// Shared handle to a calendar date.
#[derive(Clone)]
pub struct Date(Rc<NaiveDate>);

impl Date {
    /// Wraps a date into a new handle.
    pub fn new(date: NaiveDate) -> Self {
        Self(Rc::new(date))
    }

    /// Builds a handle from year, month and day, if they form a valid date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self::new)
    }

    /// The date value.
    pub fn get(&self) -> NaiveDate {
        *self.0
    }

    /// Returns true if both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date({})", self.0)
    }
}

/// A node in an object graph.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence.
    #[default]
    None,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Record handle.
    Record(RecordRef),
    /// List handle.
    List(List),
    /// Tuple handle.
    Tuple(Tuple),
    /// Set handle.
    Set(Set),
    /// Map handle.
    Map(Map),
    /// Enumeration member.
    Enum(EnumValue),
    /// Date handle.
    Date(Date),
}

impl Value {
    /// Classifies the value.
    pub fn category(&self) -> Category {
        match self {
            Self::None => Category::None,
            Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => Category::Simple,
            Self::Record(_) => Category::Record,
            Self::List(_) => Category::Sequence,
            Self::Tuple(_) => Category::Tuple,
            Self::Set(_) => Category::Set,
            Self::Map(_) => Category::Mapping,
            Self::Enum(_) => Category::Enumeration,
            Self::Date(_) => Category::Date,
        }
    }

    /// The identity used for deduplication, or `None` for inlined values.
    pub fn identity(&self) -> Option<Identity> {
        let addr = match self {
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Str(_) => {
                return None;
            }
            Self::Enum(member) => {
                return Some(Identity::Member(
                    member.canonical_type().to_string(),
                    member.name(),
                ));
            }
            Self::Record(r) => r.addr(),
            Self::List(l) => l.addr(),
            Self::Tuple(t) => t.addr(),
            Self::Set(s) => s.addr(),
            Self::Map(m) => m.addr(),
            Self::Date(d) => d.addr(),
        };
        Some(Identity::Address(addr))
    }

    /// A short name for the value's shape, used in error messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Enum(_) => "enum",
            Self::Date(_) => "date",
        }
    }

    /// Returns true for `Value::None`.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// The string, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer, if this is an integer scalar.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The float, if this is a float scalar.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean scalar.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The list handle, if this is a list.
    pub fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// The set handle, if this is a set.
    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Self::Set(s) => Some(s),
            _ => None,
        }
    }

    /// The map handle, if this is a map.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The date, if this is a date.
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(d.get()),
            _ => None,
        }
    }

    /// The enumeration member, if this is one.
    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// The erased record handle, if this is a record.
    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// The typed record handle, if this is a record of type `T`.
    pub fn to_record<T: Record>(&self) -> Option<Shared<T>> {
        self.as_record().and_then(RecordRef::downcast::<T>)
    }

    /// Returns true if both values are handles to the same allocation (or the same
    /// enumeration member). Scalars are never identical in this sense.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Structural comparison of two graphs.
    ///
    /// Records compare by type and field values, containers by their contents in
    /// order. A pair of handles met again while it is still being compared is taken
    /// as equal, so cyclic graphs terminate.
    pub fn graph_eq(&self, other: &Value) -> bool {
        let mut in_progress = HashSet::new();
        graph_eq_inner(self, other, &mut in_progress)
    }
}

fn graph_eq_inner(a: &Value, b: &Value, in_progress: &mut HashSet<(usize, usize)>) -> bool {
    depth::guarded(|| graph_eq_step(a, b, in_progress))
}

fn graph_eq_step(a: &Value, b: &Value, in_progress: &mut HashSet<(usize, usize)>) -> bool {
    fn seq_eq(xs: &[Value], ys: &[Value], seen: &mut HashSet<(usize, usize)>) -> bool {
        xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| graph_eq_inner(x, y, seen))
    }

    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::Record(x), Value::Record(y)) => {
            if !in_progress.insert((x.addr(), y.addr())) {
                return true;
            }
            if x.record_type() != y.record_type() {
                return false;
            }
            match (x.fields(), y.fields()) {
                (Ok(xf), Ok(yf)) => {
                    xf.len() == yf.len()
                        && xf.iter().zip(&yf).all(|((xn, xv), (yn, yv))| {
                            xn == yn && graph_eq_inner(xv, yv, in_progress)
                        })
                }
                _ => false,
            }
        }
        (Value::List(x), Value::List(y)) => {
            if !in_progress.insert((x.addr(), y.addr())) {
                return true;
            }
            seq_eq(&x.to_vec(), &y.to_vec(), in_progress)
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_eq(x.items(), y.items(), in_progress),
        (Value::Set(x), Value::Set(y)) => {
            if !in_progress.insert((x.addr(), y.addr())) {
                return true;
            }
            seq_eq(&x.to_vec(), &y.to_vec(), in_progress)
        }
        (Value::Map(x), Value::Map(y)) => {
            if !in_progress.insert((x.addr(), y.addr())) {
                return true;
            }
            let (xe, ye) = (x.entries(), y.entries());
            xe.len() == ye.len()
                && xe.iter().zip(&ye).all(|((xk, xv), (yk, yv))| {
                    graph_eq_inner(xk, yk, in_progress) && graph_eq_inner(xv, yv, in_progress)
                })
        }
        _ => a == b,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a.get() == b.get(),
            (Self::Tuple(a), Self::Tuple(b)) => a.items() == b.items(),
            (Self::Enum(a), Self::Enum(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            (Self::Set(a), Self::Set(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::None => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Str(s) => s.hash(state),
            Self::Date(d) => d.get().hash(state),
            Self::Tuple(t) => t.items().hash(state),
            Self::Enum(e) => e.hash(state),
            Self::Record(r) => r.addr().hash(state),
            Self::List(l) => l.addr().hash(state),
            Self::Set(s) => s.addr().hash(state),
            Self::Map(m) => m.addr().hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Record(r) => r.fmt(f),
            Self::List(l) => l.fmt(f),
            Self::Tuple(t) => t.fmt(f),
            Self::Set(s) => s.fmt(f),
            Self::Map(m) => m.fmt(f),
            Self::Enum(e) => write!(f, "{}::{}", e.canonical_type(), e.name()),
            Self::Date(d) => d.fmt(f),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_from_for_value!(
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    RecordRef => Record,
    List => List,
    Tuple => Tuple,
    Set => Set,
    Map => Map,
    EnumValue => Enum,
    Date => Date,
);

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(Date::new(d))
    }
}

impl<T: Record> From<Shared<T>> for Value {
    fn from(record: Shared<T>) -> Self {
        Self::Record(RecordRef::from_shared(record))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::None, Into::into)
    }
}
