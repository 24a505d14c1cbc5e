//! Defines the textual wire layout.
//!
//! A document is a JSON tree. Scalars and unshared lists appear as plain JSON; every
//! other category is an object carrying a `__ci` discriminator:
//!
//! | Wrapper   | Shape                                                          |
//! |-----------|----------------------------------------------------------------|
//! | Record    | `{"__id": n, "__ci": "ns/Type", field: value, ...}`            |
//! | Reference | `{"__r": n}`                                                   |
//! | Sequence  | `{"__ci": "LW", "__id": n, "ls": [...]}` (shared only)         |
//! | Mapping   | `{"__ci": "DW", "__id"?: n, "ks": [...], "vs": [...]}`         |
//! | Set       | `{"__ci": "S", "__id"?: n, "s": [...]}`                        |
//! | Enum      | `{"__ci": "E", "__cci": "ns/Type", "ks": [...], "vs": [...], "__id": n}` |
//! | Date      | `{"__ci": "DD", "v": "YYYY-MM-DD", "__id"?: n}`                |
//!
//! Key names and tag values are part of the compatibility contract.

use crate::depth;
use crate::graph::SeqId;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// Sequence id of a wrapper.
pub const ID_KEY: &str = "__id";
/// Type discriminator: a wrapper tag or a record's canonical type.
pub const TYPE_KEY: &str = "__ci";
/// Reference token.
pub const REF_KEY: &str = "__r";
/// Canonical type of an enumeration member.
pub const ENUM_TYPE_KEY: &str = "__cci";

/// Keys that are metadata on a record and never assigned as fields.
pub const RESERVED_KEYS: [&str; 3] = [ID_KEY, TYPE_KEY, REF_KEY];

/// `__ci` of a shared sequence.
pub const SEQUENCE_TAG: &str = "LW";
/// `__ci` of a mapping.
pub const MAPPING_TAG: &str = "DW";
/// `__ci` of a set.
pub const SET_TAG: &str = "S";
/// `__ci` of an enumeration member.
pub const ENUM_TAG: &str = "E";
/// `__ci` of a date.
pub const DATE_TAG: &str = "DD";

/// Elements of a shared sequence.
pub const SEQUENCE_ITEMS: &str = "ls";
/// Keys of a mapping or enumeration member.
pub const MAPPING_KEYS: &str = "ks";
/// Values of a mapping or enumeration member.
pub const MAPPING_VALUES: &str = "vs";
/// Members of a set.
pub const SET_ITEMS: &str = "s";
/// Literal of a date.
pub const DATE_VALUE: &str = "v";

/// `chrono` format of the date literal.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The projector's output: a tree of scalars and wrappers, ready to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Wire {
    /// JSON `null`.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer.
    Int(i64),
    /// JSON float.
    Float(f64),
    /// JSON string.
    Str(String),
    /// Back-pointer to an already emitted wrapper.
    Ref(SeqId),
    /// Calendar date.
    Date {
        /// `YYYY-MM-DD`.
        iso: String,
        /// Present only when the date is shared.
        id: Option<SeqId>,
    },
    /// List or tuple; a bare array when `id` is `None`.
    Sequence {
        /// Elements.
        items: Vec<Wire>,
        /// Present only when the sequence is shared.
        id: Option<SeqId>,
    },
    /// Mapping as parallel key and value arrays.
    Mapping {
        /// Keys in insertion order.
        keys: Vec<Wire>,
        /// Values aligned with `keys`.
        values: Vec<Wire>,
        /// Present only when the mapping is shared.
        id: Option<SeqId>,
    },
    /// Set members.
    Set {
        /// Members in insertion order.
        items: Vec<Wire>,
        /// Present only when the set is shared.
        id: Option<SeqId>,
    },
    /// Enumeration member with its attribute mapping.
    Enum {
        /// `namespace/Type` of the enumeration.
        canonical: String,
        /// Attribute names.
        keys: Vec<Wire>,
        /// Attribute values.
        values: Vec<Wire>,
        /// Always present.
        id: SeqId,
    },
    /// User-defined record.
    Record {
        /// `namespace/Type` of the record.
        canonical: String,
        /// Always present.
        id: SeqId,
        /// Fields in declaration order.
        fields: Vec<(&'static str, Wire)>,
    },
}

impl Wire {
    /// Moves the direct children of a wrapper into `pending`, leaving it empty.
    fn take_children(&mut self, pending: &mut Vec<Wire>) {
        match self {
            Self::Sequence { items, .. } | Self::Set { items, .. } => pending.append(items),
            Self::Mapping { keys, values, .. } | Self::Enum { keys, values, .. } => {
                pending.append(keys);
                pending.append(values);
            }
            Self::Record { fields, .. } => {
                pending.extend(std::mem::take(fields).into_iter().map(|(_, value)| value));
            }
            _ => {}
        }
    }

    fn serialize_wrapper<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Ref(id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(REF_KEY, &id.as_u32())?;
                map.end()
            }
            Self::Date { iso, id } => {
                let mut map = serializer.serialize_map(Some(2 + usize::from(id.is_some())))?;
                map.serialize_entry(TYPE_KEY, DATE_TAG)?;
                map.serialize_entry(DATE_VALUE, iso)?;
                if let Some(id) = id {
                    map.serialize_entry(ID_KEY, &id.as_u32())?;
                }
                map.end()
            }
            Self::Sequence { items, id: None } => items.serialize(serializer),
            Self::Sequence { items, id: Some(id) } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry(TYPE_KEY, SEQUENCE_TAG)?;
                map.serialize_entry(ID_KEY, &id.as_u32())?;
                map.serialize_entry(SEQUENCE_ITEMS, items)?;
                map.end()
            }
            Self::Mapping { keys, values, id } => {
                let mut map = serializer.serialize_map(Some(3 + usize::from(id.is_some())))?;
                map.serialize_entry(TYPE_KEY, MAPPING_TAG)?;
                if let Some(id) = id {
                    map.serialize_entry(ID_KEY, &id.as_u32())?;
                }
                map.serialize_entry(MAPPING_KEYS, keys)?;
                map.serialize_entry(MAPPING_VALUES, values)?;
                map.end()
            }
            Self::Set { items, id } => {
                let mut map = serializer.serialize_map(Some(2 + usize::from(id.is_some())))?;
                map.serialize_entry(TYPE_KEY, SET_TAG)?;
                if let Some(id) = id {
                    map.serialize_entry(ID_KEY, &id.as_u32())?;
                }
                map.serialize_entry(SET_ITEMS, items)?;
                map.end()
            }
            Self::Enum {
                canonical,
                keys,
                values,
                id,
            } => {
                let mut map = serializer.serialize_map(Some(5))?;
                map.serialize_entry(TYPE_KEY, ENUM_TAG)?;
                map.serialize_entry(ENUM_TYPE_KEY, canonical)?;
                map.serialize_entry(MAPPING_KEYS, keys)?;
                map.serialize_entry(MAPPING_VALUES, values)?;
                map.serialize_entry(ID_KEY, &id.as_u32())?;
                map.end()
            }
            Self::Record {
                canonical,
                id,
                fields,
            } => {
                let mut map = serializer.serialize_map(Some(2 + fields.len()))?;
                map.serialize_entry(ID_KEY, &id.as_u32())?;
                map.serialize_entry(TYPE_KEY, canonical)?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

impl Serialize for Wire {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        depth::guarded(|| self.serialize_wrapper(serializer))
    }
}

impl Drop for Wire {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut wire) = pending.pop() {
            wire.take_children(&mut pending);
        }
    }
}
