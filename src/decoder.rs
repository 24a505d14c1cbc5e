//! Rebuilds a value graph from a parsed wire tree.
//!
//! The decoder walks the [`serde_json::Value`] tree in document order with an explicit
//! frame stack. Every wrapper that declares an `__id` is entered into the identity
//! table, and a `{"__r": id}` token anywhere in the tree resolves to the value already
//! stored there, so shared substructure and cycles come back as shared handles.
//!
//! Registration order matters: records and containers are registered *before* their
//! children are decoded, which lets a child point back at an ancestor still under
//! construction. Enumeration members are registered after their attribute mapping is
//! decoded, since the member name is needed to look up the existing member.

use crate::error::{RefcodeError, Result};
use crate::format::{
    DATE_FORMAT, DATE_TAG, DATE_VALUE, ENUM_TAG, ENUM_TYPE_KEY, ID_KEY, MAPPING_KEYS,
    MAPPING_TAG, MAPPING_VALUES, REF_KEY, RESERVED_KEYS, SEQUENCE_ITEMS, SEQUENCE_TAG, SET_ITEMS,
    SET_TAG, TYPE_KEY,
};
use crate::record::{CanonicalType, RecordRef, MEMBER_NAME_ATTR};
use crate::registry::TypeRegistry;
use crate::value::{Date, List, Map, Set, Value};
use chrono::NaiveDate;
use serde_json::{Map as JsonObject, Value as Json};
use std::collections::HashMap;

/// Where decoded children of an open wrapper go.
enum Target<'a> {
    Record {
        record: RecordRef,
        names: Vec<&'a str>,
    },
    Sequence(List),
    Set(Set),
    Mapping {
        map: Map,
        pending_key: Option<Value>,
    },
    /// Untagged JSON object: string keys.
    Object {
        map: Map,
        names: Vec<&'a str>,
    },
    Enum {
        canonical: &'a str,
        id: Option<u64>,
        pending_key: Option<Value>,
        attributes: Vec<(Value, Value)>,
    },
}

struct Frame<'a> {
    target: Target<'a>,
    children: Vec<&'a Json>,
    next: usize,
}

enum Entered<'a> {
    Done(Value),
    Open(Frame<'a>),
}

/// One decode call: owns the identity table.
pub struct Decoder<'r> {
    registry: &'r TypeRegistry,
    table: HashMap<u64, Value>,
    strict_fields: bool,
}

impl<'r> Decoder<'r> {
    /// Creates a decoder resolving types through `registry`.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            table: HashMap::new(),
            strict_fields: false,
        }
    }

    /// Fails on wire fields the target record does not declare instead of skipping them.
    pub fn strict_fields(mut self, strict: bool) -> Self {
        self.strict_fields = strict;
        self
    }

    /// Number of ids registered so far.
    pub fn registered(&self) -> usize {
        self.table.len()
    }

    /// Decodes `root` into a value graph.
    pub fn decode(&mut self, root: &Json) -> Result<Value> {
        let mut stack = match self.enter(root)? {
            Entered::Done(value) => return Ok(value),
            Entered::Open(frame) => vec![frame],
        };

        loop {
            let next_child = match stack.last_mut() {
                Some(frame) => {
                    let child = frame.children.get(frame.next).copied();
                    if child.is_some() {
                        frame.next += 1;
                    }
                    child
                }
                None => return Err(RefcodeError::Internal("decode stack underflow".into())),
            };

            let finished = match next_child {
                Some(json) => match self.enter(json)? {
                    Entered::Done(value) => value,
                    Entered::Open(frame) => {
                        stack.push(frame);
                        continue;
                    }
                },
                None => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| RefcodeError::Internal("decode stack underflow".into()))?;
                    let value = self.close(frame.target)?;
                    if stack.is_empty() {
                        tracing::debug!(ids = self.table.len(), "document decoded");
                        return Ok(value);
                    }
                    value
                }
            };

            if let Some(parent) = stack.last_mut() {
                let index = parent.next - 1;
                self.accept(&mut parent.target, index, finished)?;
            }
        }
    }

    fn enter<'a>(&mut self, json: &'a Json) -> Result<Entered<'a>> {
        let value = match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None if n.is_u64() => {
                    return Err(RefcodeError::MalformedDocument(format!(
                        "integer {n} out of range"
                    )));
                }
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => {
                return Ok(Entered::Open(Frame {
                    target: Target::Sequence(List::new()),
                    children: items.iter().collect(),
                    next: 0,
                }));
            }
            Json::Object(object) => return self.enter_object(object),
        };
        Ok(Entered::Done(value))
    }

    fn enter_object<'a>(&mut self, object: &'a JsonObject<String, Json>) -> Result<Entered<'a>> {
        if let Some(target) = object.get(REF_KEY) {
            let id = parse_id(target)?;
            return self
                .table
                .get(&id)
                .cloned()
                .map(Entered::Done)
                .ok_or(RefcodeError::DanglingReference(id));
        }

        let Some(tag) = object.get(TYPE_KEY) else {
            let (names, children) = object.iter().map(|(k, v)| (k.as_str(), v)).unzip();
            return Ok(Entered::Open(Frame {
                target: Target::Object {
                    map: Map::new(),
                    names,
                },
                children,
                next: 0,
            }));
        };
        let tag = tag.as_str().ok_or_else(|| {
            RefcodeError::MalformedDocument(format!("{TYPE_KEY} must be a string, got {tag}"))
        })?;
        let id = object.get(ID_KEY).map(parse_id).transpose()?;

        let frame = match tag {
            SEQUENCE_TAG => {
                let list = List::new();
                self.register(id, Value::List(list.clone()))?;
                Frame {
                    target: Target::Sequence(list),
                    children: array(object, SEQUENCE_ITEMS, tag)?.iter().collect(),
                    next: 0,
                }
            }
            SET_TAG => {
                let set = Set::new();
                self.register(id, Value::Set(set.clone()))?;
                Frame {
                    target: Target::Set(set),
                    children: array(object, SET_ITEMS, tag)?.iter().collect(),
                    next: 0,
                }
            }
            MAPPING_TAG => {
                let children = pairs(object, tag)?;
                let map = Map::new();
                self.register(id, Value::Map(map.clone()))?;
                Frame {
                    target: Target::Mapping {
                        map,
                        pending_key: None,
                    },
                    children,
                    next: 0,
                }
            }
            ENUM_TAG => {
                let canonical = object
                    .get(ENUM_TYPE_KEY)
                    .and_then(Json::as_str)
                    .ok_or_else(|| missing(tag, ENUM_TYPE_KEY))?;
                Frame {
                    target: Target::Enum {
                        canonical,
                        id,
                        pending_key: None,
                        attributes: Vec::new(),
                    },
                    children: pairs(object, tag)?,
                    next: 0,
                }
            }
            DATE_TAG => {
                let literal = object
                    .get(DATE_VALUE)
                    .and_then(Json::as_str)
                    .ok_or_else(|| missing(tag, DATE_VALUE))?;
                let date = NaiveDate::parse_from_str(literal, DATE_FORMAT).map_err(|e| {
                    RefcodeError::MalformedDocument(format!("bad date literal '{literal}': {e}"))
                })?;
                let value = Value::Date(Date::new(date));
                self.register(id, value.clone())?;
                return Ok(Entered::Done(value));
            }
            canonical if canonical.contains('/') => {
                if CanonicalType::parse(canonical).is_none() {
                    return Err(RefcodeError::MalformedTag(canonical.to_owned()));
                }
                let id = id.ok_or_else(|| missing(canonical, ID_KEY))?;
                let record = self.registry.instantiate(canonical)?;
                self.register(Some(id), Value::Record(record.clone()))?;
                let (names, children) = object
                    .iter()
                    .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.as_str(), v))
                    .unzip();
                Frame {
                    target: Target::Record { record, names },
                    children,
                    next: 0,
                }
            }
            other => {
                tracing::error!(tag = other, "unrecognized wrapper tag");
                return Err(RefcodeError::MalformedTag(other.to_owned()));
            }
        };
        Ok(Entered::Open(frame))
    }

    /// Stores a decoded child into its parent.
    fn accept(&self, target: &mut Target<'_>, index: usize, value: Value) -> Result<()> {
        match target {
            Target::Record { record, names } => {
                let name = names
                    .get(index)
                    .copied()
                    .ok_or_else(|| RefcodeError::Internal(format!("no field at index {index}")))?;
                if !record.set_field(name, value)? {
                    let canonical = record.record_type().to_string();
                    if self.strict_fields {
                        return Err(RefcodeError::FieldMismatch {
                            record: canonical,
                            field: name.to_owned(),
                            reason: "unknown field".into(),
                        });
                    }
                    tracing::warn!(record = %canonical, field = name, "skipping unknown field");
                }
            }
            Target::Sequence(list) => list.try_write()?.push(value),
            Target::Set(set) => {
                set.try_write()?.insert(value);
            }
            Target::Mapping { map, pending_key } => match pending_key.take() {
                None => *pending_key = Some(value),
                Some(key) => {
                    map.try_write()?.insert(key, value);
                }
            },
            Target::Object { map, names } => {
                let name = names
                    .get(index)
                    .copied()
                    .ok_or_else(|| RefcodeError::Internal(format!("no key at index {index}")))?;
                map.try_write()?.insert(Value::Str(name.to_owned()), value);
            }
            Target::Enum {
                pending_key,
                attributes,
                ..
            } => match pending_key.take() {
                None => *pending_key = Some(value),
                Some(key) => attributes.push((key, value)),
            },
        }
        Ok(())
    }

    /// Produces the finished value of a wrapper whose children are all decoded.
    fn close(&mut self, target: Target<'_>) -> Result<Value> {
        let value = match target {
            Target::Record { record, .. } => Value::Record(record),
            Target::Sequence(list) => Value::List(list),
            Target::Set(set) => Value::Set(set),
            Target::Mapping { map, .. } | Target::Object { map, .. } => Value::Map(map),
            Target::Enum {
                canonical,
                id,
                attributes,
                ..
            } => {
                let name = attributes
                    .iter()
                    .find(|(k, _)| k.as_str() == Some(MEMBER_NAME_ATTR))
                    .and_then(|(_, v)| v.as_str())
                    .ok_or_else(|| missing(ENUM_TAG, MEMBER_NAME_ATTR))?;
                let member = Value::Enum(self.registry.resolve_member(canonical, name)?);
                self.register(id, member.clone())?;
                member
            }
        };
        Ok(value)
    }

    fn register(&mut self, id: Option<u64>, value: Value) -> Result<()> {
        let Some(id) = id else {
            return Ok(());
        };
        if self.table.contains_key(&id) {
            return Err(RefcodeError::MalformedDocument(format!(
                "id {id} declared twice"
            )));
        }
        self.table.insert(id, value);
        Ok(())
    }
}

impl std::fmt::Debug for Decoder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("registry", self.registry)
            .field("registered", &self.table.len())
            .field("strict_fields", &self.strict_fields)
            .finish()
    }
}

fn parse_id(json: &Json) -> Result<u64> {
    json.as_u64().ok_or_else(|| {
        RefcodeError::MalformedDocument(format!("id must be a non-negative integer, got {json}"))
    })
}

fn missing(wrapper: &str, key: &str) -> RefcodeError {
    RefcodeError::MalformedDocument(format!("'{wrapper}' wrapper without '{key}'"))
}

fn array<'a>(object: &'a JsonObject<String, Json>, key: &str, tag: &str) -> Result<&'a Vec<Json>> {
    object
        .get(key)
        .and_then(Json::as_array)
        .ok_or_else(|| missing(tag, key))
}

/// The `ks`/`vs` arrays of a mapping-shaped wrapper, interleaved as `k0, v0, k1, v1, ...`.
fn pairs<'a>(object: &'a JsonObject<String, Json>, tag: &str) -> Result<Vec<&'a Json>> {
    let keys = array(object, MAPPING_KEYS, tag)?;
    let values = array(object, MAPPING_VALUES, tag)?;
    if keys.len() != values.len() {
        return Err(RefcodeError::MalformedDocument(format!(
            "'{tag}' wrapper has {} keys and {} values",
            keys.len(),
            values.len()
        )));
    }
    Ok(keys.iter().zip(values).flat_map(|(k, v)| [k, v]).collect())
}
