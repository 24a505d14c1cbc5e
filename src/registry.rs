//! Resolution of canonical type strings back into live types.
//!
//! The decoder never guesses: every record and enumeration type that can appear in a
//! document must be registered before decoding. Registration is an explicit,
//! statically checked step, usually done once at startup:
//!
//! ```rust
//! use refcode::{RefcodeEnum, RefcodeObject, TypeRegistry};
//!
//! #[derive(Default, RefcodeObject)]
//! #[refcode(namespace = "shapes")]
//! struct Circle { radius: f64 }
//!
//! #[derive(Clone, Copy, RefcodeEnum)]
//! #[refcode(namespace = "shapes")]
//! enum Fill { Solid, Hollow }
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_record::<Circle>().register_enum::<Fill>();
//! assert!(registry.contains("shapes/Circle"));
//! ```
//!
//! Entries are `Send + Sync`, so a registry built once can be shared by decoders
//! running on several threads.

use crate::error::{RefcodeError, Result};
use crate::record::{CanonicalType, EnumMember, EnumValue, Record, RecordRef};
use std::collections::HashMap;
use std::fmt;

type RecordFactory = Box<dyn Fn() -> std::result::Result<RecordRef, String> + Send + Sync>;
type MemberResolver = Box<dyn Fn(&str) -> Option<EnumValue> + Send + Sync>;

enum TypeEntry {
    Record(RecordFactory),
    Enum(MemberResolver),
}

/// Maps canonical type strings to record factories and enumeration resolvers.
#[derive(Default)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type under its canonical type, constructed with `Default`.
    pub fn register_record<T: Record + Default>(&mut self) -> &mut Self {
        self.insert(
            T::canonical_type(),
            TypeEntry::Record(Box::new(|| Ok::<_, String>(RecordRef::new(T::default())))),
        )
    }

    /// Registers a record type with a custom, possibly failing, factory.
    ///
    /// The factory must return a record whose own canonical type is `canonical`, and
    /// must not have side effects: it runs once per record occurrence in a document.
    pub fn register_record_with<F>(&mut self, canonical: CanonicalType, factory: F) -> &mut Self
    where
        F: Fn() -> std::result::Result<RecordRef, String> + Send + Sync + 'static,
    {
        self.insert(canonical, TypeEntry::Record(Box::new(factory)))
    }

    /// Registers an enumeration type.
    pub fn register_enum<T: EnumMember>(&mut self) -> &mut Self {
        self.insert(
            T::canonical_type(),
            TypeEntry::Enum(Box::new(|name: &str| {
                T::from_member_name(name).map(|member| member.to_enum_value())
            })),
        )
    }

    fn insert(&mut self, canonical: CanonicalType, entry: TypeEntry) -> &mut Self {
        if let Err(reason) = canonical.validate() {
            tracing::warn!(
                %canonical,
                %reason,
                "registering a type that cannot appear on the wire"
            );
        }
        if self.entries.insert(canonical.to_string(), entry).is_some() {
            tracing::debug!(%canonical, "type registration replaced");
        }
        self
    }

    /// Returns true if `canonical` is registered.
    pub fn contains(&self, canonical: &str) -> bool {
        self.entries.contains_key(canonical)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a default instance of the record type named `canonical`.
    pub fn instantiate(&self, canonical: &str) -> Result<RecordRef> {
        match self.entries.get(canonical) {
            Some(TypeEntry::Record(factory)) => factory().map_err(|reason| {
                tracing::error!(type_name = canonical, %reason, "could not instantiate record");
                RefcodeError::InstantiationFailure {
                    type_name: canonical.to_owned(),
                    reason,
                }
            }),
            Some(TypeEntry::Enum(_)) => {
                let reason = "type is an enumeration".to_owned();
                tracing::error!(type_name = canonical, %reason, "could not instantiate record");
                Err(RefcodeError::InstantiationFailure {
                    type_name: canonical.to_owned(),
                    reason,
                })
            }
            None => {
                tracing::error!(type_name = canonical, "record type not registered");
                Err(RefcodeError::UnresolvedType(canonical.to_owned()))
            }
        }
    }

    /// Looks up the member `name` of the enumeration type named `canonical`.
    pub fn resolve_member(&self, canonical: &str, name: &str) -> Result<EnumValue> {
        match self.entries.get(canonical) {
            Some(TypeEntry::Enum(resolve)) => resolve(name).ok_or_else(|| {
                tracing::error!(
                    type_name = canonical,
                    member = name,
                    "enumeration member not found"
                );
                RefcodeError::UnresolvedType(format!("{canonical}.{name}"))
            }),
            Some(TypeEntry::Record(_)) => {
                tracing::error!(type_name = canonical, "type is a record, not an enumeration");
                Err(RefcodeError::UnresolvedType(canonical.to_owned()))
            }
            None => {
                tracing::error!(type_name = canonical, "enumeration type not registered");
                Err(RefcodeError::UnresolvedType(canonical.to_owned()))
            }
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}
