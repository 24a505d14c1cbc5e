//! # Refcode
//!
//! An identity-preserving codec for object graphs with sharing and cycles, writing a
//! JSON-compatible tagged text format.
//!
//! ## Overview
//!
//! Ordinary serializers see a tree: a list assigned to two fields is written twice and
//! comes back as two lists, and a record that points at itself never terminates.
//! Refcode instead treats its input as a graph of *identities*. Every record, list,
//! set, map and date is a reference-counted handle, and the codec tracks which handles
//! it has already seen:
//!
//! *   **Shared substructure** is written once. Later occurrences become a reference
//!     token `{"__r": id}` and decode to the very same handle.
//! *   **Cycles** (direct or indirect) terminate, and are rebuilt as cycles.
//! *   **Scalars** (`None`, bool, int, float, string) are always inlined and never
//!     turn into references.
//! *   **Unshared lists** are plain JSON arrays; only shared containers pay for a
//!     wrapper and an id.
//!
//! ## Architecture
//!
//! Encoding runs in two passes, both iterative so deep graphs do not exhaust the stack:
//!
//! 1. The [`graph::GraphBuilder`] walks the value graph in pre-order, assigns a
//!    sequence id to every new identity and counts how often each one is reached.
//! 2. The [`flatten::Flattener`] walks the resulting node arena and produces a
//!    [`format::Wire`] tree, writing each node once and a reference on every revisit.
//!
//! The wire tree is serialized with `serde_json`. Decoding parses the text and walks it
//! with the [`decoder::Decoder`], registering each declared id *before* decoding its
//! children so back-references to ancestors resolve.
//!
//! Text parsing and serialization recurse once per nesting level; they grow the stack
//! on demand (`stacker`, `serde_stacker`), so deep documents are bounded by memory
//! rather than by the calling thread's stack size.
//!
//! Records and enumerations are found again by their canonical `namespace/Type` string
//! in a [`TypeRegistry`], which replaces runtime reflection with an explicit
//! registration step.
//!
//! ## Usage
//!
//! ```rust
//! use refcode::{Refcode, RefcodeObject, Shared, TypeRegistry, Value};
//!
//! #[derive(Default, RefcodeObject)]
//! #[refcode(namespace = "people")]
//! struct Person {
//!     name: String,
//!     friend: Option<Shared<Person>>,
//! }
//!
//! let a = refcode::shared(Person { name: "AAA".into(), friend: None });
//! let b = refcode::shared(Person { name: "BBB".into(), friend: Some(a.clone()) });
//! a.borrow_mut().friend = Some(b.clone());
//!
//! let text = Refcode::encode(&Value::from(a.clone()))?;
//!
//! let mut registry = TypeRegistry::new();
//! registry.register_record::<Person>();
//! let decoded: Shared<Person> = Refcode::decode_as(&text, &registry)?;
//!
//! let friend = decoded.borrow().friend.clone().ok_or("no friend")?;
//! let back = friend.borrow().friend.clone().ok_or("no friend")?;
//! assert!(std::rc::Rc::ptr_eq(&back, &decoded));
//!
//! // Rc cycles are not collected; break them when done.
//! a.borrow_mut().friend = None;
//! decoded.borrow_mut().friend = None;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Safety and Error Handling
//!
//! * **No unsafe code.**
//! * **No Panics:** No `unwrap()` or `panic!()` calls in the library (enforced by clippy lints).
//! * **Comprehensive Errors:** All failures correspond to a [`RefcodeError`] variant,
//!   and every failure aborts the whole call; there is no partial document.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

// --- PUBLIC API MODULES ---
pub mod api;
pub mod error;
pub mod format;
pub mod inspector;
pub mod record;
pub mod registry;
pub mod value;

// --- INTERNAL IMPLEMENTATION MODULES (Hidden from Docs) ---
#[doc(hidden)]
pub mod decoder;
mod depth;
#[doc(hidden)]
pub mod flatten;
#[doc(hidden)]
pub mod graph;

// --- MACRO SUPPORT MODULES ---

/// Runtime utilities used by the derived code.
pub mod rt;

// --- RE-EXPORTS ---

pub use api::{Refcode, RefcodeOptions};
pub use error::{RefcodeError, Result};
pub use inspector::{RefcodeInspector, WireReport};
pub use record::{CanonicalType, EnumMember, EnumValue, Record, RecordRef};
pub use registry::TypeRegistry;
pub use value::{shared, Category, Date, List, Map, Set, Shared, Tuple, Value};

// Re-export the derive macros so they are accessible as `refcode::RefcodeObject`
pub use refcode_derive::{RefcodeEnum, RefcodeObject};
