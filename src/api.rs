use crate::decoder::Decoder;
use crate::depth;
use crate::error::{RefcodeError, Result};
use crate::flatten::Flattener;
use crate::format::Wire;
use crate::graph::GraphBuilder;
use crate::registry::TypeRegistry;
use crate::rt::FromValue;
use crate::value::Value;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value as Json;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// Indentation of [`Refcode::encode`].
pub const DEFAULT_INDENT: usize = 2;

/// The main entry point for encoding and decoding.
///
/// All operations here use the default [`RefcodeOptions`]; call [`Refcode::builder`]
/// to change indentation or field checking.
#[derive(Debug)]
pub struct Refcode;

impl Refcode {
    /// Starts a configuration with the defaults.
    pub fn builder() -> RefcodeOptions {
        RefcodeOptions::default()
    }

    /// Encodes the graph reachable from `root` as indented text.
    pub fn encode(root: &Value) -> Result<String> {
        RefcodeOptions::default().encode(root)
    }

    /// Encodes `root` compactly into the file at `path`, replacing it.
    pub fn encode_to_file<P: AsRef<Path>>(path: P, root: &Value) -> Result<()> {
        RefcodeOptions::default().compact().encode_to_file(path, root)
    }

    /// Encodes `root` as indented text into `writer`.
    pub fn write<W: Write>(writer: W, root: &Value) -> Result<()> {
        RefcodeOptions::default().write(writer, root)
    }

    /// Decodes a document, resolving record and enumeration types through `registry`.
    pub fn decode(text: &str, registry: &TypeRegistry) -> Result<Value> {
        RefcodeOptions::default().decode(text, registry)
    }

    /// Decodes the document stored at `path`.
    pub fn decode_from_file<P: AsRef<Path>>(path: P, registry: &TypeRegistry) -> Result<Value> {
        RefcodeOptions::default().decode_from_file(path, registry)
    }

    /// Decodes a document read from `reader`.
    pub fn read<R: io::Read>(reader: R, registry: &TypeRegistry) -> Result<Value> {
        RefcodeOptions::default().read(reader, registry)
    }

    /// Decodes a document and converts the root into `T`.
    ///
    /// ```rust
    /// use refcode::{Refcode, RefcodeObject, Shared, TypeRegistry};
    ///
    /// #[derive(Default, RefcodeObject)]
    /// #[refcode(namespace = "demo")]
    /// struct Counter { hits: i64 }
    ///
    /// let mut registry = TypeRegistry::new();
    /// registry.register_record::<Counter>();
    ///
    /// let text = r#"{"__id": 0, "__ci": "demo/Counter", "hits": 3}"#;
    /// let counter: Shared<Counter> = Refcode::decode_as(text, &registry).unwrap();
    /// assert_eq!(counter.borrow().hits, 3);
    /// ```
    pub fn decode_as<T: FromValue>(text: &str, registry: &TypeRegistry) -> Result<T> {
        RefcodeOptions::default().decode_as(text, registry)
    }
}

/// Encode and decode settings.
///
/// ```rust
/// use refcode::{List, Refcode, Value};
///
/// let list = List::from_vec(vec![Value::from(1), Value::from(2)]);
/// let text = Refcode::builder().compact().encode(&Value::from(list)).unwrap();
/// assert_eq!(text, "[1,2]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefcodeOptions {
    indent: Option<usize>,
    strict_fields: bool,
}

impl Default for RefcodeOptions {
    fn default() -> Self {
        Self {
            indent: Some(DEFAULT_INDENT),
            strict_fields: false,
        }
    }
}

impl RefcodeOptions {
    /// Pretty-prints with `spaces` of indentation per level.
    pub fn indent(mut self, spaces: usize) -> Self {
        self.indent = Some(spaces);
        self
    }

    /// Writes everything on one line without whitespace.
    pub fn compact(mut self) -> Self {
        self.indent = None;
        self
    }

    /// Rejects wire fields that the target record does not declare.
    /// When off (the default) such fields are logged and skipped.
    pub fn strict_fields(mut self, strict: bool) -> Self {
        self.strict_fields = strict;
        self
    }

    /// Encodes `root` into a string.
    pub fn encode(&self, root: &Value) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, root)?;
        String::from_utf8(buffer).map_err(|e| RefcodeError::Internal(e.to_string()))
    }

    /// Encodes `root` into the file at `path`, replacing it.
    pub fn encode_to_file<P: AsRef<Path>>(&self, path: P, root: &Value) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer, root)?;
        writer.flush()?;
        tracing::debug!(path = %path.display(), "document written");
        Ok(())
    }

    /// Encodes `root` into `writer`.
    pub fn write<W: Write>(&self, writer: W, root: &Value) -> Result<()> {
        let wire = Self::project(root)?;
        match self.indent {
            Some(spaces) => {
                let indent = vec![b' '; spaces];
                let mut serializer =
                    Serializer::with_formatter(writer, PrettyFormatter::with_indent(&indent));
                wire.serialize(&mut serializer)?;
            }
            None => serde_json::to_writer(writer, &wire)?,
        }
        Ok(())
    }

    /// Runs both encode passes and returns the wrapper tree.
    fn project(root: &Value) -> Result<Wire> {
        let (graph, root_slot) = GraphBuilder::build(root)?;
        let wire = Flattener::flatten(&graph, &root_slot)?;
        tracing::debug!(
            nodes = graph.len(),
            shared = graph.shared_count(),
            "graph flattened"
        );
        Ok(wire)
    }

    /// Decodes a document.
    pub fn decode(&self, text: &str, registry: &TypeRegistry) -> Result<Value> {
        let json = depth::parse_json(serde_json::Deserializer::from_str(text))?;
        let decoded = self.decode_json(&json, registry);
        depth::release_json(json);
        decoded
    }

    /// Decodes the document stored at `path`.
    pub fn decode_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        registry: &TypeRegistry,
    ) -> Result<Value> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading document");
        self.read(BufReader::new(File::open(path)?), registry)
    }

    /// Decodes a document read from `reader`.
    pub fn read<R: io::Read>(&self, reader: R, registry: &TypeRegistry) -> Result<Value> {
        let json = depth::parse_json(serde_json::Deserializer::from_reader(reader))?;
        let decoded = self.decode_json(&json, registry);
        depth::release_json(json);
        decoded
    }

    /// Decodes a document and converts the root into `T`.
    pub fn decode_as<T: FromValue>(&self, text: &str, registry: &TypeRegistry) -> Result<T> {
        T::from_value(self.decode(text, registry)?)
    }

    /// Decodes an already parsed document.
    pub fn decode_json(&self, json: &Json, registry: &TypeRegistry) -> Result<Value> {
        Decoder::new(registry)
            .strict_fields(self.strict_fields)
            .decode(json)
    }
}
