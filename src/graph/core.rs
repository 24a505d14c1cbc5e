use super::id::SeqId;
use crate::error::{RefcodeError, Result};
use crate::record::CanonicalType;
use crate::value::{Category, Value};
use chrono::NaiveDate;
use std::fmt;

/// An edge target: either an inlined scalar or a tracked node.
#[derive(Debug, Clone)]
pub enum Slot {
    /// A `Simple` or `None` value, carried by value.
    Inline(Value),
    /// A tracked node.
    Node(SeqId),
}

/// The label of the edge a node was first discovered through. Used for error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Record field.
    Field(&'static str),
    /// Element of a list, tuple or set.
    Item(usize),
    /// Key of a map entry or enumeration attribute.
    Key(usize),
    /// Value of a map entry or enumeration attribute.
    Value(usize),
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, ".{name}"),
            Self::Item(i) => write!(f, "[{i}]"),
            Self::Key(i) => write!(f, ".ks[{i}]"),
            Self::Value(i) => write!(f, ".vs[{i}]"),
        }
    }
}

/// Category-specific content of a node. Children are stored as [`Slot`]s, never as
/// references, so cycles in the value graph are just indices here.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// User-defined record: fields in declaration order.
    Record {
        /// `__ci` of the record.
        canonical: CanonicalType,
        /// Field name and target, skipped fields already removed.
        fields: Vec<(&'static str, Slot)>,
    },
    /// Ordered, growable sequence.
    Sequence(Vec<Slot>),
    /// Fixed sequence.
    Tuple(Vec<Slot>),
    /// Set members in insertion order.
    Set(Vec<Slot>),
    /// Map entries in insertion order.
    Mapping(Vec<(Slot, Slot)>),
    /// Enumeration member and its non-reserved attributes.
    Enumeration {
        /// `__cci` of the member.
        canonical: CanonicalType,
        /// Attribute name and value pairs.
        attributes: Vec<(Slot, Slot)>,
    },
    /// Calendar date (leaf).
    Date(NaiveDate),
}

impl NodeKind {
    /// The category this kind belongs to.
    pub fn category(&self) -> Category {
        match self {
            Self::Record { .. } => Category::Record,
            Self::Sequence(_) => Category::Sequence,
            Self::Tuple(_) => Category::Tuple,
            Self::Set(_) => Category::Set,
            Self::Mapping(_) => Category::Mapping,
            Self::Enumeration { .. } => Category::Enumeration,
            Self::Date(_) => Category::Date,
        }
    }
}

/// One distinct identity reached during traversal.
#[derive(Debug)]
pub struct Node {
    /// Sequence id, equal to the node's arena index.
    pub id: SeqId,
    /// Number of times traversal reached this identity (at least 1).
    pub ref_count: u32,
    /// Category and children.
    pub kind: NodeKind,
    /// The parent and edge through which the node was first reached; `None` for the root.
    pub discovered_from: Option<(SeqId, Edge)>,
    /// Holds the allocation alive so its address is not reused while identities are live.
    origin: Value,
}

impl Node {
    /// The node's category.
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Returns true if the node was reached more than once.
    pub fn is_shared(&self) -> bool {
        self.ref_count > 1
    }

    /// The value this node was built from.
    pub fn origin(&self) -> &Value {
        &self.origin
    }
}

/// Arena of nodes addressed by [`SeqId`].
#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
}

impl NodeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node and returns its id.
    pub(crate) fn add_node(
        &mut self,
        kind: NodeKind,
        origin: Value,
        discovered_from: Option<(SeqId, Edge)>,
    ) -> Result<SeqId> {
        let raw = u32::try_from(self.nodes.len())
            .map_err(|_| RefcodeError::Internal("too many distinct objects".into()))?;
        let id = SeqId::new(raw);
        self.nodes.push(Node {
            id,
            ref_count: 1,
            kind,
            discovered_from,
            origin,
        });
        Ok(id)
    }

    /// Retrieves a node, or an internal error if the id is out of range.
    pub fn node(&self, id: SeqId) -> Result<&Node> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| RefcodeError::Internal(format!("node {id} out of bounds")))
    }

    pub(crate) fn node_mut(&mut self, id: SeqId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or_else(|| RefcodeError::Internal(format!("node {id} out of bounds")))
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns a slice containing all nodes, in id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of nodes reached more than once.
    pub fn shared_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_shared()).count()
    }

    /// Path from the root to `id` along first-discovery edges, e.g. `$.items[2].name`.
    pub fn path_to(&self, id: SeqId) -> String {
        let mut edges = Vec::new();
        let mut current = self.nodes.get(id.index()).and_then(|n| n.discovered_from);
        while let Some((parent, edge)) = current {
            edges.push(edge);
            current = self.nodes.get(parent.index()).and_then(|n| n.discovered_from);
        }
        let mut path = String::from("$");
        for edge in edges.iter().rev() {
            path.push_str(&edge.to_string());
        }
        path
    }
}
