//! First encode pass: identity-deduplicating traversal.
//!
//! Every value reachable from the root is visited in pre-order. The first time an
//! identity is seen it gets the next [`SeqId`] and a [`Node`](super::Node); every later
//! encounter only bumps that node's `ref_count` and does not descend again, which is
//! what makes cycles terminate. Scalars and `None` are never tracked.
//!
//! The walk uses an explicit work stack, so arbitrarily deep graphs (long record
//! chains, deeply nested lists) do not consume native stack. Children are pushed in
//! reverse, so ids come out exactly as a recursive pre-order walk would assign them.

use super::core::{Edge, NodeGraph, NodeKind, Slot};
use super::id::SeqId;
use crate::error::{RefcodeError, Result};
use crate::record::{OWNER_ATTR, SORT_ORDER_ATTR};
use crate::value::{Identity, Value};
use std::collections::HashMap;

/// Enumeration attributes that are implied by the member's type and never written.
const RESERVED_MEMBER_ATTRS: [&str; 2] = [SORT_ORDER_ATTR, OWNER_ATTR];

struct Pending {
    value: Value,
    parent: Option<(SeqId, Edge)>,
}

/// Builds a [`NodeGraph`] from a root value.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: NodeGraph,
    identities: HashMap<Identity, SeqId>,
}

impl GraphBuilder {
    /// Creates a builder with an empty identity map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Traverses `root` and returns the graph plus the slot standing for the root.
    pub fn build(root: &Value) -> Result<(NodeGraph, Slot)> {
        let mut builder = Self::new();
        let root_slot = builder.run(root.clone())?;
        tracing::debug!(
            nodes = builder.graph.len(),
            shared = builder.graph.shared_count(),
            "node graph built"
        );
        Ok((builder.graph, root_slot))
    }

    fn run(&mut self, root: Value) -> Result<Slot> {
        let mut root_slot = None;
        let mut stack = vec![Pending {
            value: root,
            parent: None,
        }];

        while let Some(Pending { value, parent }) = stack.pop() {
            let slot = self.visit(value, parent, &mut stack)?;
            match parent {
                Some((parent_id, edge)) => self.attach(parent_id, edge, slot)?,
                None => root_slot = Some(slot),
            }
        }

        root_slot.ok_or_else(|| RefcodeError::Internal("traversal produced no root".into()))
    }

    fn visit(
        &mut self,
        value: Value,
        parent: Option<(SeqId, Edge)>,
        stack: &mut Vec<Pending>,
    ) -> Result<Slot> {
        let Some(identity) = value.identity() else {
            if let Value::Float(f) = value {
                if !f.is_finite() {
                    return Err(self.unsupported(parent, format!("non-finite float {f}")));
                }
            }
            return Ok(Slot::Inline(value));
        };

        if let Some(&id) = self.identities.get(&identity) {
            self.graph.node_mut(id)?.ref_count += 1;
            return Ok(Slot::Node(id));
        }

        let mut children: Vec<(Value, Edge)> = Vec::new();
        let kind = match &value {
            Value::Record(record) => {
                let canonical = record.record_type();
                canonical
                    .validate()
                    .map_err(|reason| self.unsupported(parent, reason))?;
                let fields = record.fields()?;
                children.extend(fields.iter().map(|(name, v)| (v.clone(), Edge::Field(*name))));
                NodeKind::Record {
                    canonical,
                    fields: Vec::with_capacity(fields.len()),
                }
            }
            Value::List(list) => {
                let items = list.try_read()?;
                children.extend(
                    items.iter().cloned().enumerate().map(|(i, v)| (v, Edge::Item(i))),
                );
                NodeKind::Sequence(Vec::with_capacity(items.len()))
            }
            Value::Tuple(tuple) => {
                children.extend(
                    tuple.items().iter().cloned().enumerate().map(|(i, v)| (v, Edge::Item(i))),
                );
                NodeKind::Tuple(Vec::with_capacity(tuple.len()))
            }
            Value::Set(set) => {
                let members = set.try_read()?;
                children.extend(
                    members.iter().cloned().enumerate().map(|(i, v)| (v, Edge::Item(i))),
                );
                NodeKind::Set(Vec::with_capacity(members.len()))
            }
            Value::Map(map) => {
                let entries = map.try_read()?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    children.push((k.clone(), Edge::Key(i)));
                    children.push((v.clone(), Edge::Value(i)));
                }
                NodeKind::Mapping(Vec::with_capacity(entries.len()))
            }
            Value::Enum(member) => {
                let canonical = member.canonical_type().clone();
                canonical
                    .validate()
                    .map_err(|reason| self.unsupported(parent, reason))?;
                let attributes = member
                    .attributes()
                    .into_iter()
                    .filter(|(name, _)| !RESERVED_MEMBER_ATTRS.contains(name));
                for (i, (name, v)) in attributes.enumerate() {
                    children.push((Value::Str(name.to_owned()), Edge::Key(i)));
                    children.push((v, Edge::Value(i)));
                }
                NodeKind::Enumeration {
                    canonical,
                    attributes: Vec::new(),
                }
            }
            Value::Date(date) => NodeKind::Date(date.get()),
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
                return Err(RefcodeError::Internal(format!(
                    "{} value reported an identity",
                    value.type_label()
                )));
            }
        };

        let id = self.graph.add_node(kind, value, parent)?;
        self.identities.insert(identity, id);
        stack.extend(children.into_iter().rev().map(|(value, edge)| Pending {
            value,
            parent: Some((id, edge)),
        }));
        Ok(Slot::Node(id))
    }

    /// Records `slot` as the next child of `parent_id`. Pops arrive in child order, so
    /// appending is enough; a map value completes the entry its key opened.
    fn attach(&mut self, parent_id: SeqId, edge: Edge, slot: Slot) -> Result<()> {
        let parent = self.graph.node_mut(parent_id)?;
        match (&mut parent.kind, edge) {
            (NodeKind::Record { fields, .. }, Edge::Field(name)) => fields.push((name, slot)),
            (
                NodeKind::Sequence(items) | NodeKind::Tuple(items) | NodeKind::Set(items),
                Edge::Item(_),
            ) => items.push(slot),
            (
                NodeKind::Mapping(entries) | NodeKind::Enumeration { attributes: entries, .. },
                Edge::Key(_),
            ) => entries.push((slot, Slot::Inline(Value::None))),
            (
                NodeKind::Mapping(entries) | NodeKind::Enumeration { attributes: entries, .. },
                Edge::Value(_),
            ) => match entries.last_mut() {
                Some(entry) => entry.1 = slot,
                None => {
                    return Err(RefcodeError::Internal(format!(
                        "value edge without key on node {parent_id}"
                    )));
                }
            },
            (_, edge) => {
                return Err(RefcodeError::Internal(format!(
                    "edge {edge} does not fit node {parent_id}"
                )));
            }
        }
        Ok(())
    }

    fn unsupported(&self, parent: Option<(SeqId, Edge)>, reason: String) -> RefcodeError {
        let path = match parent {
            Some((parent_id, edge)) => format!("{}{edge}", self.graph.path_to(parent_id)),
            None => "$".to_owned(),
        };
        RefcodeError::UnsupportedType { path, reason }
    }
}
