//! Second encode pass: project the node graph onto a [`Wire`] tree.
//!
//! Nodes are emitted in the same pre-order the [`GraphBuilder`](crate::graph::GraphBuilder)
//! discovered them in. The first visit to a node writes its full contents and marks it
//! in the ledger; every later visit writes a `{"__r": id}` token instead. Because the
//! mark is set before the node's children are visited, a back-edge to an ancestor
//! always finds the ancestor already marked, and the decoder (walking the same order)
//! always finds the id already registered.
//!
//! Records and enumeration members always carry their id. Sequences, sets, mappings and
//! dates carry one only when their `ref_count` is greater than one; an unshared list is
//! written as a bare JSON array.

use crate::error::{RefcodeError, Result};
use crate::format::{Wire, DATE_FORMAT};
use crate::graph::{Node, NodeGraph, NodeKind, SeqId, Slot};
use crate::value::Value;

/// Flattening state of a node. Kept outside the graph so the graph stays immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Not emitted yet.
    Unvisited,
    /// Full contents already emitted; further visits become references.
    Flattened,
}

/// A node whose children are being flattened.
struct Frame<'g> {
    node: &'g Node,
    slots: Vec<&'g Slot>,
    next: usize,
    out: Vec<Wire>,
}

enum Entered<'g> {
    Done(Wire),
    Open(Frame<'g>),
}

/// Projects a [`NodeGraph`] onto a [`Wire`] tree.
#[derive(Debug)]
pub struct Flattener<'g> {
    graph: &'g NodeGraph,
    ledger: Vec<Visit>,
}

impl<'g> Flattener<'g> {
    /// Creates a flattener with every node unvisited.
    pub fn new(graph: &'g NodeGraph) -> Self {
        Self {
            graph,
            ledger: vec![Visit::Unvisited; graph.len()],
        }
    }

    /// Flattens the graph starting from `root`.
    pub fn flatten(graph: &'g NodeGraph, root: &'g Slot) -> Result<Wire> {
        Self::new(graph).run(root)
    }

    /// The ledger state of `id`.
    pub fn visit_state(&self, id: SeqId) -> Option<Visit> {
        self.ledger.get(id.index()).copied()
    }

    /// Walks from `root` with an explicit frame stack.
    pub fn run(&mut self, root: &'g Slot) -> Result<Wire> {
        let mut stack = match self.enter(root)? {
            Entered::Done(wire) => return Ok(wire),
            Entered::Open(frame) => vec![frame],
        };

        loop {
            let next_slot = match stack.last_mut() {
                Some(frame) => {
                    let slot = frame.slots.get(frame.next).copied();
                    if slot.is_some() {
                        frame.next += 1;
                    }
                    slot
                }
                None => return Err(RefcodeError::Internal("flatten stack underflow".into())),
            };

            let finished = match next_slot {
                Some(slot) => match self.enter(slot)? {
                    Entered::Done(wire) => wire,
                    Entered::Open(frame) => {
                        stack.push(frame);
                        continue;
                    }
                },
                None => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| RefcodeError::Internal("flatten stack underflow".into()))?;
                    let wire = Self::wrap(frame.node, frame.out)?;
                    if stack.is_empty() {
                        return Ok(wire);
                    }
                    wire
                }
            };

            if let Some(parent) = stack.last_mut() {
                parent.out.push(finished);
            }
        }
    }

    fn enter(&mut self, slot: &'g Slot) -> Result<Entered<'g>> {
        let id = match slot {
            Slot::Inline(value) => return inline_wire(value).map(Entered::Done),
            Slot::Node(id) => *id,
        };

        let graph: &'g NodeGraph = self.graph;
        let node = graph.node(id)?;
        let visit = self
            .ledger
            .get_mut(id.index())
            .ok_or_else(|| RefcodeError::Internal(format!("no ledger entry for {id}")))?;
        if *visit == Visit::Flattened {
            return Ok(Entered::Done(Wire::Ref(id)));
        }
        *visit = Visit::Flattened;

        let slots: Vec<&'g Slot> = match &node.kind {
            NodeKind::Record { fields, .. } => fields.iter().map(|(_, slot)| slot).collect(),
            NodeKind::Sequence(items) | NodeKind::Tuple(items) | NodeKind::Set(items) => {
                items.iter().collect()
            }
            NodeKind::Mapping(entries) | NodeKind::Enumeration { attributes: entries, .. } => {
                entries.iter().flat_map(|(k, v)| [k, v]).collect()
            }
            NodeKind::Date(_) => Vec::new(),
        };

        if slots.is_empty() {
            return Self::wrap(node, Vec::new()).map(Entered::Done);
        }
        let capacity = slots.len();
        Ok(Entered::Open(Frame {
            node,
            slots,
            next: 0,
            out: Vec::with_capacity(capacity),
        }))
    }

    /// Builds the wrapper for `node` from its already flattened children.
    fn wrap(node: &Node, out: Vec<Wire>) -> Result<Wire> {
        let shared_id = node.is_shared().then_some(node.id);
        let wire = match &node.kind {
            NodeKind::Record { canonical, fields } => {
                expect_children(node, fields.len(), out.len())?;
                Wire::Record {
                    canonical: canonical.to_string(),
                    id: node.id,
                    fields: fields.iter().map(|(name, _)| *name).zip(out).collect(),
                }
            }
            NodeKind::Sequence(_) | NodeKind::Tuple(_) => Wire::Sequence {
                items: out,
                id: shared_id,
            },
            NodeKind::Set(_) => Wire::Set {
                items: out,
                id: shared_id,
            },
            NodeKind::Mapping(entries) => {
                expect_children(node, entries.len() * 2, out.len())?;
                let (keys, values) = split_pairs(out);
                Wire::Mapping {
                    keys,
                    values,
                    id: shared_id,
                }
            }
            NodeKind::Enumeration {
                canonical,
                attributes,
            } => {
                expect_children(node, attributes.len() * 2, out.len())?;
                let (keys, values) = split_pairs(out);
                Wire::Enum {
                    canonical: canonical.to_string(),
                    keys,
                    values,
                    id: node.id,
                }
            }
            NodeKind::Date(date) => Wire::Date {
                iso: date.format(DATE_FORMAT).to_string(),
                id: shared_id,
            },
        };
        Ok(wire)
    }
}

fn inline_wire(value: &Value) -> Result<Wire> {
    match value {
        Value::None => Ok(Wire::Null),
        Value::Bool(b) => Ok(Wire::Bool(*b)),
        Value::Int(i) => Ok(Wire::Int(*i)),
        Value::Float(f) => Ok(Wire::Float(*f)),
        Value::Str(s) => Ok(Wire::Str(s.clone())),
        other => Err(RefcodeError::Internal(format!(
            "{} value stored inline",
            other.type_label()
        ))),
    }
}

fn expect_children(node: &Node, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(RefcodeError::Internal(format!(
            "node {} expected {expected} flattened children, got {found}",
            node.id
        )));
    }
    Ok(())
}

/// Splits interleaved `k0, v0, k1, v1, ...` into key and value arrays.
fn split_pairs(out: Vec<Wire>) -> (Vec<Wire>, Vec<Wire>) {
    let mut keys = Vec::with_capacity(out.len() / 2);
    let mut values = Vec::with_capacity(out.len() / 2);
    for (i, wire) in out.into_iter().enumerate() {
        if i % 2 == 0 {
            keys.push(wire);
        } else {
            values.push(wire);
        }
    }
    (keys, values)
}
