//! The node graph built by the first encode pass.
//!
//! This module defines the arena of [`Node`]s, the [`SeqId`] that addresses them,
//! and the [`GraphBuilder`] that walks a [`Value`](crate::Value) graph once to
//! deduplicate it by identity.

/// Walks a value graph and fills the arena.
pub mod builder;
/// Defines the `NodeGraph` arena, `Node`, `NodeKind` and `Slot`.
pub mod core;
/// Defines the `SeqId` type.
pub mod id;

pub use builder::GraphBuilder;
pub use self::core::{Edge, Node, NodeGraph, NodeKind, Slot};
pub use id::SeqId;
