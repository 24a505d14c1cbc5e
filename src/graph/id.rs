use std::fmt;

/// A strong type for a node's sequence id.
///
/// Ids are handed out in first-discovery order and double as the node's index in the
/// [`NodeGraph`](super::NodeGraph) arena. The same number is the `__id` on the wire and
/// the key of the decoder's identity table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeqId(u32); // u32 is plenty for the number of distinct objects in one document.

impl SeqId {
    /// Creates a new SeqId.
    /// Restricted to the crate so ids only come from the arena or a parsed document.
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqId({})", self.0)
    }
}

impl fmt::Display for SeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
