//! Stack budget for the parts of a call that still recurse once per nesting level.
//!
//! The graph builder, the flattener and the decoder walk with explicit stacks. JSON
//! text parsing, wire serialization and structural comparison recurse, so they run
//! behind [`guarded`], which moves onto a fresh heap-allocated stack segment whenever
//! less than [`RED_ZONE`] bytes remain. Parsed trees are released iteratively.

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value as Json;

/// Minimum stack left before a recursive step switches to a new segment.
pub const RED_ZONE: usize = 64 * 1024;

/// Size of each new stack segment.
pub const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Runs `f`, growing the stack first if it is close to exhausted.
#[inline]
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, f)
}

/// Parses one JSON document and rejects trailing characters.
pub(crate) fn parse_json<'de, R>(mut de: serde_json::Deserializer<R>) -> Result<Json>
where
    R: serde_json::de::Read<'de>,
{
    de.disable_recursion_limit();
    let mut stacked = serde_stacker::Deserializer::new(&mut de);
    stacked.red_zone = RED_ZONE;
    stacked.stack_size = STACK_SEGMENT;
    let json = Json::deserialize(stacked)?;
    de.end()?;
    Ok(json)
}

/// Drops a parsed document one node at a time.
pub(crate) fn release_json(json: Json) {
    let mut pending = vec![json];
    while let Some(json) = pending.pop() {
        match json {
            Json::Array(items) => pending.extend(items),
            Json::Object(entries) => pending.extend(entries.into_iter().map(|(_, v)| v)),
            _ => {}
        }
    }
}
