//! Tools for inspecting the structure of Refcode documents.
//! Useful for debugging sharing and for checking a document before decoding it.

use crate::depth;
use crate::error::Result;
use crate::format::{
    DATE_TAG, ENUM_TAG, ID_KEY, MAPPING_KEYS, MAPPING_TAG, MAPPING_VALUES, REF_KEY, RESERVED_KEYS,
    SEQUENCE_ITEMS, SEQUENCE_TAG, SET_ITEMS, SET_TAG, TYPE_KEY,
};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// A structural report of a Refcode document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WireReport {
    /// Record wrappers.
    pub records: usize,
    /// `{"__r": id}` tokens.
    pub references: usize,
    /// Shared sequence wrappers (`LW`).
    pub sequences: usize,
    /// Mapping wrappers (`DW`).
    pub mappings: usize,
    /// Set wrappers (`S`).
    pub sets: usize,
    /// Enumeration member wrappers (`E`).
    pub enums: usize,
    /// Date wrappers (`DD`).
    pub dates: usize,
    /// Plain JSON arrays (unshared sequences).
    pub bare_arrays: usize,
    /// JSON objects without a `__ci` tag.
    pub bare_objects: usize,
    /// Null, boolean, number and string leaves.
    pub scalars: usize,
    /// Number of `__id` declarations.
    pub declared_ids: usize,
    /// Record count per canonical type.
    pub record_types: BTreeMap<String, usize>,
    /// Deepest nesting level; the root is level 1.
    pub max_depth: usize,
    /// References whose target is declared later in decode order.
    pub forward_references: Vec<u64>,
    /// References whose target is never declared.
    pub undeclared_references: Vec<u64>,
    /// `__ci` values that are neither a wrapper tag nor a canonical type.
    pub unknown_tags: Vec<String>,
}

impl WireReport {
    /// Returns true if every reference resolves and every tag is recognized,
    /// i.e. the document would decode given a complete registry.
    pub fn is_consistent(&self) -> bool {
        self.forward_references.is_empty()
            && self.undeclared_references.is_empty()
            && self.unknown_tags.is_empty()
    }
}

/// The Refcode Inspector tool.
#[derive(Debug)]
pub struct RefcodeInspector;

impl RefcodeInspector {
    /// Analyzes a document and returns a structural report. No registry is needed.
    pub fn inspect(text: &str) -> Result<WireReport> {
        let json = depth::parse_json(serde_json::Deserializer::from_str(text))?;
        let report = Self::inspect_json(&json);
        depth::release_json(json);
        Ok(report)
    }

    /// Analyzes the document stored at `path`.
    pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<WireReport> {
        let text = std::fs::read_to_string(path)?;
        Self::inspect(&text)
    }

    /// Analyzes an already parsed document.
    pub fn inspect_json(root: &Json) -> WireReport {
        let mut report = WireReport::default();
        let mut declared = HashSet::new();
        let mut seen_refs = Vec::new();
        let mut stack = vec![(root, 1usize)];

        while let Some((json, depth)) = stack.pop() {
            report.max_depth = report.max_depth.max(depth);
            let children: Vec<&Json> = match json {
                Json::Array(items) => {
                    report.bare_arrays += 1;
                    items.iter().collect()
                }
                Json::Object(object) => {
                    if let Some(id) = object.get(REF_KEY).and_then(Json::as_u64) {
                        report.references += 1;
                        seen_refs.push((id, declared.contains(&id)));
                        continue;
                    }
                    if let Some(id) = object.get(ID_KEY).and_then(Json::as_u64) {
                        report.declared_ids += 1;
                        declared.insert(id);
                    }
                    match object.get(TYPE_KEY).and_then(Json::as_str) {
                        None => {
                            report.bare_objects += 1;
                            object.values().collect()
                        }
                        Some(SEQUENCE_TAG) => {
                            report.sequences += 1;
                            payload(object, SEQUENCE_ITEMS)
                        }
                        Some(SET_TAG) => {
                            report.sets += 1;
                            payload(object, SET_ITEMS)
                        }
                        Some(tag @ (MAPPING_TAG | ENUM_TAG)) => {
                            if tag == MAPPING_TAG {
                                report.mappings += 1;
                            } else {
                                report.enums += 1;
                            }
                            let keys = payload(object, MAPPING_KEYS);
                            let values = payload(object, MAPPING_VALUES);
                            keys.into_iter().zip(values).flat_map(|(k, v)| [k, v]).collect()
                        }
                        Some(DATE_TAG) => {
                            report.dates += 1;
                            Vec::new()
                        }
                        Some(canonical) if canonical.contains('/') => {
                            report.records += 1;
                            *report.record_types.entry(canonical.to_owned()).or_default() += 1;
                            object
                                .iter()
                                .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
                                .map(|(_, v)| v)
                                .collect()
                        }
                        Some(other) => {
                            report.unknown_tags.push(other.to_owned());
                            Vec::new()
                        }
                    }
                }
                _ => {
                    report.scalars += 1;
                    Vec::new()
                }
            };
            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
        }

        for (id, resolved) in seen_refs {
            if resolved {
                continue;
            }
            if declared.contains(&id) {
                report.forward_references.push(id);
            } else {
                report.undeclared_references.push(id);
            }
        }
        report
    }
}

fn payload<'a>(object: &'a serde_json::Map<String, Json>, key: &str) -> Vec<&'a Json> {
    object
        .get(key)
        .and_then(Json::as_array)
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

impl fmt::Display for WireReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== REFCODE INSPECTOR REPORT ===")?;
        writeln!(f, "Max Depth:      {}", self.max_depth)?;
        writeln!(f, "Declared Ids:   {}", self.declared_ids)?;
        writeln!(f, "References:     {}", self.references)?;
        writeln!(f, "\n[WRAPPERS]")?;
        writeln!(
            f,
            "Records: {} | LW: {} | DW: {} | S: {} | E: {} | DD: {}",
            self.records, self.sequences, self.mappings, self.sets, self.enums, self.dates
        )?;
        writeln!(
            f,
            "Bare arrays: {} | Bare objects: {} | Scalars: {}",
            self.bare_arrays, self.bare_objects, self.scalars
        )?;
        if !self.record_types.is_empty() {
            writeln!(f, "\n[RECORD TYPES]")?;
            for (name, count) in &self.record_types {
                writeln!(f, "{name:<40} {count}")?;
            }
        }
        if !self.is_consistent() {
            writeln!(f, "\n[PROBLEMS]")?;
            for id in &self.forward_references {
                writeln!(f, "forward reference to #{id}")?;
            }
            for id in &self.undeclared_references {
                writeln!(f, "reference to undeclared #{id}")?;
            }
            for tag in &self.unknown_tags {
                writeln!(f, "unknown tag '{tag}'")?;
            }
        }
        Ok(())
    }
}
