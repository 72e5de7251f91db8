//! Materialized path codec.
//!
//! A [`TreePath`] encodes a node's position as the sequence of 3-digit
//! sibling segments from the tree's first level down to the node, rendered
//! dot-joined (`"001.002.003"`). The segment width and the `.` separator are
//! a compatibility contract with stored data and must not change.
//!
//! All operations here are pure string/integer work with no I/O; ancestor and
//! containment checks are O(path length) comparisons, which is what lets the
//! permission resolver avoid recursive tree walks entirely.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PathError;

/// Width of one rendered segment.
pub const SEGMENT_WIDTH: usize = 3;

/// Largest value a 3-digit segment can hold.
pub const MAX_SEGMENT: u16 = 999;

/// A validated materialized path: one or more fixed-width segments.
///
/// Root nodes have *no* path (`Option<TreePath>::None`); a `TreePath` is
/// therefore always non-empty and its depth is at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    /// Canonical rendered form (`"001.002"`).
    raw: String,
    /// Parsed segment values.
    segments: Vec<u16>,
}

impl TreePath {
    /// Parses and validates the dot-joined text form.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::InvalidFormat("path cannot be empty".to_string()));
        }

        let mut segments = Vec::new();
        for part in text.split('.') {
            if part.len() != SEGMENT_WIDTH || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PathError::InvalidFormat(format!(
                    "segment '{}' is not a {}-digit number in '{}'",
                    part, SEGMENT_WIDTH, text
                )));
            }
            // Always fits in u16 after the digit/width check.
            let value: u16 = part.parse().map_err(|_| {
                PathError::InvalidFormat(format!("segment '{}' is not numeric", part))
            })?;
            segments.push(value);
        }

        Ok(Self {
            raw: text.to_string(),
            segments,
        })
    }

    /// Builds a path from raw segment values.
    pub fn from_segments(segments: &[u16]) -> Result<Self, PathError> {
        if segments.is_empty() {
            return Err(PathError::InvalidFormat("path cannot be empty".to_string()));
        }
        if let Some(bad) = segments.iter().find(|s| **s > MAX_SEGMENT) {
            return Err(PathError::InvalidFormat(format!(
                "segment {} exceeds {} digits",
                bad, SEGMENT_WIDTH
            )));
        }

        let raw = segments
            .iter()
            .map(|s| format!("{:0width$}", s, width = SEGMENT_WIDTH))
            .collect::<Vec<_>>()
            .join(".");

        Ok(Self {
            raw,
            segments: segments.to_vec(),
        })
    }

    /// A single-segment path (a child of a root node).
    pub fn single(segment: u16) -> Result<Self, PathError> {
        Self::from_segments(&[segment])
    }

    /// The canonical rendered form.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segment values.
    pub fn segments(&self) -> &[u16] {
        &self.segments
    }

    /// Number of segments. The owning node's depth equals this count.
    pub fn depth(&self) -> u32 {
        self.segments.len() as u32
    }

    /// The last segment (the node's sibling slot under its parent).
    pub fn last_segment(&self) -> u16 {
        *self.segments.last().expect("TreePath is never empty")
    }

    /// Appends a child segment.
    pub fn child(&self, segment: u16) -> Result<Self, PathError> {
        if segment > MAX_SEGMENT {
            return Err(PathError::InvalidFormat(format!(
                "segment {} exceeds {} digits",
                segment, SEGMENT_WIDTH
            )));
        }
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self::from_segments(&segments)
    }

    /// The parent path, or `None` when this path has a single segment
    /// (the parent is then a root node, which has no path).
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Self::from_segments(&self.segments[..self.segments.len() - 1]).ok()
    }

    /// All prefixes of this path, shortest first, ending with the path
    /// itself (`"001.002"` → `["001", "001.002"]`).
    pub fn chain(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .filter_map(|i| Self::from_segments(&self.segments[..i]).ok())
            .collect()
    }

    /// True iff `other` equals this path or lies in its subtree
    /// (this path is a dot-delimited prefix of `other`).
    pub fn is_ancestor_or_self(&self, other: &TreePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Depth-limited containment: ancestor-or-self, and when `limit` is set,
    /// `other` is at most `limit` levels below this path.
    pub fn is_within_depth(&self, other: &TreePath, limit: Option<u32>) -> bool {
        if !self.is_ancestor_or_self(other) {
            return false;
        }
        match limit {
            Some(limit) => other.depth() - self.depth() <= limit,
            None => true,
        }
    }

    /// Replaces the `old_prefix` of this path with `new_prefix`.
    ///
    /// This is the descendant-rewrite primitive for subtree moves. The caller
    /// guarantees `old_prefix` is an ancestor-or-self of this path.
    pub fn reroot(&self, old_prefix: &TreePath, new_prefix: &TreePath) -> Result<Self, PathError> {
        debug_assert!(old_prefix.is_ancestor_or_self(self));
        let mut segments = new_prefix.segments.clone();
        segments.extend_from_slice(&self.segments[old_prefix.segments.len()..]);
        Self::from_segments(&segments)
    }

    /// The exclusive upper bound for a string range scan over this path's
    /// subtree: every descendant path sorts in `[path, bound)` because `/`
    /// is the ASCII successor of the `.` separator.
    pub fn range_bound(&self) -> String {
        format!("{}/", self.raw)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TreePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TreePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for TreePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        TreePath::parse(&text).map_err(D::Error::custom)
    }
}
