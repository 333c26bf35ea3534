//! # Core Type Definitions
//!
//! This module contains all core types for the dialnet editing model:
//! - Stable identifiers (`NodeId`, `ArcId`)
//! - Vertex and edge values (`Node`, `Arc`) and their kind unions
//! - Opaque layout payload (`Position`)
//! - Error types (`DialnetError`)
//!
//! ## Value Semantics
//!
//! Nodes and arcs are never mutated in place. A change is expressed by
//! building a replacement value that keeps the same stable id and splicing
//! it into the graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// STABLE IDENTIFIERS
// =============================================================================

/// Stable arena key of a node. Survives renames and realignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Stable arena key of an arc. Survives renames and kind changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArcId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n#{}", self.0)
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a#{}", self.0)
    }
}

// =============================================================================
// POSITION
// =============================================================================

/// Layout coordinates carried for the editor views.
///
/// The model never interprets them beyond rejecting negative values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Validate that both coordinates are non-negative.
    pub fn validate(self) -> Result<Self, DialnetError> {
        if self.x < 0 || self.y < 0 {
            return Err(DialnetError::InvalidArgument(format!(
                "negative coordinates ({}, {})",
                self.x, self.y
            )));
        }
        Ok(self)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Classification of a node.
///
/// Only `Enter` and `Isolated` carry meaning for the model: `Enter` nodes are
/// the valid targets of recursive arcs, `Isolated` nodes have no incident arcs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Isolated,
    Enter,
    Inner,
    Exit,
}

impl NodeKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Isolated => "isolated",
            Self::Enter => "enter",
            Self::Inner => "inner",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = DialnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolated" => Ok(Self::Isolated),
            "enter" => Ok(Self::Enter),
            "inner" => Ok(Self::Inner),
            "exit" => Ok(Self::Exit),
            other => Err(DialnetError::InvalidArgument(format!(
                "unknown node kind '{}'",
                other
            ))),
        }
    }
}

/// A vertex of a conversation network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Name of the owning network.
    pub network: String,
    pub position: Position,
    pub kind: NodeKind,
}

impl Node {
    /// Create a fresh `Isolated` node.
    #[must_use]
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        network: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            network: network.into(),
            position,
            kind: NodeKind::Isolated,
        }
    }

    /// Replacement value with a different kind.
    #[must_use]
    pub fn with_kind(&self, kind: NodeKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_enter(&self) -> bool {
        self.kind == NodeKind::Enter
    }

    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.kind == NodeKind::Isolated
    }
}

// =============================================================================
// ARC
// =============================================================================

/// Per-kind payload of an arc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArcKind {
    /// Unconditional transition.
    Empty,
    /// Transition taken when the input matches `pattern`.
    Pattern { pattern: String },
    /// Transition guarded by a named predicate.
    Predicate { predicate: String },
    /// Transition running a code fragment.
    Code { code: String },
    /// Transition that recurses into the network owning `target`.
    ///
    /// The target must be an `Enter` node and may live in any network.
    Recursive { target: NodeId },
}

impl ArcKind {
    #[must_use]
    pub fn tag(&self) -> ArcKindTag {
        match self {
            Self::Empty => ArcKindTag::Empty,
            Self::Pattern { .. } => ArcKindTag::Pattern,
            Self::Predicate { .. } => ArcKindTag::Predicate,
            Self::Code { .. } => ArcKindTag::Code,
            Self::Recursive { .. } => ArcKindTag::Recursive,
        }
    }

    /// Target of a recursive arc, `None` for every other kind.
    #[must_use]
    pub fn recursion_target(&self) -> Option<NodeId> {
        match self {
            Self::Recursive { target } => Some(*target),
            _ => None,
        }
    }
}

/// Discriminant of [`ArcKind`], used to request a kind change by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArcKindTag {
    Empty,
    Pattern,
    Predicate,
    Code,
    Recursive,
}

impl ArcKindTag {
    pub const ALL: [ArcKindTag; 5] = [
        Self::Empty,
        Self::Pattern,
        Self::Predicate,
        Self::Code,
        Self::Recursive,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Pattern => "pattern",
            Self::Predicate => "predicate",
            Self::Code => "code",
            Self::Recursive => "recursive",
        }
    }

    /// Number of string arguments the kind's constructor expects.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Pattern | Self::Predicate | Self::Code | Self::Recursive => 1,
        }
    }
}

impl fmt::Display for ArcKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArcKindTag {
    type Err = DialnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.name() == s)
            .ok_or_else(|| DialnetError::InvalidArgument(format!("unknown arc kind '{}'", s)))
    }
}

/// A directed, named, prioritized edge between two nodes of one network.
///
/// Endpoints are not stored here; they live in the graph's joint records so
/// that swapping the arc value never touches connection bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arc {
    pub id: ArcId,
    pub name: String,
    /// Name of the owning network.
    pub network: String,
    pub priority: i32,
    #[serde(flatten)]
    pub kind: ArcKind,
}

impl Arc {
    #[must_use]
    pub fn new(
        id: ArcId,
        name: impl Into<String>,
        network: impl Into<String>,
        priority: i32,
        kind: ArcKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            network: network.into(),
            priority,
            kind,
        }
    }

    #[must_use]
    pub fn is_recursive(&self) -> bool {
        matches!(self.kind, ArcKind::Recursive { .. })
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Direction of a connection relative to a node.
///
/// For a node, `In` selects arcs ending at it and `Out` arcs starting from it.
/// For an arc, `Out` selects the node it leaves and `In` the node it enters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    In,
    Out,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in dialnet.
///
/// - No silent failures
/// - Every mutating operation either commits fully or returns one of these
///   with the model left untouched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialnetError {
    /// A network, node, or arc identifier is already taken.
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// A name does not resolve to a live entity.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// The requested connection is not allowed (self-loop, cross-network endpoint).
    #[error("Illegal topology: {0}")]
    IllegalTopology(String),

    /// The change would strand a recursive reference.
    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrityViolation(String),

    /// The naming authority refused the name.
    #[error("Name not usable: {0}")]
    NameNotUsable(String),

    /// Releasing a name that is not reserved.
    #[error("Name not reserved: {0}")]
    NotReserved(String),

    /// A malformed argument (negative coordinates, bad kind, wrong arity).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Internal indices disagree with each other.
    #[error("Inconsistent model: {0}")]
    Inconsistent(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The configuration could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_position_rejected() {
        assert!(Position::new(0, 0).validate().is_ok());
        assert!(matches!(
            Position::new(-1, 4).validate(),
            Err(DialnetError::InvalidArgument(_))
        ));
    }

    #[test]
    fn fresh_node_is_isolated() {
        let node = Node::new(NodeId(1), "greet", "main", Position::default());
        assert!(node.is_isolated());

        let enter = node.with_kind(NodeKind::Enter);
        assert!(enter.is_enter());
        assert_eq!(enter.id, node.id);
        assert_eq!(enter.name, node.name);
    }

    #[test]
    fn arc_kind_tags_parse() {
        for tag in ArcKindTag::ALL {
            assert_eq!(tag.name().parse::<ArcKindTag>().expect("parse"), tag);
        }
        assert!("bogus".parse::<ArcKindTag>().is_err());
    }

    #[test]
    fn recursion_target_only_for_recursive() {
        assert_eq!(
            ArcKind::Recursive { target: NodeId(7) }.recursion_target(),
            Some(NodeId(7))
        );
        assert_eq!(ArcKind::Empty.recursion_target(), None);
    }

    #[test]
    fn node_kind_round_trips_through_name() {
        for kind in [
            NodeKind::Isolated,
            NodeKind::Enter,
            NodeKind::Inner,
            NodeKind::Exit,
        ] {
            assert_eq!(kind.name().parse::<NodeKind>().expect("parse"), kind);
        }
    }
}
