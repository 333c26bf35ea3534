//! # Editing Policies
//!
//! Pluggable decisions the editing model delegates:
//! - [`RealignmentProcessor`]: which kind a node takes after its connectivity changed
//! - [`NodeModifier`] / [`ArcModifier`]: how a replacement value is built
//! - [`build_arc_kind`]: the factory table from an [`ArcKindTag`] to an [`ArcKind`]
//!
//! Every policy returns a new value carrying the same stable id; the model
//! splices it into the graph.

use crate::graph::{Graph, Staging};
use crate::{Arc, ArcKind, ArcKindTag, DialnetError, Node, NodeId, NodeKind, Position};
use std::fmt::Debug;

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Connectivity as seen by a realignment decision.
///
/// During a structural edit this is the staged graph: the change is visible,
/// but nothing has been committed yet.
pub trait Topology {
    fn in_degree(&self, node: NodeId) -> usize;
    fn out_degree(&self, node: NodeId) -> usize;

    fn degree(&self, node: NodeId) -> usize {
        self.in_degree(node) + self.out_degree(node)
    }
}

impl Topology for Graph<Node, Arc> {
    fn in_degree(&self, node: NodeId) -> usize {
        Graph::in_degree(self, node)
    }

    fn out_degree(&self, node: NodeId) -> usize {
        Graph::out_degree(self, node)
    }
}

impl Topology for Staging<'_, Node, Arc> {
    fn in_degree(&self, node: NodeId) -> usize {
        Staging::in_degree(self, node)
    }

    fn out_degree(&self, node: NodeId) -> usize {
        Staging::out_degree(self, node)
    }
}

// =============================================================================
// REALIGNMENT
// =============================================================================

/// Reclassifies a node whose connectivity changed.
///
/// Implementations must keep the node's id and name; they may return an
/// identical value.
pub trait RealignmentProcessor: Debug + Send + Sync {
    fn realign(&self, topology: &dyn Topology, node: &Node) -> Node;
}

/// Default classification by connectivity.
///
/// - no incident arcs: `Isolated`
/// - an `Isolated` node gaining arcs: `Enter` without incoming arcs, else `Inner`
/// - any other kind is kept as the designer chose it
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectivityRealigner;

impl RealignmentProcessor for ConnectivityRealigner {
    fn realign(&self, topology: &dyn Topology, node: &Node) -> Node {
        let kind = if topology.degree(node.id) == 0 {
            NodeKind::Isolated
        } else if node.is_isolated() {
            if topology.in_degree(node.id) == 0 {
                NodeKind::Enter
            } else {
                NodeKind::Inner
            }
        } else {
            node.kind
        };
        node.with_kind(kind)
    }
}

// =============================================================================
// MODIFICATION
// =============================================================================

/// Target state of a node change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeChange {
    pub name: String,
    pub position: Position,
    pub kind: NodeKind,
}

/// Target state of an arc change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcChange {
    pub name: String,
    pub priority: i32,
    pub kind: ArcKind,
}

/// Builds the replacement of a node.
pub trait NodeModifier: Debug + Send + Sync {
    fn modify(&self, node: &Node, change: &NodeChange) -> Node;
}

/// Builds the replacement of an arc.
pub trait ArcModifier: Debug + Send + Sync {
    fn modify(&self, arc: &Arc, change: &ArcChange) -> Arc;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNodeModifier;

impl NodeModifier for DefaultNodeModifier {
    fn modify(&self, node: &Node, change: &NodeChange) -> Node {
        Node {
            id: node.id,
            name: change.name.clone(),
            network: node.network.clone(),
            position: change.position,
            kind: change.kind,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultArcModifier;

impl ArcModifier for DefaultArcModifier {
    fn modify(&self, arc: &Arc, change: &ArcChange) -> Arc {
        Arc::new(
            arc.id,
            change.name.clone(),
            arc.network.clone(),
            change.priority,
            change.kind.clone(),
        )
    }
}

// =============================================================================
// ARC KIND FACTORY
// =============================================================================

/// Build an [`ArcKind`] from its tag and string arguments.
///
/// `resolve_target` maps the single argument of a recursive arc (a node
/// name) to its id.
pub fn build_arc_kind<F>(
    tag: ArcKindTag,
    args: &[String],
    resolve_target: F,
) -> Result<ArcKind, DialnetError>
where
    F: FnOnce(&str) -> Result<NodeId, DialnetError>,
{
    if args.len() != tag.arity() {
        return Err(DialnetError::InvalidArgument(format!(
            "{} arc expects {} argument(s), got {}",
            tag,
            tag.arity(),
            args.len()
        )));
    }
    let first = || args.first().cloned().unwrap_or_default();

    Ok(match tag {
        ArcKindTag::Empty => ArcKind::Empty,
        ArcKindTag::Pattern => ArcKind::Pattern { pattern: first() },
        ArcKindTag::Predicate => ArcKind::Predicate { predicate: first() },
        ArcKindTag::Code => ArcKind::Code { code: first() },
        ArcKindTag::Recursive => ArcKind::Recursive {
            target: resolve_target(&first())?,
        },
    })
}

// =============================================================================
// TESTS
// =============================================================================
