//! # Labeled System Graph
//!
//! The graph core specialised to [`Node`]/[`Arc`], with name indices and the
//! composite edits that keep node classification aligned with connectivity.
//!
//! Each composite edit is staged first: the processor classifies the affected
//! nodes against a [`Staging`](crate::graph::Staging) overlay, the reference
//! guard validates the result, and only then are the arena and the name
//! indices updated together. A rejected edit leaves both untouched.
//!
//! Every composite edit returns an [`Update`] describing the delta, which the
//! orchestrator turns into events.

use crate::graph::{Graph, Keyed};
use crate::policy::{RealignmentProcessor, Topology};
use crate::{Arc, ArcId, DialnetError, Direction, Node, NodeId};
use std::collections::{BTreeMap, BTreeSet};

impl Keyed for Node {
    type Key = NodeId;

    fn key(&self) -> NodeId {
        self.id
    }
}

impl Keyed for Arc {
    type Key = ArcId;

    fn key(&self) -> ArcId {
        self.id
    }
}

// =============================================================================
// REFERENCE REGISTRY
// =============================================================================

/// Multimap from an `Enter` node to the recursive arcs targeting it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRegistry {
    by_target: BTreeMap<NodeId, BTreeSet<ArcId>>,
}

impl ReferenceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, target: NodeId, arc: ArcId) {
        self.by_target.entry(target).or_default().insert(arc);
    }

    /// Drop one entry. Returns whether it was present.
    pub fn unregister(&mut self, target: NodeId, arc: ArcId) -> bool {
        let Some(arcs) = self.by_target.get_mut(&target) else {
            return false;
        };
        let removed = arcs.remove(&arc);
        if arcs.is_empty() {
            self.by_target.remove(&target);
        }
        removed
    }

    /// Drop every entry listed in `removed`.
    pub fn purge(&mut self, removed: &BTreeMap<NodeId, BTreeSet<ArcId>>) {
        for (target, arcs) in removed {
            for arc in arcs {
                self.unregister(*target, *arc);
            }
        }
    }

    #[must_use]
    pub fn is_referenced(&self, target: NodeId) -> bool {
        self.by_target.contains_key(&target)
    }

    /// Recursive arcs targeting `target`, in id order.
    pub fn referrers(&self, target: NodeId) -> impl Iterator<Item = ArcId> + '_ {
        self.by_target.get(&target).into_iter().flatten().copied()
    }

    /// Every `(target, arc)` entry in id order.
    pub fn entries(&self) -> impl Iterator<Item = (NodeId, ArcId)> + '_ {
        self.by_target
            .iter()
            .flat_map(|(target, arcs)| arcs.iter().map(move |arc| (*target, *arc)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_target.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Delta produced by a composite edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    /// Recursive references severed by the edit, by target.
    pub references_removed: BTreeMap<NodeId, BTreeSet<ArcId>>,
    pub initials_added: BTreeSet<NodeId>,
    pub initials_removed: BTreeSet<NodeId>,
    pub isolated_added: BTreeSet<NodeId>,
    pub isolated_removed: BTreeSet<NodeId>,
    /// `(previous, replacement)` of every node whose kind changed.
    pub realigned: Vec<(Node, Node)>,
}

impl Update {
    fn node_entered(&mut self, node: &Node) {
        if node.is_enter() {
            self.initials_added.insert(node.id);
        }
        if node.is_isolated() {
            self.isolated_added.insert(node.id);
        }
    }

    fn node_left(&mut self, node: &Node) {
        if node.is_enter() {
            self.initials_removed.insert(node.id);
        }
        if node.is_isolated() {
            self.isolated_removed.insert(node.id);
        }
    }

    pub(crate) fn transition(&mut self, previous: &Node, fresh: &Node) {
        if previous.kind == fresh.kind {
            return;
        }
        self.node_left(previous);
        self.node_entered(fresh);
        self.realigned.push((previous.clone(), fresh.clone()));
    }

    fn sever(&mut self, arc: &Arc) {
        if let Some(target) = arc.kind.recursion_target() {
            self.references_removed
                .entry(target)
                .or_default()
                .insert(arc.id);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of removing a node through [`LabeledGraph::remove_node_and_realign`].
#[derive(Debug, Clone)]
pub struct NodeRemoval {
    pub node: Node,
    pub arcs: Vec<Arc>,
    pub update: Update,
}

// =============================================================================
// GUARDS
// =============================================================================

/// Ask `processor` for the replacement of `node`, enforcing its contract.
fn realign_checked(
    processor: &dyn RealignmentProcessor,
    topology: &dyn Topology,
    node: &Node,
) -> Result<Node, DialnetError> {
    let fresh = processor.realign(topology, node);
    if fresh.id != node.id || fresh.name != node.name || fresh.network != node.network {
        return Err(DialnetError::InvalidArgument(format!(
            "realignment changed identity of node '{}'",
            node.name
        )));
    }
    Ok(fresh)
}

/// Reject a reclassification that would demote a referenced `Enter` node.
///
/// The demotion is allowed when every referring arc is removed by the same
/// edit (`severed`).
fn guard_references(
    references: &ReferenceRegistry,
    previous: &Node,
    fresh: &Node,
    severed: impl Fn(ArcId) -> bool,
) -> Result<(), DialnetError> {
    if !previous.is_enter() || fresh.is_enter() {
        return Ok(());
    }
    if references.referrers(previous.id).all(severed) {
        return Ok(());
    }
    tracing::warn!(node = %previous.name, "realignment would strand recursive references");
    Err(DialnetError::ReferentialIntegrityViolation(format!(
        "enter node '{}' is the target of recursive arcs and cannot become {}",
        previous.name, fresh.kind
    )))
}

// =============================================================================
// LABELED GRAPH
// =============================================================================

/// Node/arc graph with name indices kept in lockstep with the arena.
#[derive(Debug, Clone, Default)]
pub struct LabeledGraph {
    graph: Graph<Node, Arc>,
    node_names: BTreeMap<String, NodeId>,
    arc_names: BTreeMap<String, ArcId>,
    next_node_id: u64,
    next_arc_id: u64,
}

impl LabeledGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the id for a node about to be inserted.
    pub fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.saturating_add(1);
        id
    }

    /// Allocate the id for an arc about to be inserted.
    pub fn allocate_arc_id(&mut self) -> ArcId {
        let id = ArcId(self.next_arc_id);
        self.next_arc_id = self.next_arc_id.saturating_add(1);
        id
    }

    // -------------------------------------------------------------------------
    // Composite edits
    // -------------------------------------------------------------------------

    /// Insert a fresh node.
    pub fn insert_node(&mut self, node: Node) -> Result<Update, DialnetError> {
        if self.node_names.contains_key(&node.name) {
            return Err(DialnetError::DuplicateIdentifier(node.name));
        }
        let mut update = Update::default();
        update.node_entered(&node);
        let (id, name) = (node.id, node.name.clone());
        self.graph.add_vertex(node)?;
        self.node_names.insert(name, id);
        Ok(update)
    }

    /// Remove a node, realigning every neighbor.
    ///
    /// Neighbors are reclassified against the graph without the node; the
    /// edit is rejected if a referenced `Enter` neighbor would be demoted
    /// while some of its referrers survive.
    pub fn remove_node_and_realign(
        &mut self,
        node: NodeId,
        processor: &dyn RealignmentProcessor,
        references: &ReferenceRegistry,
    ) -> Result<NodeRemoval, DialnetError> {
        let mut update = Update::default();

        let extraction = self.graph.extract_vertex(
            node,
            |staging, neighbor| processor.realign(staging, neighbor),
            |staging, neighbor| {
                let fresh = realign_checked(processor, staging, neighbor)?;
                guard_references(references, neighbor, &fresh, |arc| staging.is_severed(arc))
            },
            |arc, _| {
                update.sever(arc);
                Ok::<(), DialnetError>(())
            },
        )?;

        self.node_names.remove(&extraction.vertex.name);
        update.node_left(&extraction.vertex);
        let mut arcs = Vec::with_capacity(extraction.edges.len());
        for (arc, _) in extraction.edges {
            self.arc_names.remove(&arc.name);
            arcs.push(arc);
        }
        for (previous, fresh) in &extraction.repaired {
            update.transition(previous, fresh);
        }

        Ok(NodeRemoval {
            node: extraction.vertex,
            arcs,
            update,
        })
    }

    /// Remove one arc and realign both of its endpoints.
    pub fn remove_arc_and_realign(
        &mut self,
        arc: ArcId,
        processor: &dyn RealignmentProcessor,
        references: &ReferenceRegistry,
    ) -> Result<(Arc, Update), DialnetError> {
        let joint = self
            .graph
            .joint(arc)
            .ok_or_else(|| DialnetError::UnknownEntity(arc.to_string()))?;

        let replacements = {
            let staging = self.graph.stage().without_edge(arc)?;
            let mut replacements = Vec::with_capacity(2);
            for endpoint in [joint.start, joint.end] {
                let previous = self.node_by_id(endpoint)?;
                let fresh = realign_checked(processor, &staging, previous)?;
                guard_references(references, previous, &fresh, |a| staging.is_severed(a))?;
                replacements.push(fresh);
            }
            replacements
        };

        let (removed, _) = self.graph.remove_edge(arc)?;
        self.arc_names.remove(&removed.name);

        let mut update = Update::default();
        update.sever(&removed);
        for fresh in replacements {
            let previous = self.graph.replace_vertex(fresh.id, fresh.clone())?;
            update.transition(&previous, &fresh);
        }
        Ok((removed, update))
    }

    /// Add an arc between two nodes of its network and realign both endpoints.
    pub fn add_arc_and_realign(
        &mut self,
        arc: Arc,
        from: NodeId,
        to: NodeId,
        processor: &dyn RealignmentProcessor,
        references: &ReferenceRegistry,
    ) -> Result<Update, DialnetError> {
        if self.arc_names.contains_key(&arc.name) {
            return Err(DialnetError::DuplicateIdentifier(arc.name));
        }
        if self.graph.contains_edge(arc.id) {
            return Err(DialnetError::DuplicateIdentifier(arc.id.to_string()));
        }
        for endpoint in [from, to] {
            let node = self.node_by_id(endpoint)?;
            if node.network != arc.network {
                return Err(DialnetError::IllegalTopology(format!(
                    "node '{}' belongs to network '{}', arc '{}' to '{}'",
                    node.name, node.network, arc.name, arc.network
                )));
            }
        }

        let replacements = {
            let staging = self.graph.stage().with_joint(from, to)?;
            let mut replacements = Vec::with_capacity(2);
            for endpoint in [from, to] {
                let previous = self.node_by_id(endpoint)?;
                let fresh = realign_checked(processor, &staging, previous)?;
                guard_references(references, previous, &fresh, |_| false)?;
                replacements.push(fresh);
            }
            replacements
        };

        let (id, name) = (arc.id, arc.name.clone());
        self.graph.add_edge(arc, from, to)?;
        self.arc_names.insert(name, id);

        let mut update = Update::default();
        for fresh in replacements {
            let previous = self.graph.replace_vertex(fresh.id, fresh.clone())?;
            update.transition(&previous, &fresh);
        }
        Ok(update)
    }

    /// Remove a set of nodes and every arc touching them, without realignment.
    ///
    /// Used for whole-network removal, where no surviving node is adjacent.
    pub fn purge_nodes(
        &mut self,
        nodes: &BTreeSet<NodeId>,
    ) -> Result<Vec<(Node, Vec<Arc>)>, DialnetError> {
        for node in nodes {
            self.node_by_id(*node)?;
        }
        let mut removed = Vec::with_capacity(nodes.len());
        for node in nodes {
            let (value, edges) = self.graph.remove_vertex(*node)?;
            self.node_names.remove(&value.name);
            let arcs: Vec<Arc> = edges.into_iter().map(|(arc, _)| arc).collect();
            for arc in &arcs {
                self.arc_names.remove(&arc.name);
            }
            removed.push((value, arcs));
        }
        Ok(removed)
    }

    /// Splice a replacement node (same id) into the graph.
    ///
    /// Returns the previous value. The name index follows a rename.
    pub fn replace_node(&mut self, fresh: Node) -> Result<Node, DialnetError> {
        let previous = self.node_by_id(fresh.id)?;
        if previous.network != fresh.network {
            return Err(DialnetError::IllegalTopology(format!(
                "node '{}' cannot move between networks",
                previous.name
            )));
        }
        if previous.name != fresh.name && self.node_names.contains_key(&fresh.name) {
            return Err(DialnetError::DuplicateIdentifier(fresh.name));
        }
        let (id, name) = (fresh.id, fresh.name.clone());
        let previous = self.graph.replace_vertex(id, fresh)?;
        if previous.name != name {
            self.node_names.remove(&previous.name);
            self.node_names.insert(name, id);
        }
        Ok(previous)
    }

    /// Splice a replacement arc (same id) into the graph.
    pub fn replace_arc(&mut self, fresh: Arc) -> Result<Arc, DialnetError> {
        let previous = self.arc_by_id(fresh.id)?;
        if previous.network != fresh.network {
            return Err(DialnetError::IllegalTopology(format!(
                "arc '{}' cannot move between networks",
                previous.name
            )));
        }
        if previous.name != fresh.name && self.arc_names.contains_key(&fresh.name) {
            return Err(DialnetError::DuplicateIdentifier(fresh.name));
        }
        let (id, name) = (fresh.id, fresh.name.clone());
        let previous = self.graph.replace_edge(id, fresh)?;
        if previous.name != name {
            self.arc_names.remove(&previous.name);
            self.arc_names.insert(name, id);
        }
        Ok(previous)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn graph(&self) -> &Graph<Node, Arc> {
        &self.graph
    }

    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_names
            .get(name)
            .and_then(|id| self.graph.vertex(*id))
    }

    #[must_use]
    pub fn arc(&self, name: &str) -> Option<&Arc> {
        self.arc_names.get(name).and_then(|id| self.graph.edge(*id))
    }

    pub fn node_by_id(&self, id: NodeId) -> Result<&Node, DialnetError> {
        self.graph
            .vertex(id)
            .ok_or_else(|| DialnetError::UnknownEntity(id.to_string()))
    }

    pub fn arc_by_id(&self, id: ArcId) -> Result<&Arc, DialnetError> {
        self.graph
            .edge(id)
            .ok_or_else(|| DialnetError::UnknownEntity(id.to_string()))
    }

    /// Arcs touching `node` in the given direction, in id order.
    pub fn connections(&self, node: NodeId, direction: Direction) -> Vec<&Arc> {
        match direction {
            Direction::In => self.graph.ins(node).collect(),
            Direction::Out => self.graph.outs(node).collect(),
        }
    }

    /// The node an arc leaves (`Out`) or enters (`In`).
    pub fn attached(&self, arc: ArcId, direction: Direction) -> Option<&Node> {
        let joint = self.graph.joint(arc)?;
        let endpoint = match direction {
            Direction::Out => joint.start,
            Direction::In => joint.end,
        };
        self.graph.vertex(endpoint)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.vertices()
    }

    /// All arcs in id order.
    pub fn arcs(&self) -> impl Iterator<Item = &Arc> {
        self.graph.edges().map(|(arc, _)| arc)
    }

    /// Verify that the name indices mirror the arena and that every arc
    /// connects two distinct nodes of its own network.
    pub fn check_indices(&self) -> Result<(), DialnetError> {
        if self.node_names.len() != self.graph.vertex_count()
            || self.arc_names.len() != self.graph.edge_count()
        {
            return Err(DialnetError::Inconsistent(
                "name index size differs from arena".to_string(),
            ));
        }
        for node in self.graph.vertices() {
            if self.node_names.get(&node.name) != Some(&node.id) {
                return Err(DialnetError::Inconsistent(format!(
                    "node '{}' is not indexed",
                    node.name
                )));
            }
        }
        for (arc, joint) in self.graph.edges() {
            if self.arc_names.get(&arc.name) != Some(&arc.id) {
                return Err(DialnetError::Inconsistent(format!(
                    "arc '{}' is not indexed",
                    arc.name
                )));
            }
            if joint.start == joint.end {
                return Err(DialnetError::Inconsistent(format!(
                    "arc '{}' is a self-loop",
                    arc.name
                )));
            }
            for endpoint in [joint.start, joint.end] {
                if self.node_by_id(endpoint)?.network != arc.network {
                    return Err(DialnetError::Inconsistent(format!(
                        "arc '{}' leaves network '{}'",
                        arc.name, arc.network
                    )));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ConnectivityRealigner;
    use crate::{ArcKind, NodeKind, Position};

    fn add_node(graph: &mut LabeledGraph, name: &str, network: &str) -> NodeId {
        let id = graph.allocate_node_id();
        graph
            .insert_node(Node::new(id, name, network, Position::default()))
            .expect("insert");
        id
    }

    fn add_arc(
        graph: &mut LabeledGraph,
        name: &str,
        network: &str,
        from: NodeId,
        to: NodeId,
        kind: ArcKind,
        references: &ReferenceRegistry,
    ) -> Result<Update, DialnetError> {
        let id = graph.allocate_arc_id();
        let arc = Arc::new(id, name, network, 0, kind);
        graph.add_arc_and_realign(arc, from, to, &ConnectivityRealigner, references)
    }

    #[test]
    fn insert_reports_isolated() {
        let mut graph = LabeledGraph::new();
        let id = graph.allocate_node_id();
        let update = graph
            .insert_node(Node::new(id, "a", "main", Position::default()))
            .expect("insert");
        assert!(update.isolated_added.contains(&id));

        let dup = graph.allocate_node_id();
        assert!(matches!(
            graph.insert_node(Node::new(dup, "a", "main", Position::default())),
            Err(DialnetError::DuplicateIdentifier(_))
        ));
    }

    #[test]
    fn adding_arc_promotes_endpoints() {
        let mut graph = LabeledGraph::new();
        let refs = ReferenceRegistry::new();
        let a = add_node(&mut graph, "a", "main");
        let b = add_node(&mut graph, "b", "main");

        let update = add_arc(&mut graph, "x", "main", a, b, ArcKind::Empty, &refs).expect("arc");

        assert_eq!(graph.node("a").map(|n| n.kind), Some(NodeKind::Enter));
        assert_eq!(graph.node("b").map(|n| n.kind), Some(NodeKind::Inner));
        assert_eq!(update.initials_added, BTreeSet::from([a]));
        assert_eq!(update.isolated_removed, BTreeSet::from([a, b]));
        assert_eq!(update.realigned.len(), 2);
    }

    #[test]
    fn cross_network_arc_rejected() {
        let mut graph = LabeledGraph::new();
        let refs = ReferenceRegistry::new();
        let a = add_node(&mut graph, "a", "main");
        let b = add_node(&mut graph, "b", "other");

        let result = add_arc(&mut graph, "x", "main", a, b, ArcKind::Empty, &refs);
        assert!(matches!(result, Err(DialnetError::IllegalTopology(_))));
        assert!(graph.arc("x").is_none());
    }

    #[test]
    fn removing_arc_isolates_endpoints() {
        let mut graph = LabeledGraph::new();
        let refs = ReferenceRegistry::new();
        let a = add_node(&mut graph, "a", "main");
        let b = add_node(&mut graph, "b", "main");
        add_arc(&mut graph, "x", "main", a, b, ArcKind::Empty, &refs).expect("arc");

        let id = graph.arc("x").map(|arc| arc.id).expect("arc id");
        let (arc, update) = graph
            .remove_arc_and_realign(id, &ConnectivityRealigner, &refs)
            .expect("remove");

        assert_eq!(arc.name, "x");
        assert!(graph.arc("x").is_none());
        assert_eq!(update.initials_removed, BTreeSet::from([a]));
        assert_eq!(update.isolated_added, BTreeSet::from([a, b]));
        graph.check_indices().expect("consistent");
    }

    #[test]
    fn removing_arc_cannot_demote_referenced_enter() {
        let mut graph = LabeledGraph::new();
        let mut refs = ReferenceRegistry::new();
        let a = add_node(&mut graph, "a", "main");
        let b = add_node(&mut graph, "b", "main");
        add_arc(&mut graph, "x", "main", a, b, ArcKind::Empty, &refs).expect("arc");

        let p = add_node(&mut graph, "p", "caller");
        let q = add_node(&mut graph, "q", "caller");
        let call = ArcKind::Recursive { target: a };
        add_arc(&mut graph, "r", "caller", p, q, call, &refs).expect("recursive");
        let r = graph.arc("r").map(|arc| arc.id).expect("r");
        refs.register(a, r);

        let x = graph.arc("x").map(|arc| arc.id).expect("x");
        let before = graph.graph().clone();
        let result = graph.remove_arc_and_realign(x, &ConnectivityRealigner, &refs);

        assert!(matches!(
            result,
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        assert_eq!(graph.graph(), &before);
        assert!(graph.arc("x").is_some());
    }

    #[test]
    fn removing_node_records_severed_references() {
        let mut graph = LabeledGraph::new();
        let mut refs = ReferenceRegistry::new();
        let e = add_node(&mut graph, "e", "main");
        let f = add_node(&mut graph, "f", "main");
        add_arc(&mut graph, "go", "main", e, f, ArcKind::Empty, &refs).expect("arc");
        let g = add_node(&mut graph, "g", "main");
        let call = ArcKind::Recursive { target: e };
        add_arc(&mut graph, "r", "main", f, g, call, &refs).expect("recursive");
        let r = graph.arc("r").map(|arc| arc.id).expect("r");
        refs.register(e, r);

        let removal = graph
            .remove_node_and_realign(g, &ConnectivityRealigner, &refs)
            .expect("remove");

        assert_eq!(removal.arcs.len(), 1);
        assert_eq!(
            removal.update.references_removed,
            BTreeMap::from([(e, BTreeSet::from([r]))])
        );
        assert!(graph.arc("r").is_none());
        assert!(graph.node("g").is_none());
        graph.check_indices().expect("consistent");
    }

    #[test]
    fn removing_node_cannot_strand_enter_neighbor() {
        let mut graph = LabeledGraph::new();
        let mut refs = ReferenceRegistry::new();
        let e = add_node(&mut graph, "e", "main");
        let f = add_node(&mut graph, "f", "main");
        add_arc(&mut graph, "go", "main", e, f, ArcKind::Empty, &refs).expect("arc");

        let p = add_node(&mut graph, "p", "caller");
        let q = add_node(&mut graph, "q", "caller");
        add_arc(&mut graph, "r", "caller", p, q, ArcKind::Recursive { target: e }, &refs)
            .expect("recursive");
        let r = graph.arc("r").map(|arc| arc.id).expect("r");
        refs.register(e, r);

        let before = graph.clone();
        let result = graph.remove_node_and_realign(f, &ConnectivityRealigner, &refs);
        assert!(matches!(
            result,
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        assert_eq!(graph.graph(), before.graph());
        assert!(graph.node("f").is_some());
        graph.check_indices().expect("consistent");
    }

    #[test]
    fn rename_updates_index() {
        let mut graph = LabeledGraph::new();
        let a = add_node(&mut graph, "a", "main");
        add_node(&mut graph, "b", "main");

        let node = graph.node_by_id(a).expect("node").clone();
        let renamed = Node {
            name: "alpha".to_string(),
            ..node.clone()
        };
        graph.replace_node(renamed).expect("rename");
        assert!(graph.node("a").is_none());
        assert_eq!(graph.node("alpha").map(|n| n.id), Some(a));

        let clash = Node {
            name: "b".to_string(),
            ..node
        };
        assert!(matches!(
            graph.replace_node(clash),
            Err(DialnetError::DuplicateIdentifier(_))
        ));
        graph.check_indices().expect("consistent");
    }

    #[test]
    fn graph_errors_name_keys_by_display() {
        let mut graph: Graph<Node, Arc> = Graph::new();
        let err: DialnetError = graph
            .remove_edge(ArcId(3))
            .map(|_| ())
            .expect_err("unknown arc")
            .into();
        assert_eq!(err, DialnetError::UnknownEntity("a#3".to_string()));

        let err: DialnetError = graph
            .add_edge(
                Arc::new(ArcId(4), "x", "main", 0, ArcKind::Empty),
                NodeId(1),
                NodeId(2),
            )
            .expect_err("unknown endpoint")
            .into();
        assert_eq!(err, DialnetError::UnknownEntity("n#1".to_string()));
    }

    #[test]
    fn registry_tracks_multimap() {
        let mut refs = ReferenceRegistry::new();
        refs.register(NodeId(1), ArcId(10));
        refs.register(NodeId(1), ArcId(11));
        refs.register(NodeId(2), ArcId(12));
        assert_eq!(refs.len(), 3);
        assert_eq!(
            refs.referrers(NodeId(1)).collect::<Vec<_>>(),
            vec![ArcId(10), ArcId(11)]
        );

        assert!(refs.unregister(NodeId(1), ArcId(10)));
        assert!(!refs.unregister(NodeId(1), ArcId(10)));
        refs.purge(&BTreeMap::from([(NodeId(1), BTreeSet::from([ArcId(11)]))]));
        assert!(!refs.is_referenced(NodeId(1)));
        assert!(refs.is_referenced(NodeId(2)));
    }
}
