//! # Graph Core
//!
//! Generic directed multigraph storage for the dialnet model.
//!
//! Vertices and edges live in arenas keyed by their stable keys. Every edge
//! owns one [`Joint`] recording its endpoints, kept apart from the edge value
//! so that an edge can be swapped for a different value without touching
//! connection bookkeeping.
//!
//! All data structures use `BTreeMap`/`BTreeSet`, so every iteration order is
//! ascending by key and therefore deterministic.
//!
//! ## Staged Extraction
//!
//! [`Graph::extract_vertex`] removes a vertex transactionally. The removal is
//! first expressed as a [`Staging`] overlay (the vertex and its joints are
//! detached in the overlay only), the validation callbacks run against it,
//! and the arenas are touched only once every callback has succeeded. A
//! failing callback therefore leaves the graph exactly as it was.

use crate::DialnetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};
use thiserror::Error;

// =============================================================================
// KEYED TRAIT
// =============================================================================

/// A value stored in a [`Graph`] arena under a stable key.
pub trait Keyed {
    type Key: Ord + Copy + Debug + Display;

    fn key(&self) -> Self::Key;
}

// =============================================================================
// JOINT
// =============================================================================

/// Endpoint record of one edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Joint<K> {
    pub start: K,
    pub end: K,
}

impl<K: Copy + PartialEq> Joint<K> {
    #[must_use]
    pub const fn new(start: K, end: K) -> Self {
        Self { start, end }
    }

    /// The endpoint opposite to `vertex`, if `vertex` is an endpoint.
    #[must_use]
    pub fn opposite(&self, vertex: K) -> Option<K> {
        if self.start == vertex {
            Some(self.end)
        } else if self.end == vertex {
            Some(self.start)
        } else {
            None
        }
    }

    fn touches(&self, vertex: K) -> bool {
        self.start == vertex || self.end == vertex
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Structural errors raised by the graph core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Duplicate vertex: {0}")]
    DuplicateVertex(String),

    #[error("Unknown vertex: {0}")]
    UnknownVertex(String),

    #[error("Self-loop on vertex: {0}")]
    SelfLoop(String),

    #[error("Duplicate edge: {0}")]
    DuplicateEdge(String),

    #[error("Unknown edge: {0}")]
    UnknownEdge(String),

    /// A repair callback returned a value under a different key.
    #[error("Replacement changed key: {0}")]
    KeyMismatch(String),
}

fn describe<K: Display>(key: K) -> String {
    key.to_string()
}

impl From<GraphError> for DialnetError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DuplicateVertex(key) | GraphError::DuplicateEdge(key) => {
                DialnetError::DuplicateIdentifier(key)
            }
            GraphError::UnknownVertex(key) | GraphError::UnknownEdge(key) => {
                DialnetError::UnknownEntity(key)
            }
            GraphError::SelfLoop(key) => {
                DialnetError::IllegalTopology(format!("self-loop on {}", key))
            }
            GraphError::KeyMismatch(key) => {
                DialnetError::InvalidArgument(format!("replacement changed identity of {}", key))
            }
        }
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// Directed multigraph with stable-key arenas.
///
/// Every live vertex has an (possibly empty) entry in both `ins` and `outs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph<V: Keyed, E: Keyed> {
    vertices: BTreeMap<V::Key, V>,
    edges: BTreeMap<E::Key, E>,
    joints: BTreeMap<E::Key, Joint<V::Key>>,
    outs: BTreeMap<V::Key, BTreeSet<E::Key>>,
    ins: BTreeMap<V::Key, BTreeSet<E::Key>>,
}

impl<V: Keyed, E: Keyed> Default for Graph<V, E> {
    fn default() -> Self {
        Self {
            vertices: BTreeMap::new(),
            edges: BTreeMap::new(),
            joints: BTreeMap::new(),
            outs: BTreeMap::new(),
            ins: BTreeMap::new(),
        }
    }
}

/// Outcome of a committed [`Graph::extract_vertex`].
#[derive(Debug, Clone)]
pub struct Extraction<V: Keyed, E: Keyed> {
    /// The removed vertex.
    pub vertex: V,
    /// Every incident edge that was removed with it, in key order.
    pub edges: Vec<(E, Joint<V::Key>)>,
    /// `(previous, replacement)` for every neighbor that was repaired.
    pub repaired: Vec<(V, V)>,
}

impl<V: Keyed, E: Keyed> Graph<V, E> {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Register a new vertex.
    pub fn add_vertex(&mut self, vertex: V) -> Result<(), GraphError> {
        let key = vertex.key();
        if self.vertices.contains_key(&key) {
            return Err(GraphError::DuplicateVertex(describe(key)));
        }
        self.vertices.insert(key, vertex);
        self.outs.insert(key, BTreeSet::new());
        self.ins.insert(key, BTreeSet::new());
        Ok(())
    }

    /// Register an edge between two existing, distinct vertices.
    pub fn add_edge(&mut self, edge: E, from: V::Key, to: V::Key) -> Result<(), GraphError> {
        for endpoint in [from, to] {
            if !self.vertices.contains_key(&endpoint) {
                return Err(GraphError::UnknownVertex(describe(endpoint)));
            }
        }
        if from == to {
            return Err(GraphError::SelfLoop(describe(from)));
        }
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return Err(GraphError::DuplicateEdge(describe(key)));
        }

        self.edges.insert(key, edge);
        self.joints.insert(key, Joint::new(from, to));
        self.outs.entry(from).or_default().insert(key);
        self.ins.entry(to).or_default().insert(key);
        Ok(())
    }

    /// Delete an edge and its joint.
    pub fn remove_edge(&mut self, edge: E::Key) -> Result<(E, Joint<V::Key>), GraphError> {
        let value = self
            .edges
            .remove(&edge)
            .ok_or_else(|| GraphError::UnknownEdge(describe(edge)))?;
        let joint = self
            .joints
            .remove(&edge)
            .ok_or_else(|| GraphError::UnknownEdge(describe(edge)))?;
        if let Some(set) = self.outs.get_mut(&joint.start) {
            set.remove(&edge);
        }
        if let Some(set) = self.ins.get_mut(&joint.end) {
            set.remove(&edge);
        }
        Ok((value, joint))
    }

    /// Delete a vertex and every incident edge, without validation.
    ///
    /// Callers must have checked their own invariants beforehand.
    pub fn remove_vertex(
        &mut self,
        vertex: V::Key,
    ) -> Result<(V, Vec<(E, Joint<V::Key>)>), GraphError> {
        if !self.vertices.contains_key(&vertex) {
            return Err(GraphError::UnknownVertex(describe(vertex)));
        }
        let mut removed = Vec::new();
        for edge in self.incident(vertex) {
            removed.push(self.remove_edge(edge)?);
        }
        self.outs.remove(&vertex);
        self.ins.remove(&vertex);
        let value = self
            .vertices
            .remove(&vertex)
            .ok_or_else(|| GraphError::UnknownVertex(describe(vertex)))?;
        Ok((value, removed))
    }

    /// Remove a vertex after validating the change through callbacks.
    ///
    /// 1. `on_connection` runs once per incident edge, in key order.
    /// 2. `on_neighbor` runs once per neighbor, in key order, seeing the graph
    ///    with the vertex already detached.
    /// 3. If either callback fails nothing has been mutated and the error is
    ///    returned as is.
    /// 4. Otherwise the vertex and its edges are removed and every neighbor is
    ///    replaced by `repair(neighbor)`, even when the result is unchanged.
    ///
    /// `repair` must keep the neighbor's key.
    pub fn extract_vertex<Err, R, N, C>(
        &mut self,
        vertex: V::Key,
        mut repair: R,
        mut on_neighbor: N,
        mut on_connection: C,
    ) -> Result<Extraction<V, E>, Err>
    where
        V: Clone,
        Err: From<GraphError>,
        R: FnMut(&Staging<'_, V, E>, &V) -> V,
        N: FnMut(&Staging<'_, V, E>, &V) -> Result<(), Err>,
        C: FnMut(&E, Joint<V::Key>) -> Result<(), Err>,
    {
        let replacements = {
            let staging = self.stage().without_vertex(vertex)?;

            for &edge in staging.severed_edges() {
                let (value, joint) = self.edge_with_joint(edge)?;
                on_connection(value, joint)?;
            }

            let neighbors = self.neighbor_values(vertex)?;
            for neighbor in neighbors.iter().copied() {
                on_neighbor(&staging, neighbor)?;
            }

            let mut replacements = Vec::with_capacity(neighbors.len());
            for neighbor in neighbors {
                let fresh = repair(&staging, neighbor);
                if fresh.key() != neighbor.key() {
                    return Err(GraphError::KeyMismatch(describe(neighbor.key())).into());
                }
                replacements.push(fresh);
            }
            replacements
        };

        let (removed, edges) = self.remove_vertex(vertex)?;
        let mut repaired = Vec::with_capacity(replacements.len());
        for fresh in replacements {
            let previous = self.replace_vertex(fresh.key(), fresh.clone())?;
            repaired.push((previous, fresh));
        }

        Ok(Extraction {
            vertex: removed,
            edges,
            repaired,
        })
    }

    /// Swap the vertex stored under `old` for `fresh`, keeping all connections.
    ///
    /// When the keys differ, the connection sets and the joints of every
    /// incident edge are re-keyed (O(degree)). Returns the previous value.
    pub fn replace_vertex(&mut self, old: V::Key, fresh: V) -> Result<V, GraphError> {
        if !self.vertices.contains_key(&old) {
            return Err(GraphError::UnknownVertex(describe(old)));
        }
        let new_key = fresh.key();
        if new_key == old {
            return self
                .vertices
                .insert(old, fresh)
                .ok_or_else(|| GraphError::UnknownVertex(describe(old)));
        }
        if self.vertices.contains_key(&new_key) {
            return Err(GraphError::DuplicateVertex(describe(new_key)));
        }

        let outs = self.outs.remove(&old).unwrap_or_default();
        let ins = self.ins.remove(&old).unwrap_or_default();
        for edge in outs.iter().chain(ins.iter()) {
            if let Some(joint) = self.joints.get_mut(edge) {
                if joint.start == old {
                    joint.start = new_key;
                }
                if joint.end == old {
                    joint.end = new_key;
                }
            }
        }
        self.outs.insert(new_key, outs);
        self.ins.insert(new_key, ins);
        self.vertices.insert(new_key, fresh);
        self.vertices
            .remove(&old)
            .ok_or_else(|| GraphError::UnknownVertex(describe(old)))
    }

    /// Swap the edge stored under `old` for `fresh`, keeping its joint.
    ///
    /// Returns the previous value.
    pub fn replace_edge(&mut self, old: E::Key, fresh: E) -> Result<E, GraphError> {
        if !self.edges.contains_key(&old) {
            return Err(GraphError::UnknownEdge(describe(old)));
        }
        let new_key = fresh.key();
        if new_key == old {
            return self
                .edges
                .insert(old, fresh)
                .ok_or_else(|| GraphError::UnknownEdge(describe(old)));
        }
        if self.edges.contains_key(&new_key) {
            return Err(GraphError::DuplicateEdge(describe(new_key)));
        }

        let joint = self
            .joints
            .remove(&old)
            .ok_or_else(|| GraphError::UnknownEdge(describe(old)))?;
        if let Some(set) = self.outs.get_mut(&joint.start) {
            set.remove(&old);
            set.insert(new_key);
        }
        if let Some(set) = self.ins.get_mut(&joint.end) {
            set.remove(&old);
            set.insert(new_key);
        }
        self.joints.insert(new_key, joint);
        self.edges.insert(new_key, fresh);
        self.edges
            .remove(&old)
            .ok_or_else(|| GraphError::UnknownEdge(describe(old)))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Begin a staged change over this graph.
    #[must_use]
    pub fn stage(&self) -> Staging<'_, V, E> {
        Staging {
            graph: self,
            removed_vertices: BTreeSet::new(),
            removed_edges: BTreeSet::new(),
            added: Vec::new(),
        }
    }

    #[must_use]
    pub fn vertex(&self, key: V::Key) -> Option<&V> {
        self.vertices.get(&key)
    }

    #[must_use]
    pub fn edge(&self, key: E::Key) -> Option<&E> {
        self.edges.get(&key)
    }

    #[must_use]
    pub fn joint(&self, key: E::Key) -> Option<Joint<V::Key>> {
        self.joints.get(&key).copied()
    }

    #[must_use]
    pub fn contains_vertex(&self, key: V::Key) -> bool {
        self.vertices.contains_key(&key)
    }

    #[must_use]
    pub fn contains_edge(&self, key: E::Key) -> bool {
        self.edges.contains_key(&key)
    }

    /// All vertices in key order.
    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.vertices.values()
    }

    /// All edges with their joints, in key order.
    pub fn edges(&self) -> impl Iterator<Item = (&E, Joint<V::Key>)> {
        self.edges
            .iter()
            .filter_map(|(key, edge)| self.joints.get(key).map(|joint| (edge, *joint)))
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges ending at `vertex`, in key order.
    pub fn ins(&self, vertex: V::Key) -> impl Iterator<Item = &E> {
        self.ins
            .get(&vertex)
            .into_iter()
            .flatten()
            .filter_map(|key| self.edges.get(key))
    }

    /// Edges starting at `vertex`, in key order.
    pub fn outs(&self, vertex: V::Key) -> impl Iterator<Item = &E> {
        self.outs
            .get(&vertex)
            .into_iter()
            .flatten()
            .filter_map(|key| self.edges.get(key))
    }

    #[must_use]
    pub fn in_degree(&self, vertex: V::Key) -> usize {
        self.ins.get(&vertex).map_or(0, BTreeSet::len)
    }

    #[must_use]
    pub fn out_degree(&self, vertex: V::Key) -> usize {
        self.outs.get(&vertex).map_or(0, BTreeSet::len)
    }

    /// Keys of every edge touching `vertex`.
    #[must_use]
    pub fn incident(&self, vertex: V::Key) -> BTreeSet<E::Key> {
        let mut edges = BTreeSet::new();
        if let Some(set) = self.outs.get(&vertex) {
            edges.extend(set.iter().copied());
        }
        if let Some(set) = self.ins.get(&vertex) {
            edges.extend(set.iter().copied());
        }
        edges
    }

    /// Keys of every vertex sharing an edge with `vertex`.
    #[must_use]
    pub fn neighbors(&self, vertex: V::Key) -> BTreeSet<V::Key> {
        self.incident(vertex)
            .into_iter()
            .filter_map(|edge| self.joints.get(&edge))
            .filter_map(|joint| joint.opposite(vertex))
            .collect()
    }

    fn neighbor_values(&self, vertex: V::Key) -> Result<Vec<&V>, GraphError> {
        self.neighbors(vertex)
            .into_iter()
            .map(|key| {
                self.vertices
                    .get(&key)
                    .ok_or_else(|| GraphError::UnknownVertex(describe(key)))
            })
            .collect()
    }

    fn edge_with_joint(&self, edge: E::Key) -> Result<(&E, Joint<V::Key>), GraphError> {
        match (self.edges.get(&edge), self.joints.get(&edge)) {
            (Some(value), Some(joint)) => Ok((value, *joint)),
            _ => Err(GraphError::UnknownEdge(describe(edge))),
        }
    }
}

// =============================================================================
// STAGING
// =============================================================================

/// A read-only overlay describing a pending change to a [`Graph`].
///
/// The overlay never mutates the graph; it answers connectivity questions as
/// if the staged removals and additions had been applied.
#[derive(Debug, Clone)]
pub struct Staging<'g, V: Keyed, E: Keyed> {
    graph: &'g Graph<V, E>,
    removed_vertices: BTreeSet<V::Key>,
    removed_edges: BTreeSet<E::Key>,
    added: Vec<Joint<V::Key>>,
}

impl<'g, V: Keyed, E: Keyed> Staging<'g, V, E> {
    /// Stage the removal of a vertex together with its incident edges.
    pub fn without_vertex(mut self, vertex: V::Key) -> Result<Self, GraphError> {
        if !self.graph.contains_vertex(vertex) {
            return Err(GraphError::UnknownVertex(describe(vertex)));
        }
        self.removed_edges.extend(self.graph.incident(vertex));
        self.added.retain(|joint| !joint.touches(vertex));
        self.removed_vertices.insert(vertex);
        Ok(self)
    }

    /// Stage the removal of one edge.
    pub fn without_edge(mut self, edge: E::Key) -> Result<Self, GraphError> {
        if !self.graph.contains_edge(edge) {
            return Err(GraphError::UnknownEdge(describe(edge)));
        }
        self.removed_edges.insert(edge);
        Ok(self)
    }

    /// Stage a new connection between two live vertices.
    pub fn with_joint(mut self, from: V::Key, to: V::Key) -> Result<Self, GraphError> {
        for endpoint in [from, to] {
            if !self.contains_vertex(endpoint) {
                return Err(GraphError::UnknownVertex(describe(endpoint)));
            }
        }
        if from == to {
            return Err(GraphError::SelfLoop(describe(from)));
        }
        self.added.push(Joint::new(from, to));
        Ok(self)
    }

    /// The graph this overlay was staged on.
    #[must_use]
    pub fn base(&self) -> &'g Graph<V, E> {
        self.graph
    }

    #[must_use]
    pub fn contains_vertex(&self, vertex: V::Key) -> bool {
        self.graph.contains_vertex(vertex) && !self.removed_vertices.contains(&vertex)
    }

    /// Whether the staged change removes `edge`.
    #[must_use]
    pub fn is_severed(&self, edge: E::Key) -> bool {
        self.removed_edges.contains(&edge)
    }

    /// Every edge the staged change removes, in key order.
    #[must_use]
    pub fn severed_edges(&self) -> &BTreeSet<E::Key> {
        &self.removed_edges
    }

    #[must_use]
    pub fn in_degree(&self, vertex: V::Key) -> usize {
        if !self.contains_vertex(vertex) {
            return 0;
        }
        let kept = self
            .graph
            .ins
            .get(&vertex)
            .map_or(0, |set| set.iter().filter(|e| !self.is_severed(**e)).count());
        kept + self.added.iter().filter(|j| j.end == vertex).count()
    }

    #[must_use]
    pub fn out_degree(&self, vertex: V::Key) -> usize {
        if !self.contains_vertex(vertex) {
            return 0;
        }
        let kept = self
            .graph
            .outs
            .get(&vertex)
            .map_or(0, |set| set.iter().filter(|e| !self.is_severed(**e)).count());
        kept + self.added.iter().filter(|j| j.start == vertex).count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
