//! # Editing Operations
//!
//! Construction of a [`System`] and every mutating operation on it.
//!
//! ## Atomicity
//!
//! Each operation is split into a validation phase that only reads, a single
//! structural call into the labeled graph (which is itself staged), and a
//! bookkeeping phase that cannot fail. Names are reserved last, so a rejected
//! edit never leaks a reservation.

use crate::event::{EventLog, EventSink, SystemEvent};
use crate::labeled::{LabeledGraph, ReferenceRegistry, Update};
use crate::naming::{IdentifierNormalizer, NamingAuthority, TextNormalizer};
use crate::policy::{
    ArcChange, ArcModifier, ConnectivityRealigner, DefaultArcModifier, DefaultNodeModifier,
    NodeChange, NodeModifier, RealignmentProcessor, build_arc_kind,
};
use crate::primitives::DEFAULT_PRIORITY;
use crate::{Arc, ArcId, ArcKind, ArcKindTag, DialnetError, Node, NodeId, NodeKind, Position};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// NETWORK
// =============================================================================

/// A named partition of the design graph.
///
/// Membership of nodes and arcs is derived from the graph; the network itself
/// only tracks which of its nodes are currently `Enter` and `Isolated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Network {
    name: String,
    initials: BTreeSet<NodeId>,
    isolated: BTreeSet<NodeId>,
}

impl Network {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of the network's current `Enter` nodes.
    #[must_use]
    pub fn initials(&self) -> &BTreeSet<NodeId> {
        &self.initials
    }

    /// Ids of the network's current `Isolated` nodes.
    #[must_use]
    pub fn isolated(&self) -> &BTreeSet<NodeId> {
        &self.isolated
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Injects the policies a [`System`] delegates to.
#[derive(Debug)]
pub struct SystemBuilder {
    processor: Box<dyn RealignmentProcessor>,
    node_modifier: Box<dyn NodeModifier>,
    arc_modifier: Box<dyn ArcModifier>,
    normalizer: Box<dyn TextNormalizer>,
    predicate_normalizer: Box<dyn TextNormalizer>,
}

impl Default for SystemBuilder {
    fn default() -> Self {
        Self {
            processor: Box::new(ConnectivityRealigner),
            node_modifier: Box::new(DefaultNodeModifier),
            arc_modifier: Box::new(DefaultArcModifier),
            normalizer: Box::new(IdentifierNormalizer::default()),
            predicate_normalizer: Box::new(IdentifierNormalizer::default()),
        }
    }
}

impl SystemBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn processor(mut self, processor: impl RealignmentProcessor + 'static) -> Self {
        self.processor = Box::new(processor);
        self
    }

    #[must_use]
    pub fn node_modifier(mut self, modifier: impl NodeModifier + 'static) -> Self {
        self.node_modifier = Box::new(modifier);
        self
    }

    #[must_use]
    pub fn arc_modifier(mut self, modifier: impl ArcModifier + 'static) -> Self {
        self.arc_modifier = Box::new(modifier);
        self
    }

    /// Normalizer of the node/arc namespace.
    #[must_use]
    pub fn normalizer(mut self, normalizer: impl TextNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Normalizer of the predicate/variable namespace.
    #[must_use]
    pub fn predicate_normalizer(mut self, normalizer: impl TextNormalizer + 'static) -> Self {
        self.predicate_normalizer = Box::new(normalizer);
        self
    }

    /// Build a system collecting its events in an [`EventLog`].
    #[must_use]
    pub fn build(self) -> System<EventLog> {
        self.build_with_sink(EventLog::new())
    }

    #[must_use]
    pub fn build_with_sink<S: EventSink>(self, sink: S) -> System<S> {
        System {
            names: NamingAuthority::new(self.normalizer),
            predicates: NamingAuthority::new(self.predicate_normalizer),
            graph: LabeledGraph::new(),
            networks: BTreeMap::new(),
            references: ReferenceRegistry::new(),
            processor: self.processor,
            node_modifier: self.node_modifier,
            arc_modifier: self.arc_modifier,
            sink,
        }
    }
}

// =============================================================================
// SYSTEM
// =============================================================================

/// Aggregate root of the editing model.
#[derive(Debug)]
pub struct System<S: EventSink = EventLog> {
    /// Node and arc names.
    pub(super) names: NamingAuthority,
    /// Predicate and variable names.
    pub(super) predicates: NamingAuthority,
    pub(super) graph: LabeledGraph,
    pub(super) networks: BTreeMap<String, Network>,
    pub(super) references: ReferenceRegistry,
    processor: Box<dyn RealignmentProcessor>,
    node_modifier: Box<dyn NodeModifier>,
    arc_modifier: Box<dyn ArcModifier>,
    pub(super) sink: S,
}

impl System<EventLog> {
    /// Create a system with default policies and an in-memory event log.
    #[must_use]
    pub fn new() -> Self {
        SystemBuilder::new().build()
    }
}

impl Default for System<EventLog> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EventSink> System<S> {
    // -------------------------------------------------------------------------
    // Networks
    // -------------------------------------------------------------------------

    /// Create an empty network.
    pub fn add_network(&mut self, name: &str) -> Result<(), DialnetError> {
        if name.is_empty() {
            return Err(DialnetError::InvalidArgument("empty network name".to_string()));
        }
        if self.networks.contains_key(name) {
            return Err(DialnetError::DuplicateIdentifier(name.to_string()));
        }
        self.networks.insert(name.to_string(), Network::new(name));
        tracing::debug!(network = name, "network added");
        self.sink.emit(SystemEvent::NetworkAdded {
            network: name.to_string(),
        });
        Ok(())
    }

    /// Delete a network with all of its nodes and arcs.
    ///
    /// Fails if any of its nodes is targeted by a recursive arc of another
    /// network. References held by the network's own arcs are purged.
    pub fn remove_network(&mut self, name: &str) -> Result<(), DialnetError> {
        let network = self
            .networks
            .get(name)
            .ok_or_else(|| DialnetError::UnknownEntity(name.to_string()))?;

        let members: BTreeSet<NodeId> = self
            .graph
            .nodes()
            .filter(|node| node.network == name)
            .map(|node| node.id)
            .collect();

        for member in &members {
            for referrer in self.references.referrers(*member) {
                let arc = self.graph.arc_by_id(referrer)?;
                if arc.network != name {
                    let target = self.graph.node_by_id(*member)?;
                    tracing::warn!(network = name, arc = %arc.name, "network removal rejected");
                    return Err(DialnetError::ReferentialIntegrityViolation(format!(
                        "enter node '{}' of network '{}' is targeted by arc '{}' of network '{}'",
                        target.name, name, arc.name, arc.network
                    )));
                }
            }
        }
        let initials: Vec<String> = network
            .initials
            .iter()
            .filter_map(|id| self.graph.node_by_id(*id).ok())
            .map(|node| node.name.clone())
            .collect();

        let removed = self.graph.purge_nodes(&members)?;

        let mut events = Vec::new();
        for (node, arcs) in removed {
            for arc in arcs {
                if let Some(target) = arc.kind.recursion_target() {
                    self.references.unregister(target, arc.id);
                }
                self.release_name(&arc.name);
                events.push(SystemEvent::ArcRemoved { arc });
            }
            self.release_name(&node.name);
            events.push(SystemEvent::NodeRemoved { node });
        }
        self.networks.remove(name);

        if !initials.is_empty() {
            events.push(SystemEvent::AvailableReferencesReduced { nodes: initials });
        }
        events.push(SystemEvent::NetworkRemoved {
            network: name.to_string(),
        });
        tracing::debug!(network = name, nodes = members.len(), "network removed");
        self.publish(events);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Nodes
    // -------------------------------------------------------------------------

    /// Add an `Isolated` node to `network`.
    ///
    /// With `name = None` a fresh name is generated. Returns the node's name.
    pub fn add_node(
        &mut self,
        network: &str,
        name: Option<&str>,
        position: Position,
    ) -> Result<String, DialnetError> {
        self.require_network(network)?;
        let position = position.validate()?;
        if let Some(name) = name {
            self.check_fresh_name(name)?;
        }

        let id = self.graph.allocate_node_id();
        let name = self.reserve_name(name)?;
        let node = Node::new(id, name.clone(), network, position);
        let update = match self.graph.insert_node(node.clone()) {
            Ok(update) => update,
            Err(err) => {
                self.release_name(&name);
                return Err(err);
            }
        };

        tracing::debug!(node = %name, network, "node added");
        let mut events = vec![SystemEvent::NodeAdded { node }];
        events.extend(self.apply_update(&update, &[]));
        self.publish(events);
        Ok(name)
    }

    /// Remove a node, its arcs, and realign its neighbors.
    ///
    /// Fails if the node is targeted by a recursive arc that is not itself
    /// removed along with the node.
    pub fn remove_node(&mut self, name: &str) -> Result<(), DialnetError> {
        let node = self.resolve_node(name)?;
        let id = node.id;

        let incident = self.graph.graph().incident(id);
        if let Some(referrer) = self
            .references
            .referrers(id)
            .find(|arc| !incident.contains(arc))
        {
            let arc = self.graph.arc_by_id(referrer)?;
            tracing::warn!(node = name, arc = %arc.name, "node removal rejected");
            return Err(DialnetError::ReferentialIntegrityViolation(format!(
                "node '{}' is targeted by recursive arc '{}'",
                name, arc.name
            )));
        }

        let removal =
            self.graph
                .remove_node_and_realign(id, self.processor.as_ref(), &self.references)?;
        self.references.purge(&removal.update.references_removed);

        let mut events = Vec::new();
        for arc in removal.arcs {
            self.release_name(&arc.name);
            events.push(SystemEvent::ArcRemoved { arc });
        }
        self.release_name(&removal.node.name);
        let departed = [removal.node.clone()];
        events.push(SystemEvent::NodeRemoved { node: removal.node });
        events.extend(self.apply_update(&removal.update, &departed));

        tracing::debug!(node = name, "node removed");
        self.publish(events);
        Ok(())
    }

    /// Change name, position and kind of a node in one step.
    ///
    /// A no-op when nothing differs. Changing the kind of a referenced `Enter`
    /// node is rejected.
    pub fn change_node(
        &mut self,
        name: &str,
        new_name: &str,
        position: Position,
        kind: NodeKind,
    ) -> Result<(), DialnetError> {
        let node = self.resolve_node(name)?.clone();
        let position = position.validate()?;
        if node.name == new_name && node.position == position && node.kind == kind {
            return Ok(());
        }

        let fresh = self.node_modifier.modify(
            &node,
            &NodeChange {
                name: new_name.to_string(),
                position,
                kind,
            },
        );
        if fresh.id != node.id {
            return Err(DialnetError::InvalidArgument(format!(
                "modification changed identity of node '{}'",
                name
            )));
        }
        fresh.position.validate()?;

        if node.kind != fresh.kind {
            if node.is_enter() && self.references.is_referenced(node.id) {
                tracing::warn!(node = name, "retype of referenced enter node rejected");
                return Err(DialnetError::ReferentialIntegrityViolation(format!(
                    "enter node '{}' is targeted by recursive arcs",
                    name
                )));
            }
            let connected = !self.graph.graph().incident(node.id).is_empty();
            if connected == fresh.is_isolated() {
                return Err(DialnetError::IllegalTopology(format!(
                    "node '{}' cannot be {} with {} arcs",
                    name,
                    fresh.kind,
                    if connected { "incident" } else { "no" }
                )));
            }
        }

        let renamed = fresh.name != node.name;
        if renamed {
            self.check_fresh_name(&fresh.name)?;
            self.names.try_use(&[fresh.name.as_str()])?;
        }
        let previous = match self.graph.replace_node(fresh.clone()) {
            Ok(previous) => previous,
            Err(err) => {
                if renamed {
                    self.release_name(&fresh.name);
                }
                return Err(err);
            }
        };
        if renamed {
            self.release_name(&previous.name);
        }

        let mut update = Update::default();
        update.transition(&previous, &fresh);

        let mut events = Vec::new();
        if renamed {
            events.push(SystemEvent::NodeRenamed {
                from: previous.name.clone(),
                to: fresh.name.clone(),
            });
        }
        if previous.position != fresh.position {
            events.push(SystemEvent::NodeMoved {
                node: fresh.name.clone(),
                from: previous.position,
                to: fresh.position,
            });
        }
        events.extend(self.apply_update(&update, std::slice::from_ref(&previous)));
        if renamed && previous.is_enter() && fresh.is_enter() {
            events.push(SystemEvent::AvailableReferencesReduced {
                nodes: vec![previous.name.clone()],
            });
            events.push(SystemEvent::AvailableReferencesExtended {
                nodes: vec![fresh.name.clone()],
            });
        }

        tracing::debug!(node = %fresh.name, "node changed");
        self.publish(events);
        Ok(())
    }

    /// Change only the kind of a node.
    pub fn retype_node(&mut self, name: &str, kind: NodeKind) -> Result<(), DialnetError> {
        let node = self.resolve_node(name)?;
        let position = node.position;
        self.change_node(name, name, position, kind)
    }

    /// Change only the name of a node.
    pub fn rename_node(&mut self, name: &str, new_name: &str) -> Result<(), DialnetError> {
        let node = self.resolve_node(name)?;
        let (position, kind) = (node.position, node.kind);
        self.change_node(name, new_name, position, kind)
    }

    /// Change only the position of a node.
    pub fn move_node(&mut self, name: &str, position: Position) -> Result<(), DialnetError> {
        let kind = self.resolve_node(name)?.kind;
        self.change_node(name, name, position, kind)
    }

    // -------------------------------------------------------------------------
    // Arcs
    // -------------------------------------------------------------------------

    /// Add an `Empty` arc with default priority.
    pub fn add_arc(
        &mut self,
        network: &str,
        name: Option<&str>,
        from: &str,
        to: &str,
    ) -> Result<String, DialnetError> {
        self.add_arc_with(network, name, from, to, DEFAULT_PRIORITY, ArcKind::Empty)
    }

    /// Add an arc of any kind between two nodes of `network`.
    ///
    /// A recursive arc must target an existing `Enter` node, in any network.
    /// Returns the arc's name.
    pub fn add_arc_with(
        &mut self,
        network: &str,
        name: Option<&str>,
        from: &str,
        to: &str,
        priority: i32,
        kind: ArcKind,
    ) -> Result<String, DialnetError> {
        self.require_network(network)?;
        let from_id = self.resolve_node(from)?.id;
        let to_id = self.resolve_node(to)?.id;
        if from_id == to_id {
            return Err(DialnetError::IllegalTopology(format!(
                "arc from '{}' to itself",
                from
            )));
        }
        for endpoint in [from, to] {
            let node = self.resolve_node(endpoint)?;
            if node.network != network {
                return Err(DialnetError::IllegalTopology(format!(
                    "node '{}' does not belong to network '{}'",
                    endpoint, network
                )));
            }
        }
        if let Some(target) = kind.recursion_target() {
            self.require_enter(target)?;
        }
        if let Some(name) = name {
            self.check_fresh_name(name)?;
        }

        let id = self.graph.allocate_arc_id();
        let name = self.reserve_name(name)?;
        let arc = Arc::new(id, name.clone(), network, priority, kind);
        let update = match self.graph.add_arc_and_realign(
            arc.clone(),
            from_id,
            to_id,
            self.processor.as_ref(),
            &self.references,
        ) {
            Ok(update) => update,
            Err(err) => {
                self.release_name(&name);
                return Err(err);
            }
        };
        if let Some(target) = arc.kind.recursion_target() {
            self.references.register(target, id);
        }

        tracing::debug!(arc = %name, network, from, to, "arc added");
        let mut events = vec![SystemEvent::ArcAdded {
            arc,
            from: from.to_string(),
            to: to.to_string(),
        }];
        events.extend(self.apply_update(&update, &[]));
        self.publish(events);
        Ok(name)
    }

    /// Remove an arc and realign its endpoints.
    pub fn remove_arc(&mut self, name: &str) -> Result<(), DialnetError> {
        let id = self.resolve_arc(name)?.id;
        let (arc, update) =
            self.graph
                .remove_arc_and_realign(id, self.processor.as_ref(), &self.references)?;
        self.references.purge(&update.references_removed);
        self.release_name(&arc.name);

        tracing::debug!(arc = name, "arc removed");
        let mut events = vec![SystemEvent::ArcRemoved { arc }];
        events.extend(self.apply_update(&update, &[]));
        self.publish(events);
        Ok(())
    }

    /// Change name, priority and kind of an arc in one step.
    ///
    /// A no-op when nothing differs. The reference registry follows the
    /// arc's old and new recursion targets.
    pub fn change_arc(
        &mut self,
        name: &str,
        new_name: &str,
        priority: i32,
        kind: ArcKind,
    ) -> Result<(), DialnetError> {
        let arc = self.resolve_arc(name)?.clone();
        if arc.name == new_name && arc.priority == priority && arc.kind == kind {
            return Ok(());
        }
        if let Some(target) = kind.recursion_target() {
            self.require_enter(target)?;
        }
        let fresh = self.arc_modifier.modify(
            &arc,
            &ArcChange {
                name: new_name.to_string(),
                priority,
                kind,
            },
        );
        if fresh.id != arc.id {
            return Err(DialnetError::InvalidArgument(format!(
                "modification changed identity of arc '{}'",
                name
            )));
        }
        if let Some(target) = fresh.kind.recursion_target() {
            self.require_enter(target)?;
        }

        let renamed = fresh.name != arc.name;
        if renamed {
            self.check_fresh_name(&fresh.name)?;
            self.names.try_use(&[fresh.name.as_str()])?;
        }
        let previous = match self.graph.replace_arc(fresh.clone()) {
            Ok(previous) => previous,
            Err(err) => {
                if renamed {
                    self.release_name(&fresh.name);
                }
                return Err(err);
            }
        };
        if renamed {
            self.release_name(&previous.name);
        }

        if let Some(target) = previous.kind.recursion_target() {
            self.references.unregister(target, previous.id);
        }
        if let Some(target) = fresh.kind.recursion_target() {
            self.references.register(target, fresh.id);
        }

        tracing::debug!(arc = %fresh.name, kind = %fresh.kind.tag(), "arc changed");
        self.sink.emit(SystemEvent::ArcChanged {
            previous,
            current: fresh,
        });
        Ok(())
    }

    /// Change an arc's kind through the kind factory.
    ///
    /// For a recursive kind the single argument names the target node.
    pub fn change_arc_kind(
        &mut self,
        name: &str,
        tag: ArcKindTag,
        args: &[String],
    ) -> Result<(), DialnetError> {
        let arc = self.resolve_arc(name)?;
        let priority = arc.priority;
        let kind = build_arc_kind(tag, args, |target| {
            self.resolve_node(target).map(|node| node.id)
        })?;
        self.change_arc(name, name, priority, kind)
    }

    // -------------------------------------------------------------------------
    // References
    // -------------------------------------------------------------------------

    /// Record that recursive arc `arc` points at `target`.
    ///
    /// Both must exist, `arc` must be recursive with exactly that target, and
    /// `target` must be an `Enter` node. Registering twice is harmless.
    pub fn register_reference(&mut self, arc: &str, target: &str) -> Result<(), DialnetError> {
        let target_id = self.resolve_node(target)?.id;
        let resolved = self.resolve_arc(arc)?;
        if resolved.kind.recursion_target() != Some(target_id) {
            return Err(DialnetError::InvalidArgument(format!(
                "arc '{}' does not recurse into '{}'",
                arc, target
            )));
        }
        let arc_id = resolved.id;
        self.require_enter(target_id)?;
        self.references.register(target_id, arc_id);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Predicate namespace
    // -------------------------------------------------------------------------

    /// Reserve a predicate or variable name derived from `candidate`.
    pub fn generate_predicate_name(&mut self, candidate: &str) -> String {
        self.predicates.use_name(candidate)
    }

    /// Free a predicate or variable name.
    pub fn release_predicate_name(&mut self, name: &str) -> Result<(), DialnetError> {
        self.predicates.release(name)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    fn require_network(&self, network: &str) -> Result<(), DialnetError> {
        if self.networks.contains_key(network) {
            Ok(())
        } else {
            Err(DialnetError::UnknownEntity(network.to_string()))
        }
    }

    fn require_enter(&self, target: NodeId) -> Result<(), DialnetError> {
        let node = self.graph.node_by_id(target)?;
        if node.is_enter() {
            Ok(())
        } else {
            Err(DialnetError::ReferentialIntegrityViolation(format!(
                "recursion target '{}' is not an enter node",
                node.name
            )))
        }
    }

    pub(super) fn resolve_node(&self, name: &str) -> Result<&Node, DialnetError> {
        if name.is_empty() {
            return Err(DialnetError::InvalidArgument("empty node name".to_string()));
        }
        self.graph
            .node(name)
            .ok_or_else(|| DialnetError::UnknownEntity(name.to_string()))
    }

    pub(super) fn resolve_arc(&self, name: &str) -> Result<&Arc, DialnetError> {
        if name.is_empty() {
            return Err(DialnetError::InvalidArgument("empty arc name".to_string()));
        }
        self.graph
            .arc(name)
            .ok_or_else(|| DialnetError::UnknownEntity(name.to_string()))
    }

    /// Validate an explicit name without reserving it.
    fn check_fresh_name(&self, name: &str) -> Result<(), DialnetError> {
        if name.is_empty() {
            return Err(DialnetError::InvalidArgument("empty name".to_string()));
        }
        if self.names.is_reserved(name) {
            return Err(DialnetError::DuplicateIdentifier(name.to_string()));
        }
        if !self.names.is_usable(name) {
            return Err(DialnetError::NameNotUsable(name.to_string()));
        }
        Ok(())
    }

    fn reserve_name(&mut self, name: Option<&str>) -> Result<String, DialnetError> {
        match name {
            Some(name) => {
                self.names.try_use(&[name])?;
                Ok(name.to_string())
            }
            None => Ok(self.names.generate()),
        }
    }

    fn release_name(&mut self, name: &str) {
        if let Err(err) = self.names.release(name) {
            tracing::warn!(name, %err, "released name was not reserved");
        }
    }

    /// Mirror an update into the networks and build the matching events.
    fn apply_update(&mut self, update: &Update, departed: &[Node]) -> Vec<SystemEvent> {
        let mut events: Vec<SystemEvent> = update
            .realigned
            .iter()
            .map(|(previous, fresh)| SystemEvent::NodeRealigned {
                node: fresh.name.clone(),
                from: previous.kind,
                to: fresh.kind,
            })
            .collect();

        let reduced = self.apply_membership(&update.initials_removed, departed, true, |net, id| {
            net.initials.remove(&id);
        });
        let extended = self.apply_membership(&update.initials_added, departed, false, |net, id| {
            net.initials.insert(id);
        });
        self.apply_membership(&update.isolated_removed, departed, true, |net, id| {
            net.isolated.remove(&id);
        });
        self.apply_membership(&update.isolated_added, departed, false, |net, id| {
            net.isolated.insert(id);
        });

        if !reduced.is_empty() {
            events.push(SystemEvent::AvailableReferencesReduced { nodes: reduced });
        }
        if !extended.is_empty() {
            events.push(SystemEvent::AvailableReferencesExtended { nodes: extended });
        }
        events
    }

    /// Apply `change` to the owning network of each node; returns their names.
    ///
    /// Removals report a node under its `departed` state when one is given,
    /// so a node renamed in the same edit leaves under its old name.
    fn apply_membership(
        &mut self,
        ids: &BTreeSet<NodeId>,
        departed: &[Node],
        removal: bool,
        change: impl Fn(&mut Network, NodeId),
    ) -> Vec<String> {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            let previous = departed.iter().find(|node| node.id == *id);
            let current = self.graph.node_by_id(*id).ok();
            let located = if removal {
                previous.or(current)
            } else {
                current.or(previous)
            }
            .map(|node| (node.name.clone(), node.network.clone()));
            let Some((name, network)) = located else {
                tracing::warn!(node = %id, "update names an unknown node");
                continue;
            };
            if let Some(net) = self.networks.get_mut(&network) {
                change(net, *id);
            }
            names.push(name);
        }
        names
    }

    fn publish(&mut self, events: Vec<SystemEvent>) {
        for event in events {
            self.sink.emit(event);
        }
    }

    // -------------------------------------------------------------------------
    // Consistency
    // -------------------------------------------------------------------------

    /// Verify every model invariant.
    ///
    /// - name indices mirror the arena, arcs stay inside their network
    /// - every node and arc name is reserved, and nothing else is
    /// - the reference registry mirrors the live recursive arcs exactly
    /// - every recursion target is an `Enter` node
    /// - each network's `Enter`/`Isolated` sets match its nodes' kinds
    pub fn check_consistency(&self) -> Result<(), DialnetError> {
        self.graph.check_indices()?;

        let live: BTreeSet<&str> = self
            .graph
            .nodes()
            .map(|node| node.name.as_str())
            .chain(self.graph.arcs().map(|arc| arc.name.as_str()))
            .collect();
        let reserved: BTreeSet<&str> = self.names.reserved().collect();
        if live != reserved {
            return Err(DialnetError::Inconsistent(
                "reserved names differ from live node and arc names".to_string(),
            ));
        }

        let expected: BTreeSet<(NodeId, ArcId)> = self
            .graph
            .arcs()
            .filter_map(|arc| arc.kind.recursion_target().map(|target| (target, arc.id)))
            .collect();
        let registered: BTreeSet<(NodeId, ArcId)> = self.references.entries().collect();
        if expected != registered {
            return Err(DialnetError::Inconsistent(
                "reference registry differs from live recursive arcs".to_string(),
            ));
        }
        for (target, _) in &expected {
            if !self.graph.node_by_id(*target)?.is_enter() {
                return Err(DialnetError::Inconsistent(format!(
                    "recursion target {} is not an enter node",
                    target
                )));
            }
        }

        for node in self.graph.nodes() {
            let network = self.networks.get(&node.network).ok_or_else(|| {
                DialnetError::Inconsistent(format!(
                    "node '{}' belongs to missing network '{}'",
                    node.name, node.network
                ))
            })?;
            if network.initials.contains(&node.id) != node.is_enter()
                || network.isolated.contains(&node.id) != node.is_isolated()
            {
                return Err(DialnetError::Inconsistent(format!(
                    "network '{}' misclassifies node '{}'",
                    network.name, node.name
                )));
            }
        }
        for network in self.networks.values() {
            for id in network.initials.iter().chain(network.isolated.iter()) {
                if self.graph.node_by_id(*id)?.network != network.name {
                    return Err(DialnetError::Inconsistent(format!(
                        "network '{}' lists foreign node {}",
                        network.name, id
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
    use crate::event::TracingSink;

    fn linear() -> System {
        linear_with(SystemBuilder::new())
    }

    fn linear_with(builder: SystemBuilder) -> System {
        let mut system = builder.build();
        system.add_network("main").expect("network");
        for (name, x) in [("a", 0), ("b", 10), ("c", 20)] {
            system
                .add_node("main", Some(name), Position::new(x, 0))
                .expect("node");
        }
        system.add_arc("main", Some("ab"), "a", "b").expect("ab");
        system.add_arc("main", Some("bc"), "b", "c").expect("bc");
        system
    }

    fn kind(system: &System, name: &str) -> Option<NodeKind> {
        system.node(name).map(|node| node.kind)
    }

    #[test]
    fn add_node_generates_and_validates_names() {
        let mut system = System::new();
        system.add_network("main").expect("network");

        let generated = system
            .add_node("main", None, Position::default())
            .expect("generated");
        assert_eq!(generated, "1");
        assert!(system.names().is_reserved("1"));

        assert!(matches!(
            system.add_node("main", Some("1"), Position::default()),
            Err(DialnetError::DuplicateIdentifier(_))
        ));
        assert!(matches!(
            system.add_node("main", Some("not usable"), Position::default()),
            Err(DialnetError::NameNotUsable(_))
        ));
        assert!(matches!(
            system.add_node("main", Some(""), Position::default()),
            Err(DialnetError::InvalidArgument(_))
        ));
        assert!(matches!(
            system.add_node("main", Some("x"), Position::new(-1, 0)),
            Err(DialnetError::InvalidArgument(_))
        ));
        assert!(matches!(
            system.add_node("nowhere", Some("x"), Position::default()),
            Err(DialnetError::UnknownEntity(_))
        ));
        assert!(!system.names().is_reserved("x"));
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn arcs_realign_endpoints() {
        let system = linear();
        assert_eq!(kind(&system, "a"), Some(NodeKind::Enter));
        assert_eq!(kind(&system, "b"), Some(NodeKind::Inner));
        assert_eq!(kind(&system, "c"), Some(NodeKind::Inner));
        let initials = system.network("main").expect("main").initials().clone();
        assert_eq!(initials.len(), 1);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn self_loop_and_foreign_endpoint_rejected() {
        let mut system = linear();
        assert!(matches!(
            system.add_arc("main", None, "a", "a"),
            Err(DialnetError::IllegalTopology(_))
        ));

        system.add_network("other").expect("network");
        system
            .add_node("other", Some("z"), Position::default())
            .expect("z");
        assert!(matches!(
            system.add_arc("main", None, "a", "z"),
            Err(DialnetError::IllegalTopology(_))
        ));
        assert_eq!(system.graph().edge_count(), 2);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn remove_node_releases_names_and_emits_events() {
        let mut system = linear();
        system.sink_mut().drain();

        system.remove_node("b").expect("remove");

        assert!(system.node("b").is_none());
        assert!(system.arc("ab").is_none());
        assert!(!system.names().is_reserved("b"));
        assert!(!system.names().is_reserved("bc"));
        assert_eq!(kind(&system, "a"), Some(NodeKind::Isolated));
        assert_eq!(kind(&system, "c"), Some(NodeKind::Isolated));

        let labels: Vec<&str> = system
            .sink()
            .events()
            .iter()
            .map(SystemEvent::label)
            .collect();
        assert_eq!(
            labels,
            vec![
                "arc_removed",
                "arc_removed",
                "node_removed",
                "node_realigned",
                "node_realigned",
                "available_references_reduced",
            ]
        );
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn rename_keeps_references_valid() {
        let mut system = linear();
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("p"), Position::default()).expect("p");
        system.add_node("caller", Some("q"), Position::default()).expect("q");
        let target = system.node("a").map(|n| n.id).expect("a");
        system
            .add_arc_with("caller", Some("call"), "p", "q", 0, ArcKind::Recursive { target })
            .expect("call");

        system.rename_node("a", "greeting").expect("rename");

        assert!(system.node("a").is_none());
        assert!(system.names().is_reserved("greeting"));
        assert!(!system.names().is_reserved("a"));
        assert_eq!(system.referrers("greeting").expect("refs"), vec!["call"]);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn retype_of_referenced_enter_rejected() {
        let mut system = linear();
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("p"), Position::default()).expect("p");
        system.add_node("caller", Some("q"), Position::default()).expect("q");
        let target = system.node("a").map(|n| n.id).expect("a");
        system
            .add_arc_with("caller", Some("call"), "p", "q", 0, ArcKind::Recursive { target })
            .expect("call");
        let events = system.sink().len();

        assert!(matches!(
            system.retype_node("a", NodeKind::Inner),
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        assert_eq!(kind(&system, "a"), Some(NodeKind::Enter));
        assert_eq!(system.sink().len(), events);
    }

    #[test]
    fn retype_respects_connectivity() {
        let mut system = linear();
        assert!(matches!(
            system.retype_node("b", NodeKind::Isolated),
            Err(DialnetError::IllegalTopology(_))
        ));

        system.retype_node("c", NodeKind::Exit).expect("exit");
        assert_eq!(kind(&system, "c"), Some(NodeKind::Exit));

        system.add_node("main", Some("d"), Position::default()).expect("d");
        assert!(matches!(
            system.retype_node("d", NodeKind::Enter),
            Err(DialnetError::IllegalTopology(_))
        ));
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn unchanged_node_is_noop() {
        let mut system = linear();
        let events = system.sink().len();
        system.move_node("a", Position::new(0, 0)).expect("noop");
        assert_eq!(system.sink().len(), events);

        system.move_node("a", Position::new(5, 5)).expect("move");
        assert_eq!(
            system.sink().events().last().map(SystemEvent::label),
            Some("node_moved")
        );
    }

    #[test]
    fn recursive_arc_needs_enter_target() {
        let mut system = linear();
        let inner = system.node("b").map(|n| n.id).expect("b");
        assert!(matches!(
            system.add_arc_with("main", None, "a", "c", 0, ArcKind::Recursive { target: inner }),
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn change_arc_kind_moves_reference() {
        let mut system = linear();
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("p"), Position::default()).expect("p");
        system.add_node("caller", Some("q"), Position::default()).expect("q");
        system.add_arc("caller", Some("call"), "p", "q").expect("call");

        system
            .change_arc_kind("call", ArcKindTag::Recursive, &["a".to_string()])
            .expect("recursive");
        assert_eq!(system.referrers("a").expect("refs"), vec!["call"]);

        system
            .change_arc_kind("call", ArcKindTag::Pattern, &["hello*".to_string()])
            .expect("pattern");
        assert!(system.referrers("a").expect("refs").is_empty());

        assert!(matches!(
            system.change_arc_kind("call", ArcKindTag::Code, &[]),
            Err(DialnetError::InvalidArgument(_))
        ));
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn remove_network_guards_foreign_references() {
        let mut system = linear();
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("p"), Position::default()).expect("p");
        system.add_node("caller", Some("q"), Position::default()).expect("q");
        let target = system.node("a").map(|n| n.id).expect("a");
        system
            .add_arc_with("caller", Some("call"), "p", "q", 0, ArcKind::Recursive { target })
            .expect("call");

        assert!(matches!(
            system.remove_network("main"),
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        assert!(system.node("a").is_some());

        system.remove_network("caller").expect("remove caller");
        assert!(system.referrers("a").expect("refs").is_empty());
        system.remove_network("main").expect("remove main");
        assert_eq!(system.names().reserved().count(), 0);
        system.check_consistency().expect("consistent");
    }

    #[derive(Debug)]
    struct KeepKinds;

    impl RealignmentProcessor for KeepKinds {
        fn realign(&self, _: &dyn crate::policy::Topology, node: &Node) -> Node {
            node.clone()
        }
    }

    #[derive(Debug)]
    struct Rekey;

    impl NodeModifier for Rekey {
        fn modify(&self, node: &Node, change: &NodeChange) -> Node {
            Node {
                id: NodeId(node.id.0 + 1000),
                ..DefaultNodeModifier.modify(node, change)
            }
        }
    }

    #[test]
    fn builder_injects_policies() {
        let mut system = SystemBuilder::new()
            .processor(KeepKinds)
            .node_modifier(Rekey)
            .build();
        system.add_network("main").expect("network");
        system.add_node("main", Some("a"), Position::default()).expect("a");
        system.add_node("main", Some("b"), Position::default()).expect("b");
        system.add_arc("main", Some("ab"), "a", "b").expect("ab");
        assert_eq!(kind(&system, "a"), Some(NodeKind::Isolated));

        assert!(matches!(
            system.move_node("a", Position::new(1, 1)),
            Err(DialnetError::InvalidArgument(_))
        ));
        assert_eq!(system.node("a").map(|n| n.position), Some(Position::default()));
    }

    fn with_caller(system: &mut System) {
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("p"), Position::default()).expect("p");
        system.add_node("caller", Some("q"), Position::default()).expect("q");
        let target = system.node("a").map(|n| n.id).expect("a");
        system
            .add_arc_with("caller", Some("call"), "p", "q", 0, ArcKind::Recursive { target })
            .expect("call");
    }

    #[derive(Debug)]
    struct Shout;

    impl NodeModifier for Shout {
        fn modify(&self, node: &Node, change: &NodeChange) -> Node {
            let mut fresh = DefaultNodeModifier.modify(node, change);
            fresh.name.push('!');
            fresh
        }
    }

    impl ArcModifier for Shout {
        fn modify(&self, arc: &Arc, change: &ArcChange) -> Arc {
            let mut fresh = DefaultArcModifier.modify(arc, change);
            fresh.name.push('!');
            fresh
        }
    }

    #[test]
    fn modified_node_name_validated_before_commit() {
        let mut system = linear_with(SystemBuilder::new().node_modifier(Shout));
        let events = system.sink().len();

        assert!(matches!(
            system.rename_node("a", "b2"),
            Err(DialnetError::NameNotUsable(_))
        ));
        assert!(system.node("a").is_some());
        assert!(system.node("b2!").is_none());
        assert!(system.names().is_reserved("a"));
        assert!(!system.names().is_reserved("b2!"));
        assert_eq!(system.sink().len(), events);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn modified_arc_name_validated_before_commit() {
        let mut system = linear_with(SystemBuilder::new().arc_modifier(Shout));
        with_caller(&mut system);
        let target = system.node("a").map(|n| n.id).expect("a");
        let events = system.sink().len();

        assert!(matches!(
            system.change_arc("call", "dial", 3, ArcKind::Recursive { target }),
            Err(DialnetError::NameNotUsable(_))
        ));
        let call = system.arc("call").expect("call");
        assert_eq!(call.priority, 0);
        assert!(system.arc("dial!").is_none());
        assert_eq!(system.referrers("a").expect("refs"), vec!["call"]);
        assert_eq!(system.sink().len(), events);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn rename_with_retype_reduces_under_old_name() {
        let mut system = linear();
        system.sink_mut().drain();

        system
            .change_node("a", "z", Position::new(0, 0), NodeKind::Inner)
            .expect("change");

        assert_eq!(
            system.sink().events(),
            &[
                SystemEvent::NodeRenamed {
                    from: "a".to_string(),
                    to: "z".to_string(),
                },
                SystemEvent::NodeRealigned {
                    node: "z".to_string(),
                    from: NodeKind::Enter,
                    to: NodeKind::Inner,
                },
                SystemEvent::AvailableReferencesReduced {
                    nodes: vec!["a".to_string()],
                },
            ]
        );
        assert!(system.initial_nodes("main").expect("main").is_empty());
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn add_arc_promotes_and_extends_references() {
        let mut system = System::new();
        system.add_network("main").expect("network");
        system.add_node("main", Some("a"), Position::default()).expect("a");
        system.add_node("main", Some("b"), Position::default()).expect("b");
        system.sink_mut().drain();

        system.add_arc("main", Some("ab"), "a", "b").expect("ab");

        let arc = system.arc("ab").cloned().expect("ab");
        assert_eq!(
            system.sink().events(),
            &[
                SystemEvent::ArcAdded {
                    arc,
                    from: "a".to_string(),
                    to: "b".to_string(),
                },
                SystemEvent::NodeRealigned {
                    node: "a".to_string(),
                    from: NodeKind::Isolated,
                    to: NodeKind::Enter,
                },
                SystemEvent::NodeRealigned {
                    node: "b".to_string(),
                    from: NodeKind::Isolated,
                    to: NodeKind::Inner,
                },
                SystemEvent::AvailableReferencesExtended {
                    nodes: vec!["a".to_string()],
                },
            ]
        );
    }

    #[test]
    fn rename_of_referenced_enter_swaps_available_name() {
        let mut system = linear();
        with_caller(&mut system);
        system.sink_mut().drain();

        system.rename_node("a", "greeting").expect("rename");

        assert_eq!(
            system.sink().events(),
            &[
                SystemEvent::NodeRenamed {
                    from: "a".to_string(),
                    to: "greeting".to_string(),
                },
                SystemEvent::AvailableReferencesReduced {
                    nodes: vec!["a".to_string()],
                },
                SystemEvent::AvailableReferencesExtended {
                    nodes: vec!["greeting".to_string()],
                },
            ]
        );
    }

    #[test]
    fn register_reference_checks_arc_and_target() {
        let mut system = linear();
        with_caller(&mut system);

        system.register_reference("call", "a").expect("register");
        assert_eq!(system.referrers("a").expect("refs"), vec!["call"]);
        system.check_consistency().expect("consistent");

        assert!(matches!(
            system.register_reference("call", "c"),
            Err(DialnetError::InvalidArgument(_))
        ));
        assert!(matches!(
            system.register_reference("ab", "a"),
            Err(DialnetError::InvalidArgument(_))
        ));
        assert!(matches!(
            system.register_reference("call", "ghost"),
            Err(DialnetError::UnknownEntity(_))
        ));

        // Drop the entry so the target can be demoted, then try to restore it.
        let (a, call) = (
            system.node("a").map(|n| n.id).expect("a"),
            system.arc("call").map(|arc| arc.id).expect("call"),
        );
        assert!(system.references.unregister(a, call));
        system.retype_node("a", NodeKind::Inner).expect("demote");
        assert!(matches!(
            system.register_reference("call", "a"),
            Err(DialnetError::ReferentialIntegrityViolation(_))
        ));
        assert!(system.referrers("a").expect("refs").is_empty());
    }

    #[test]
    fn tracing_sink_system_edits() {
        let mut system = SystemBuilder::new().build_with_sink(TracingSink);
        system.add_network("main").expect("network");
        system.add_node("main", Some("a"), Position::default()).expect("a");
        system.add_node("main", Some("b"), Position::default()).expect("b");
        system.add_arc("main", Some("ab"), "a", "b").expect("ab");

        assert_eq!(system.initial_nodes("main").expect("main").len(), 1);
        system.check_consistency().expect("consistent");
    }

    #[test]
    fn predicate_namespace_is_separate() {
        let mut system = linear();
        assert_eq!(system.generate_predicate_name("a"), "a");
        assert!(system.predicates().is_reserved("a"));
        system.release_predicate_name("a").expect("release");
        assert!(matches!(
            system.release_predicate_name("a"),
            Err(DialnetError::NotReserved(_))
        ));
    }
}
