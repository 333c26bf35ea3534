//! # Queries
//!
//! Read-only access to the model. Every list is returned in a stable order:
//! networks and names lexically, nodes and arcs by id.

use super::{Network, System};
use crate::event::EventSink;
use crate::graph::Graph;
use crate::labeled::LabeledGraph;
use crate::naming::NamingAuthority;
use crate::{Arc, DialnetError, Direction, Node};

impl<S: EventSink> System<S> {
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.graph.node(name)
    }

    #[must_use]
    pub fn arc(&self, name: &str) -> Option<&Arc> {
        self.graph.arc(name)
    }

    /// Arcs ending at `node`.
    pub fn ins(&self, node: &str) -> Result<Vec<&Arc>, DialnetError> {
        self.connections(node, Direction::In)
    }

    /// Arcs leaving `node`.
    pub fn outs(&self, node: &str) -> Result<Vec<&Arc>, DialnetError> {
        self.connections(node, Direction::Out)
    }

    pub fn connections(&self, node: &str, direction: Direction) -> Result<Vec<&Arc>, DialnetError> {
        let id = self.resolve_node(node)?.id;
        Ok(self.graph.connections(id, direction))
    }

    /// The node `arc` leaves (`Out`) or enters (`In`).
    pub fn attached(&self, arc: &str, direction: Direction) -> Result<&Node, DialnetError> {
        let id = self.resolve_arc(arc)?.id;
        self.graph
            .attached(id, direction)
            .ok_or_else(|| DialnetError::Inconsistent(format!("arc '{}' has no joint", arc)))
    }

    /// Every `Enter` node of every network, i.e. the legal recursion targets.
    pub fn available_references(&self) -> Vec<&Node> {
        self.networks
            .values()
            .flat_map(|network| network.initials().iter())
            .filter_map(|id| self.graph.node_by_id(*id).ok())
            .collect()
    }

    /// The `Enter` nodes of one network.
    pub fn initial_nodes(&self, network: &str) -> Result<Vec<&Node>, DialnetError> {
        let network = self.network(network)?;
        network
            .initials()
            .iter()
            .map(|id| self.graph.node_by_id(*id))
            .collect()
    }

    /// Network names in lexical order.
    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    pub fn network(&self, name: &str) -> Result<&Network, DialnetError> {
        self.networks
            .get(name)
            .ok_or_else(|| DialnetError::UnknownEntity(name.to_string()))
    }

    pub fn nodes_of(&self, network: &str) -> Result<Vec<&Node>, DialnetError> {
        self.network(network)?;
        Ok(self
            .graph
            .nodes()
            .filter(|node| node.network == network)
            .collect())
    }

    pub fn arcs_of(&self, network: &str) -> Result<Vec<&Arc>, DialnetError> {
        self.network(network)?;
        Ok(self
            .graph
            .arcs()
            .filter(|arc| arc.network == network)
            .collect())
    }

    /// Names of the recursive arcs targeting `target`.
    pub fn referrers(&self, target: &str) -> Result<Vec<&str>, DialnetError> {
        let id = self.resolve_node(target)?.id;
        self.references
            .referrers(id)
            .map(|arc| self.graph.arc_by_id(arc).map(|arc| arc.name.as_str()))
            .collect()
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// The node/arc namespace.
    #[must_use]
    pub fn names(&self) -> &NamingAuthority {
        &self.names
    }

    /// The predicate/variable namespace.
    #[must_use]
    pub fn predicates(&self) -> &NamingAuthority {
        &self.predicates
    }

    #[must_use]
    pub fn labeled(&self) -> &LabeledGraph {
        &self.graph
    }

    #[must_use]
    pub fn graph(&self) -> &Graph<Node, Arc> {
        self.graph.graph()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ArcKind, Direction, NodeKind, Position, System};

    fn sample() -> System {
        let mut system = System::new();
        system.add_network("main").expect("network");
        system
            .add_node("main", Some("start"), Position::new(0, 0))
            .expect("start");
        system
            .add_node("main", Some("end"), Position::new(10, 0))
            .expect("end");
        system
            .add_arc("main", Some("go"), "start", "end")
            .expect("arc");
        system
    }

    #[test]
    fn connections_follow_direction() {
        let system = sample();
        let outs = system.outs("start").expect("outs");
        assert_eq!(outs.len(), 1);
        assert_eq!(outs[0].name, "go");
        assert!(system.ins("start").expect("ins").is_empty());

        assert_eq!(system.attached("go", Direction::Out).expect("from").name, "start");
        assert_eq!(system.attached("go", Direction::In).expect("to").name, "end");
        assert!(system.outs("missing").is_err());
    }

    #[test]
    fn available_references_list_enter_nodes() {
        let mut system = sample();
        system.add_network("other").expect("network");
        system.add_node("other", Some("lone"), Position::default()).expect("lone");

        let names: Vec<&str> = system
            .available_references()
            .iter()
            .map(|node| node.name.as_str())
            .collect();
        assert_eq!(names, vec!["start"]);
        assert_eq!(system.node("lone").map(|n| n.kind), Some(NodeKind::Isolated));
        assert_eq!(
            system.initial_nodes("main").expect("initials")[0].name,
            "start"
        );
    }

    #[test]
    fn referrers_resolve_names() {
        let mut system = sample();
        system.add_network("caller").expect("network");
        system.add_node("caller", Some("a"), Position::default()).expect("a");
        system.add_node("caller", Some("b"), Position::default()).expect("b");
        let target = system.node("start").map(|n| n.id).expect("start");
        system
            .add_arc_with("caller", Some("call"), "a", "b", 0, ArcKind::Recursive { target })
            .expect("recursive");

        assert_eq!(system.referrers("start").expect("referrers"), vec!["call"]);
        assert_eq!(system.arcs_of("caller").expect("arcs").len(), 1);
        assert_eq!(system.nodes_of("main").expect("nodes").len(), 2);
        assert_eq!(system.networks().collect::<Vec<_>>(), vec!["caller", "main"]);
    }
}
