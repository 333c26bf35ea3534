//! # Domain Events
//!
//! Notifications emitted by [`System`](crate::System) after a mutation has
//! committed. Delivery is fire-and-forget: a sink cannot veto or fail.

use crate::{Arc, Node, NodeKind, Position};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A committed change to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SystemEvent {
    NetworkAdded {
        network: String,
    },
    NetworkRemoved {
        network: String,
    },
    NodeAdded {
        node: Node,
    },
    NodeRemoved {
        node: Node,
    },
    NodeRenamed {
        from: String,
        to: String,
    },
    NodeMoved {
        node: String,
        from: Position,
        to: Position,
    },
    /// The node's kind changed, by realignment or by an explicit retype.
    NodeRealigned {
        node: String,
        from: NodeKind,
        to: NodeKind,
    },
    ArcAdded {
        arc: Arc,
        from: String,
        to: String,
    },
    ArcRemoved {
        arc: Arc,
    },
    ArcChanged {
        previous: Arc,
        current: Arc,
    },
    /// New `Enter` nodes became available as recursion targets.
    AvailableReferencesExtended {
        nodes: Vec<String>,
    },
    /// `Enter` nodes stopped being available as recursion targets.
    AvailableReferencesReduced {
        nodes: Vec<String>,
    },
}

impl SystemEvent {
    /// Short snake_case label of the variant.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::NetworkAdded { .. } => "network_added",
            Self::NetworkRemoved { .. } => "network_removed",
            Self::NodeAdded { .. } => "node_added",
            Self::NodeRemoved { .. } => "node_removed",
            Self::NodeRenamed { .. } => "node_renamed",
            Self::NodeMoved { .. } => "node_moved",
            Self::NodeRealigned { .. } => "node_realigned",
            Self::ArcAdded { .. } => "arc_added",
            Self::ArcRemoved { .. } => "arc_removed",
            Self::ArcChanged { .. } => "arc_changed",
            Self::AvailableReferencesExtended { .. } => "available_references_extended",
            Self::AvailableReferencesReduced { .. } => "available_references_reduced",
        }
    }
}

// =============================================================================
// SINKS
// =============================================================================

/// Receiver of committed events.
pub trait EventSink: Debug {
    fn emit(&mut self, event: SystemEvent);
}

/// In-memory sink collecting every event in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<SystemEvent>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[SystemEvent] {
        &self.events
    }

    /// Take every collected event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<SystemEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: SystemEvent) {
        self.events.push(event);
    }
}

/// Sink that only logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&mut self, event: SystemEvent) {
        tracing::debug!(event = event.label(), ?event, "system event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_drains_in_order() {
        let mut log = EventLog::new();
        log.emit(SystemEvent::NetworkAdded {
            network: "a".to_string(),
        });
        log.emit(SystemEvent::NetworkRemoved {
            network: "a".to_string(),
        });
        assert_eq!(log.len(), 2);

        let drained = log.drain();
        assert_eq!(drained[0].label(), "network_added");
        assert_eq!(drained[1].label(), "network_removed");
        assert!(log.is_empty());
    }
}
