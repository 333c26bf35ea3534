//! # dialnet-core
//!
//! The editing model for dialnet conversation networks.
//!
//! A design is a set of named networks. Each network is a directed
//! multigraph of nodes (conversation states) and arcs (transitions); a
//! recursive arc calls into the `Enter` node of any network. This crate keeps
//! that model consistent under every edit:
//!
//! - node and arc names are unique and always reserved with the naming authority
//! - node kinds follow connectivity through a pluggable realignment policy
//! - an `Enter` node targeted by a recursive arc is never silently demoted
//! - a rejected edit leaves no trace, and events are emitted only after commit
//!
//! ## Architectural Constraints
//!
//! - NO async, NO I/O (pure Rust)
//! - `BTreeMap`/`BTreeSet` only, so every listing has a stable order
//! - No floats: positions are integer coordinates

// =============================================================================
// MODULES
// =============================================================================

pub mod event;
pub mod graph;
pub mod labeled;
pub mod naming;
pub mod policy;
pub mod primitives;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Arc, ArcId, ArcKind, ArcKindTag, DialnetError, Direction, Node, NodeId, NodeKind, Position,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::{Extraction, Graph, GraphError, Joint, Keyed, Staging};
pub use labeled::{LabeledGraph, NodeRemoval, ReferenceRegistry, Update};

// =============================================================================
// RE-EXPORTS: Policies and Naming
// =============================================================================

pub use naming::{IdentifierNormalizer, NamingAuthority, TextNormalizer};
pub use policy::{
    ArcChange, ArcModifier, ConnectivityRealigner, DefaultArcModifier, DefaultNodeModifier,
    NodeChange, NodeModifier, RealignmentProcessor, Topology, build_arc_kind,
};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use event::{EventLog, EventSink, SystemEvent, TracingSink};
pub use system::{Network, System, SystemBuilder};
