//! # System Module
//!
//! The editing orchestrator for conversation networks.
//!
//! [`System`] owns the labeled graph, both naming authorities, the set of
//! networks and the registry of recursive references, and exposes the
//! complete editing API. Every mutating call validates its request, delegates
//! the structural change to [`LabeledGraph`](crate::LabeledGraph), applies the
//! resulting [`Update`](crate::Update), and only then emits events.
//!
//! - `editor` - construction and mutating operations
//! - `query` - read-only surface used by views and exporters

mod editor;
mod query;

pub use editor::*;
