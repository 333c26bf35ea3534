//! # Edit Scripts
//!
//! A script is a JSON array of edit commands, each tagged by `op`:
//!
//! ```json
//! [
//!   { "op": "addNetwork", "name": "main" },
//!   { "op": "addNode", "network": "main", "name": "hello", "x": 10, "y": 20 },
//!   { "op": "addNode", "network": "main", "name": "bye" },
//!   { "op": "addArc", "network": "main", "from": "hello", "to": "bye",
//!     "kind": "pattern", "args": ["bye*"] }
//! ]
//! ```
//!
//! Replay applies commands in order and stops at the first failure.

use dialnet_core::primitives::{DEFAULT_PRIORITY, MAX_SCRIPT_COMMANDS};
use dialnet_core::{
    ArcKind, ArcKindTag, DialnetError, EventSink, NodeKind, Position, System, build_arc_kind,
};
use serde::{Deserialize, Serialize};

/// One edit against the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditCommand {
    AddNetwork {
        name: String,
    },
    RemoveNetwork {
        name: String,
    },
    AddNode {
        network: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        x: i32,
        #[serde(default)]
        y: i32,
    },
    RemoveNode {
        name: String,
    },
    AddArc {
        network: String,
        #[serde(default)]
        name: Option<String>,
        from: String,
        to: String,
        #[serde(default)]
        priority: Option<i32>,
        /// Arc kind tag, `empty` when absent.
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        args: Vec<String>,
    },
    RemoveArc {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameNode {
        name: String,
        new_name: String,
    },
    MoveNode {
        name: String,
        x: i32,
        y: i32,
    },
    RetypeNode {
        name: String,
        kind: String,
    },
    /// Unset fields keep their current value.
    #[serde(rename_all = "camelCase")]
    ChangeArc {
        name: String,
        #[serde(default)]
        new_name: Option<String>,
        #[serde(default)]
        priority: Option<i32>,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl EditCommand {
    /// The `op` tag of this command.
    #[must_use]
    pub fn op(&self) -> &'static str {
        match self {
            Self::AddNetwork { .. } => "addNetwork",
            Self::RemoveNetwork { .. } => "removeNetwork",
            Self::AddNode { .. } => "addNode",
            Self::RemoveNode { .. } => "removeNode",
            Self::AddArc { .. } => "addArc",
            Self::RemoveArc { .. } => "removeArc",
            Self::RenameNode { .. } => "renameNode",
            Self::MoveNode { .. } => "moveNode",
            Self::RetypeNode { .. } => "retypeNode",
            Self::ChangeArc { .. } => "changeArc",
        }
    }

    /// Apply this command to `system`.
    pub fn apply<S: EventSink>(&self, system: &mut System<S>) -> Result<(), DialnetError> {
        match self {
            Self::AddNetwork { name } => system.add_network(name),
            Self::RemoveNetwork { name } => system.remove_network(name),
            Self::AddNode { network, name, x, y } => system
                .add_node(network, name.as_deref(), Position::new(*x, *y))
                .map(|_| ()),
            Self::RemoveNode { name } => system.remove_node(name),
            Self::AddArc {
                network,
                name,
                from,
                to,
                priority,
                kind,
                args,
            } => {
                let kind = match kind {
                    Some(tag) => resolve_kind(system, tag, args)?,
                    None => ArcKind::Empty,
                };
                system
                    .add_arc_with(
                        network,
                        name.as_deref(),
                        from,
                        to,
                        priority.unwrap_or(DEFAULT_PRIORITY),
                        kind,
                    )
                    .map(|_| ())
            }
            Self::RemoveArc { name } => system.remove_arc(name),
            Self::RenameNode { name, new_name } => system.rename_node(name, new_name),
            Self::MoveNode { name, x, y } => system.move_node(name, Position::new(*x, *y)),
            Self::RetypeNode { name, kind } => system.retype_node(name, kind.parse::<NodeKind>()?),
            Self::ChangeArc {
                name,
                new_name,
                priority,
                kind,
                args,
            } => {
                let current = system
                    .arc(name)
                    .cloned()
                    .ok_or_else(|| DialnetError::UnknownEntity(name.clone()))?;
                let kind = match kind {
                    Some(tag) => resolve_kind(system, tag, args)?,
                    None => current.kind,
                };
                system.change_arc(
                    name,
                    new_name.as_deref().unwrap_or(name.as_str()),
                    priority.unwrap_or(current.priority),
                    kind,
                )
            }
        }
    }
}

/// Build an arc kind from its tag name, resolving a recursion target by name.
fn resolve_kind<S: EventSink>(
    system: &System<S>,
    tag: &str,
    args: &[String],
) -> Result<ArcKind, DialnetError> {
    let tag: ArcKindTag = tag.parse()?;
    build_arc_kind(tag, args, |target| {
        system
            .node(target)
            .map(|node| node.id)
            .ok_or_else(|| DialnetError::UnknownEntity(target.to_string()))
    })
}

/// Parse a JSON script.
pub fn parse_script(bytes: &[u8]) -> Result<Vec<EditCommand>, DialnetError> {
    let commands: Vec<EditCommand> = serde_json::from_slice(bytes)
        .map_err(|e| DialnetError::SerializationError(format!("invalid script: {}", e)))?;

    if commands.len() > MAX_SCRIPT_COMMANDS {
        return Err(DialnetError::SerializationError(format!(
            "Command count {} exceeds maximum allowed {}",
            commands.len(),
            MAX_SCRIPT_COMMANDS
        )));
    }
    Ok(commands)
}

// =============================================================================
// REPLAY
// =============================================================================

/// The first command that failed during a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayFailure {
    /// Zero-based position in the script.
    pub index: usize,
    pub op: &'static str,
    pub error: String,
    #[serde(skip)]
    pub cause: DialnetError,
}

/// Outcome of replaying a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replay {
    pub applied: usize,
    pub failure: Option<ReplayFailure>,
}

impl Replay {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Apply `commands` in order, stopping at the first failure.
pub fn replay<S: EventSink>(system: &mut System<S>, commands: &[EditCommand]) -> Replay {
    for (index, command) in commands.iter().enumerate() {
        if let Err(cause) = command.apply(system) {
            tracing::warn!(index, op = command.op(), %cause, "script command failed");
            return Replay {
                applied: index,
                failure: Some(ReplayFailure {
                    index,
                    op: command.op(),
                    error: cause.to_string(),
                    cause,
                }),
            };
        }
        tracing::debug!(index, op = command.op(), "script command applied");
    }
    Replay {
        applied: commands.len(),
        failure: None,
    }
}
