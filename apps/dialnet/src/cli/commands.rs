//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use crate::script::{Replay, parse_script, replay};
use dialnet_core::{DialnetError, System, SystemEvent, TextNormalizer};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum script size (16 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), DialnetError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| DialnetError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(DialnetError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DialnetError> {
    let canonical = path.canonicalize().map_err(|e| {
        DialnetError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DialnetError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read, parse and replay a script against a fresh model.
pub fn load_and_replay(
    config: &AppConfig,
    file: &Path,
) -> Result<(System, Replay), DialnetError> {
    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_SCRIPT_FILE_SIZE)?;

    let contents = std::fs::read(&validated_path)
        .map_err(|e| DialnetError::IoError(format!("Read file: {}", e)))?;
    let commands = parse_script(&contents)?;
    tracing::info!(file = %file.display(), commands = commands.len(), "replaying script");

    let mut system = config.build_system();
    let outcome = replay(&mut system, &commands);
    Ok((system, outcome))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Per-network node and arc counts, in name order.
fn network_summary(system: &System) -> Vec<serde_json::Value> {
    system
        .networks()
        .map(|name| {
            let nodes = system.nodes_of(name).map(|n| n.len()).unwrap_or_default();
            let arcs = system.arcs_of(name).map(|a| a.len()).unwrap_or_default();
            let initials: Vec<&str> = system
                .initial_nodes(name)
                .map(|nodes| nodes.into_iter().map(|n| n.name.as_str()).collect())
                .unwrap_or_default();
            serde_json::json!({
                "name": name,
                "nodes": nodes,
                "arcs": arcs,
                "initials": initials,
            })
        })
        .collect()
}

// =============================================================================
// APPLY COMMAND
// =============================================================================

/// Replay a script and print the resulting model summary.
pub fn cmd_apply(
    config: &AppConfig,
    file: &Path,
    json_mode: bool,
    verbose: bool,
) -> Result<(), DialnetError> {
    let (system, outcome) = load_and_replay(config, file)?;
    let events: &[SystemEvent] = system.sink().events();

    if json_mode {
        print_json(&serde_json::json!({
            "applied": outcome.applied,
            "failure": &outcome.failure,
            "networks": network_summary(&system),
            "events": events,
        }));
    } else {
        println!("dialnet Script Replay");
        println!("=====================");
        println!();
        println!("Commands applied: {}", outcome.applied);
        println!("Events emitted:   {}", events.len());
        println!();
        for network in system.networks() {
            let nodes = system.nodes_of(network)?.len();
            let arcs = system.arcs_of(network)?.len();
            println!("  {:<24} {:>5} nodes {:>5} arcs", network, nodes, arcs);
        }
        if verbose {
            println!();
            println!("Events:");
            for event in events {
                println!("  {}", event.label());
            }
        }
        if let Some(failure) = &outcome.failure {
            println!();
            println!(
                "Stopped at command #{} ({}): {}",
                failure.index, failure.op, failure.error
            );
        }
    }

    match outcome.failure {
        Some(failure) => Err(failure.cause),
        None => Ok(()),
    }
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Replay a script, then verify every model invariant.
pub fn cmd_check(config: &AppConfig, file: &Path, json_mode: bool) -> Result<(), DialnetError> {
    let (system, outcome) = load_and_replay(config, file)?;
    let consistency = system.check_consistency();

    if json_mode {
        print_json(&serde_json::json!({
            "applied": outcome.applied,
            "failure": &outcome.failure,
            "consistent": consistency.is_ok(),
            "error": consistency.as_ref().err().map(ToString::to_string),
        }));
    } else {
        println!("Commands applied: {}", outcome.applied);
        if let Some(failure) = &outcome.failure {
            println!(
                "Stopped at command #{} ({}): {}",
                failure.index, failure.op, failure.error
            );
        }
        match &consistency {
            Ok(()) => println!("Model consistent"),
            Err(e) => println!("Model INCONSISTENT: {}", e),
        }
    }

    consistency?;
    match outcome.failure {
        Some(failure) => Err(failure.cause),
        None => Ok(()),
    }
}

// =============================================================================
// NORMALIZE COMMAND
// =============================================================================

/// Print the identifier the naming authority would derive from `text`.
pub fn cmd_normalize(config: &AppConfig, text: &str, json_mode: bool) -> Result<(), DialnetError> {
    let normalized = config.normalizer().normalize(text);

    if json_mode {
        print_json(&serde_json::json!({
            "input": text,
            "normalized": normalized,
        }));
    } else {
        println!("{}", normalized);
    }
    Ok(())
}
