//! Per-resource execution record: the best-effort busy flag marking a
//! command in flight.
//!
//! This is bookkeeping, not a lock. `acquire` does not check whether a
//! command is already in flight; the one-command-per-resource convention is
//! enforced by the feature code issuing at most one dispatch per user
//! action, and a second acquire simply overwrites the first (last write
//! wins). `release` is unconditional and idempotent, which is what keeps a
//! failed run from wedging the resource forever.

use crate::error::Result;
use crate::store::{fields, ResourceStore};
use serde_json::Value;

/// Value of `action_status` while a command is in flight.
pub const IN_FLIGHT: &str = "in-flight";

/// Snapshot of the in-flight command attached to a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub action: String,
    pub args: Value,
}

/// Mark `resource_id` busy with `action`. Fails only if the store write
/// fails.
pub fn acquire(
    store: &dyn ResourceStore,
    resource_id: &str,
    action: &str,
    args: &Value,
) -> Result<()> {
    store.set(resource_id, fields::ACTION_STATUS, IN_FLIGHT)?;
    store.set(resource_id, fields::ACTION, action)?;
    store.set(resource_id, fields::ACTION_ARGS, &serde_json::to_string(args)?)?;
    Ok(())
}

/// Unconditionally delete the execution record. Safe to call when no record
/// exists.
pub fn release(store: &dyn ResourceStore, resource_id: &str) -> Result<()> {
    store.delete(resource_id, fields::ACTION_STATUS)?;
    store.delete(resource_id, fields::ACTION)?;
    store.delete(resource_id, fields::ACTION_ARGS)?;
    Ok(())
}

/// The current execution record, if any.
pub fn current(store: &dyn ResourceStore, resource_id: &str) -> Result<Option<ExecutionRecord>> {
    let Some(action) = store.get(resource_id, fields::ACTION)? else {
        return Ok(None);
    };
    let args = store
        .get(resource_id, fields::ACTION_ARGS)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or(Value::Null);
    Ok(Some(ExecutionRecord { action, args }))
}

/// Whether a command is currently marked in flight for `resource_id`.
pub fn is_busy(store: &dyn ResourceStore, resource_id: &str) -> Result<bool> {
    Ok(store.get(resource_id, fields::ACTION_STATUS)?.is_some())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
