//! Fire-and-forget command dispatch.
//!
//! `dispatch` builds the correlation token, marks the resource busy, and
//! hands the command to the transport. It returns as soon as the transport
//! acknowledges submission; the remote script's outcome arrives later, as a
//! separate invocation of the completion router, possibly hours apart.

use crate::error::{ArmadaError, Result};
use crate::guard;
use crate::io::ensure_dir;
use crate::paths;
use crate::store::ResourceStore;
use crate::token::CommandToken;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::info;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The boundary behind which the real connection machinery (SSH) lives.
///
/// `submit` returns the transport's synchronous accept/reject only. A
/// transport must never block until the remote script finishes; failures
/// after acceptance are observable solely through the completion channel.
pub trait Transport: Send + Sync {
    fn submit(&self, resource_id: &str, token: &str, command_text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Disambiguator
// ---------------------------------------------------------------------------

/// How the third token field is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disambiguator {
    /// Unique epoch-second nonce; every dispatch is individually auditable.
    OneShot,
    /// Shared time-bucket value; dispatches of the same verb and subject
    /// within one bucket collapse to the same token. For actions that are
    /// idempotent within a window and might be double-submitted, e.g.
    /// scheduled domain-replacement jobs.
    Windowed,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<'a> {
    store: &'a dyn ResourceStore,
    transport: &'a dyn Transport,
    window_seconds: u64,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a dyn ResourceStore,
        transport: &'a dyn Transport,
        window_seconds: u64,
    ) -> Self {
        Self {
            store,
            transport,
            window_seconds,
        }
    }

    /// Build a token, mark the resource busy, and submit the command.
    ///
    /// `context` is the args snapshot stored on the execution record. On
    /// transport rejection the record is released again so no busy flag is
    /// left behind, and the rejection is returned to the caller.
    pub fn dispatch(
        &self,
        resource_id: &str,
        verb: &str,
        subject: &str,
        command_text: &str,
        mode: Disambiguator,
        context: &Value,
    ) -> Result<CommandToken> {
        let now = Utc::now();
        let token = match mode {
            Disambiguator::OneShot => CommandToken::one_shot(verb, subject, now),
            Disambiguator::Windowed => {
                CommandToken::windowed(verb, subject, now, self.window_seconds)
            }
        };

        guard::acquire(self.store, resource_id, verb, context)?;

        if let Err(e) = self
            .transport
            .submit(resource_id, &token.to_string(), command_text)
        {
            guard::release(self.store, resource_id)?;
            return Err(e);
        }

        info!(resource = resource_id, token = %token, "command dispatched");
        Ok(token)
    }
}

// ---------------------------------------------------------------------------
// LocalTransport
// ---------------------------------------------------------------------------

/// Development transport that runs the command as a detached local process,
/// with stdout and stderr captured into the transcript directory.
///
/// The completion signal is still out of band: nothing here waits for the
/// child or reports its exit. Deliver the completion through the router once
/// the command finishes (or have the command's wrapper call the webhook).
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Transport for LocalTransport {
    fn submit(&self, resource_id: &str, token: &str, command_text: &str) -> Result<()> {
        let log_path = paths::transcript_path(&self.root, resource_id, token);
        if let Some(parent) = log_path.parent() {
            ensure_dir(parent)?;
        }
        let stdout = std::fs::File::create(&log_path)
            .map_err(|e| ArmadaError::DispatchRejected(e.to_string()))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| ArmadaError::DispatchRejected(e.to_string()))?;

        // Deliberately not waited on; the child outlives this call.
        Command::new("sh")
            .arg("-c")
            .arg(command_text)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| ArmadaError::DispatchRejected(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
