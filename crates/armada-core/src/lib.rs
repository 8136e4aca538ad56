//! Asynchronous command dispatch, completion correlation, and the durable
//! pending-task queue behind armada's fleet operations.
//!
//! The lifecycle of every remote operation: feature code dispatches a
//! uniquely-named command (`dispatch`), the transport runs it out of band,
//! and the completion signal comes back later through `router` carrying only
//! the resource id and the correlation token. The router classifies the
//! captured transcript (`outcome`), clears the busy flag (`guard`), notifies
//! subscribers (`events`), and resolves any pending task (`queue`) the
//! command belonged to.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod guard;
pub mod io;
pub mod outcome;
pub mod paths;
pub mod queue;
pub mod router;
pub mod store;
pub mod token;
pub mod transcript;

pub use error::{ArmadaError, Result};
