//! Durable pending-task queue: deferred, multi-step operations that outlive
//! any single invocation.
//!
//! The pieces: `task` is the data model and lifecycle, `db` the redb-backed
//! audit trail, `runner` the sweep that promotes `ready` tasks into
//! execution. The completion router (`crate::router`) resolves in-process
//! tasks when their command's completion signal arrives.

pub mod db;
pub mod runner;
pub mod task;

pub use db::TaskDb;
pub use runner::{register_dispatch_action, sweep, ActionRegistry, SweepReport};
pub use task::{PendingTask, TaskState};
