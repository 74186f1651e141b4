//! Scheduler layer for the runner
//!
//! Polls the orchestrator for pending jobs and fans them out to workers.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
