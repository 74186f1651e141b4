//! Service layer
//!
//! Services contain the business logic of the runner. The job runner turns a
//! pending job into executed commands and a completion record.

mod runner;

pub use runner::JobRunner;
