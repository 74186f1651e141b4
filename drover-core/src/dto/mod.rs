//! Data Transfer Objects for the control channel
//!
//! Every request travels inside an [`Envelope`] carrying the organization id
//! and runner token; responses are either an [`Ack`] or an operation-specific
//! payload.

use serde::{Deserialize, Serialize};

pub mod deployment;
pub mod job;
pub mod log;
pub mod methods;
pub mod oauth;
pub mod ping;

/// Authenticated request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub organization_id: String,
    pub token: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(organization_id: impl Into<String>, token: impl Into<String>, body: T) -> Self {
        Self {
            organization_id: organization_id.into(),
            token: token.into(),
            body,
        }
    }
}

/// Generic acknowledgment; a missing or false `done` is a failure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub done: Option<bool>,
}

impl Ack {
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// A batch of records of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch<T> {
    pub records: Vec<T>,
}

impl<T> From<Vec<T>> for RecordBatch<T> {
    fn from(records: Vec<T>) -> Self {
        Self { records }
    }
}
