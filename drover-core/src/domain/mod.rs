//! Core domain types
//!
//! This module contains the structures shared between the control-channel
//! client and the runner: jobs, the parameter map, status records and the
//! runner identity.

pub mod command;
pub mod job;
pub mod log;
pub mod params;
pub mod payload;
pub mod runner;
pub mod status;
