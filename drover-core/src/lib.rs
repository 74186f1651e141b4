//! Drover Core
//!
//! Core types shared by the drover control-channel client and runner.
//!
//! This crate contains:
//! - Domain types: jobs, the parameter map, status records, runner identity
//! - DTOs: request/response shapes for the orchestrator's control channel

pub mod domain;
pub mod dto;
