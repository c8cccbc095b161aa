//! Partner Sync Core - Shared domain types.
//!
//! This crate provides the types shared by the partner integration:
//! - `partner-sync` - Authenticated API client and sync scheduler
//! - `partner-sync-cli` - Command-line trigger for cron jobs and operators
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Audiences, credentials and the remote sync status model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
