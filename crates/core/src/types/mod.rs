//! Core types for the partner integration.
//!
//! This module provides type-safe wrappers for the domain concepts shared
//! between the API client and the sync scheduler.

pub mod audience;
pub mod credential;
pub mod status;

pub use audience::{Audience, AudienceError};
pub use credential::Credential;
pub use status::*;
