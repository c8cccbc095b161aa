//! Partner Sync - authenticated partner API client and inventory sync scheduler.
//!
//! # Architecture
//!
//! - [`auth`] - Per-audience OAuth tokens, cached and refreshed single-flight
//! - [`graphql`] - Signed GraphQL and REST calls through an injected transport
//! - [`scheduler`] - Status-driven full/partial sync triggering
//! - [`config`] - Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use partner_sync::{GraphQLClient, SyncConfig, SyncScheduler};
//!
//! let config = SyncConfig::from_env()?;
//! let client = GraphQLClient::from_config(&config)?;
//! let scheduler = SyncScheduler::new(client, &config);
//!
//! let report = scheduler.run_once().await?;
//! println!("{}", report.decision);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod error;
pub mod graphql;
pub mod scheduler;

pub use auth::{AuthenticationError, AuthenticationManager, IdentityProvider, TokenStore};
pub use config::{ConfigError, Endpoint, SyncConfig};
pub use error::SyncError;
pub use graphql::{GraphQLClient, NormalizedError, QueryRequest, ResponseEnvelope, TransportError};
pub use scheduler::{SyncDecision, SyncReport, SyncScheduler, TriggerOutcome};
