//! Finlink Plaid - Typed client for the aggregation API.
//!
//! This crate provides the remote-call surface used by the sync engines and
//! the webhook verifier: the [`AggregatorApi`] trait, its HTTP implementation
//! [`PlaidClient`], request/response types, and the region registry.

mod client;
pub mod config;
pub mod link;
mod registry;
mod traits;
pub mod types;

pub use client::{PlaidClient, PLAID_API_VERSION};
pub use config::{PlaidConfig, PlaidEnvironment};
pub use link::{AccountKind, LinkTokenRequest};
pub use registry::ProviderRegistry;
pub use traits::AggregatorApi;
pub use types::*;
