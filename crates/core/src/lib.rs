//! Finlink Core - Shared domain types and the error taxonomy.
//!
//! This crate is consumed by the provider client, the sync engines and the
//! webhook verifier. It holds no I/O of its own.

pub mod constants;
pub mod errors;
pub mod items;

pub use errors::{Error, ReferenceKind, Result, RetryClass};
pub use items::{AccessToken, Item, Region};
