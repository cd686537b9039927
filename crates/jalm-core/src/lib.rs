//! Core types and trait definitions for the JALM application tracker.
//!
//! This crate is deliberately free of database and filesystem dependencies.
//! The store backend and the reconciliation engine both depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod application;
pub mod candidate;
pub mod error;
pub mod rules;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
