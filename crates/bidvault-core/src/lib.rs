//! # Bidvault Core
//!
//! Shared, I/O-free logic for Bidvault: data models, the error taxonomy,
//! the store abstraction, knowledge-context assembly, prompt building and
//! reply sanitizing, and the session-slot abstraction.
//!
//! This crate contains no tokio, sqlx, filesystem or network code; the
//! `bidvault` crate supplies those backends.

pub mod completion;
pub mod context;
pub mod error;
pub mod models;
pub mod sanitize;
pub mod session;
pub mod store;

pub use error::{Error, Result};
