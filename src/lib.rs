//! # Bidvault
//!
//! Tender response drafting against a local knowledge vault.
//!
//! Policies and past bids are extracted to text and kept in a SQLite
//! vault. A tender is extracted the same way, combined with the vault into
//! a prompt, and sent to a completion service that returns one drafted
//! answer per question. Every completed run is kept in an activity history
//! and can be reopened without calling the service again.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Extract  │──▶│  Workspace   │──▶│  Completion   │
//! │ PDF/DOCX/ │   │ (state mach.)│   │ Gemini + JSON │
//! │ XLSX/TXT  │   └──────┬───────┘   │  sanitizer    │
//! └───────────┘          │           └───────────────┘
//!                 ┌──────┴───────┐
//!                 ▼              ▼
//!           ┌──────────┐   ┌──────────┐
//!           │  SQLite  │   │ Session  │
//!           │vault+hist│   │   slot   │
//!           └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Text extraction from tender and vault files |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema versioning |
//! | [`sqlite_store`] | SQLite `Store` backend |
//! | [`completion`] | Gemini and disabled completion providers |
//! | [`session`] | File-backed session slot |
//! | [`workflow`] | The analysis workspace state machine |
//! | [`export`] | Markdown / JSON rendering of answers |
//! | [`stats`] | Dashboard counters |
//! | [`commands`] | CLI command implementations |
//!
//! Data types, the error taxonomy, the `Store` and `CompletionProvider`
//! traits, context assembly and reply sanitizing live in `bidvault_core`.

pub mod commands;
pub mod completion;
pub mod config;
pub mod db;
pub mod export;
pub mod extract;
pub mod migrate;
pub mod session;
pub mod sqlite_store;
pub mod stats;
pub mod workflow;
