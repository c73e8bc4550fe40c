//! shipyard-config — configuration registry and site model.
//!
//! The on-disk configuration is a single TOML document holding the server,
//! nginx, jail, ACME, health, and self-update sections plus one
//! `[site.<domain>]` table per managed site. The [`Registry`] wraps that
//! document behind a single-writer/multi-reader lock: every mutating method
//! persists the document to disk *before* releasing the write lock, so the
//! in-memory state and the file are never observably divergent after a call
//! returns.
//!
//! Naming transforms shared by every adapter (nginx variables, pot names,
//! rc.d service names) live in [`naming`] so the mapping is defined exactly
//! once.

pub mod error;
pub mod keys;
pub mod naming;
pub mod registry;
pub mod types;

pub use error::{ConfigError, ConfigResult};
pub use keys::generate_api_key;
pub use registry::Registry;
pub use types::*;
