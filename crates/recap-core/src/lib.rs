//! Core types and engine for the weekly recap pipeline.
//!
//! Signals come in as loosely-structured JSON, pass a closed taxonomy, get
//! selected for a league week and content-addressed by a fingerprint, and the
//! resulting recap artifacts move through a versioned editorial lifecycle.
//!
//! This crate is deliberately free of database dependencies. Persistence is
//! reached through the [`store::ArtifactStore`] trait; `recap-store-sqlite`
//! implements it.

pub mod approval;
pub mod artifact;
pub mod attunement;
pub mod error;
pub mod grouping;
pub mod identity;
pub mod lifecycle;
pub mod selection;
pub mod signal;
pub mod store;
pub mod taxonomy;
pub mod window;

pub use error::{Error, Result};
