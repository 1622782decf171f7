//! Core model and derivation engine for Cost Guardian.
//!
//! Holds the canonical record schema, the column-alias normalizer, the
//! per-record field deriver, settings and the shared error type. Nothing
//! here touches the filesystem except [`settings`].

pub mod deriver;
pub mod error;
pub mod formatting;
pub mod models;
pub mod normalizer;
pub mod settings;
pub mod time_utils;

pub use deriver::IdleThresholds;
pub use error::{GuardianError, Result};
pub use models::{CanonicalField, CanonicalRecord, CanonicalTable, RawTable, Status};
pub use normalizer::normalize;
