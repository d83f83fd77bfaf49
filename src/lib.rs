//! Placephone - phonetic indexing of gazetteer place names
//!
//! This library provides the encoders, the sled-backed index store and the
//! build pipeline shared by the ingest, encode and query binaries.

pub mod config;
pub mod gazetteer;
pub mod matcher;
pub mod models;
pub mod phonetic;
pub mod pipeline;
pub mod store;

pub use config::{BuildConfig, Config, MalformedPolicy};
pub use models::{Algorithm, Place};
pub use phonetic::PhoneticEncoderSet;
pub use pipeline::{BuildError, BuildSummary, IndexBuildPipeline};
pub use store::IndexStore;
