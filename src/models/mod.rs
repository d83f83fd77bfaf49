//! Core data models for the phonetic place index.

pub mod code;
pub mod place;

pub use code::{Algorithm, CodeCounts, PhoneticCode};
pub use place::{GeoPoint, Place};
