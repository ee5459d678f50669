//! Visual Perceiver - Template recognition for autoplay
//!
//! This crate provides:
//! - Frame and template models with region-restricted search
//! - Pluggable scoring, with normalized cross-correlation by default
//! - Deterministic template matching with stable ordering

pub mod cache;
pub mod errors;
pub mod matcher;
pub mod models;
pub mod scoring;

// Re-exports
pub use cache::TemplateCache;
pub use errors::VisualError;
pub use matcher::TemplateMatcher;
pub use models::*;
pub use scoring::{NccScorer, Score, Scorer};
