//! Identity model for buildable sources and their artifacts
//!
//! These are immutable value objects handed over by the morphology loader
//! and the build graph. The caches only read them to derive keys.

pub mod morphology;
pub mod source;

pub use morphology::{Morphology, MorphologyKind};
pub use source::{Artifact, Source};
