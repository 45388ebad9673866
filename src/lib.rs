//! Morph - caching core for a morphology-driven build tool
//!
//! Keeps bare git mirrors of source repositories (seeded from pre-packed
//! bundles when a bundle server is available), resolves refs in those
//! mirrors to commits plus submodule pins, and stores build artifacts and
//! their metadata in a content-addressed local cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod error;
pub mod escape;
pub mod fetch;
pub mod model;
pub mod resolver;
pub mod ui;
pub mod vcs;

pub use error::{MorphError, MorphResult};
