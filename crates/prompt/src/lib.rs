//! Source profiles for Citeflow.
//!
//! This crate provides the identity bundles attached to retrieval targets:
//! - YAML-based profile definitions
//! - Handlebars rendering of preambles and system text

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{render_profile, render_template, RenderedProfile};
pub use loader::{list_profiles, load_profile, validate_profile};
pub use types::{ProfileBehavior, SourceProfile, DEFAULT_PROFILE_ID};
