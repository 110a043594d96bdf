//! Processing profiles
//!
//! A profile is the single authoritative schema for one generation task:
//! it carries the model prompt, the required output fields, the permitted
//! category set, and the CSV export column order. The validator, the cache
//! key, and the export layer all consume the same profile object so the
//! three can never drift apart.

mod model;
mod registry;

pub use model::{ProcessingProfile, ProfileError};
pub use registry::{ProfileRegistry, RegistryError};
