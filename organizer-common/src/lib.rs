//! # Recipe Organizer Common Library
//!
//! Shared code for the organizer crates including:
//! - Taxonomy, recipe and cookbook models
//! - Resolved configuration and its validation
//! - Common error type
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;
pub mod taxonomy;

pub use config::{CategorizeMode, OrganizerConfig, ProviderKind};
pub use error::{Error, Result};
pub use taxonomy::{CookbookDefinition, ItemSource, Recipe, TaxonomyItem, TaxonomyKey, TaxonomyKind};
