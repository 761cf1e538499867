//! Utility Module
//!
//! - [`names`]: short-name index, duplicate detection and renaming
//!
//! ```rust,ignore
//! use rigkit::utils::names::NameIndex;
//!
//! let index = NameIndex::build(&scene)?;
//! for (name, nodes) in index.duplicates() {
//!     log::warn!("{name} is used by {} nodes", nodes.len());
//! }
//! ```

pub mod names;

pub use names::{NameIndex, Rename};
