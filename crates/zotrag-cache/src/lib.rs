//! Content-addressed disk cache for zotrag.
//!
//! Each pipeline stage stores one serialized value per [`CacheKey`] in its own
//! directory. [`DiskCache`] holds nothing in memory besides its location, so
//! any number of workers can open the same directory independently.
//!
//! [`DataLayout`] names the directories and artifact files under the data
//! root.
//!
//! [`CacheKey`]: zotrag_core::CacheKey

pub mod disk;
pub mod layout;

pub use disk::DiskCache;
pub use layout::{read_artifact, write_artifact, DataLayout};
