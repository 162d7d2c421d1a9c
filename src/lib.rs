//! Product version catalogue.
//!
//! Products own a set of versions kept in numeral-aware order ("2.9" before
//! "2.10", "1.1a" before "1.1"). Every insert or version edit re-ranks the
//! siblings explicitly through [`reorder::reorder`], and versions can be cloned
//! under a declarative [`cloning::ClonePolicy`].

pub mod cloning;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod render;
pub mod reorder;
pub mod store;
pub mod version_key;

pub use error::{Error, Result, StorageError};
