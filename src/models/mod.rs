//! Domain models for the version catalogue.
//!
//! # Core Concepts
//!
//! - [`Product`]: Top-level container. Owns a team and a set of versions.
//! - [`ProductVersion`]: A version of a product. Siblings under one product are
//!   kept in numeral-aware order through their `order` field.
//! - [`User`]: Team member of a product or a version.
//! - [`Environment`]: Shared test environment (a combination of elements such as
//!   "Linux" or "Firefox") that versions link to.
//!
//! ## Version-owned records
//!
//! - [`Run`]: A test run against a version.
//! - [`CaseVersion`]: A test case as it applies to a version.
//!
//! [`Association`] names the collections hanging off a version and says which of
//! them may be copied to a clone.

mod association;
mod environment;
mod product;
mod product_version;
mod run;
mod user;

pub use association::*;
pub use environment::*;
pub use product::*;
pub use product_version::*;
pub use run::*;
pub use user::*;
