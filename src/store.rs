//! The persistence seam used by ordering and cloning.
//!
//! [`reorder`](crate::reorder) and [`cloning`](crate::cloning) only ever talk to
//! a [`VersionStore`]. The SQLite implementation lives in
//! [`db::SqliteStore`](crate::db::SqliteStore); it runs over a transaction so a
//! failed multi-step operation leaves nothing behind.

use uuid::Uuid;

use crate::error::StorageError;
use crate::models::{Association, ProductVersion};

pub trait VersionStore {
    /// All versions of a product, including any just inserted.
    fn siblings(&self, product_id: Uuid) -> Result<Vec<ProductVersion>, StorageError>;

    /// Persist a new version.
    fn insert(&self, version: &ProductVersion) -> Result<(), StorageError>;

    /// Persist every field of an existing version.
    ///
    /// Fails with [`StorageError::Conflict`] if the row no longer exists.
    fn save(&self, version: &ProductVersion) -> Result<(), StorageError>;

    /// Duplicate one association collection from `source` onto `target`,
    /// returning how many records were copied.
    fn copy_association(
        &self,
        source: Uuid,
        target: Uuid,
        association: Association,
    ) -> Result<usize, StorageError>;
}
