//! Re-ranking of sibling versions.
//!
//! Nothing re-ranks implicitly. Whoever inserts a version or changes a
//! `version` string calls [`reorder`] for the product afterwards, inside the
//! same transaction.

use uuid::Uuid;

use crate::error::StorageError;
use crate::models::ProductVersion;
use crate::store::VersionStore;
use crate::version_key::VersionKey;

/// Sort `siblings` by version key and assign `order` 1..N.
///
/// Versions with equal keys ("1.0" and "1") fall back to the raw string and
/// then the id, so the result never depends on input order. Returns the ids of
/// versions whose `order` changed.
pub fn rank(siblings: &mut [ProductVersion]) -> Vec<Uuid> {
    siblings.sort_by_cached_key(|v| (VersionKey::parse(&v.version), v.version.clone(), v.id));

    let mut changed = Vec::new();
    for (position, version) in siblings.iter_mut().enumerate() {
        let order = position as i64 + 1;
        if version.order != order {
            version.order = order;
            changed.push(version.id);
        }
    }
    changed
}

/// Recompute `order` for every version of `product_id` and persist the ones
/// that moved.
///
/// Returns all siblings in their new order. The first failed write is returned
/// as-is; the caller's transaction decides what happens to earlier writes.
pub fn reorder<S: VersionStore + ?Sized>(
    store: &S,
    product_id: Uuid,
) -> Result<Vec<ProductVersion>, StorageError> {
    let mut siblings = store.siblings(product_id)?;
    let changed = rank(&mut siblings);

    for version in siblings.iter().filter(|v| changed.contains(&v.id)) {
        store.save(version)?;
    }

    tracing::debug!(
        "Reordered {} versions of product {} ({} moved)",
        siblings.len(),
        product_id,
        changed.len()
    );
    Ok(siblings)
}
