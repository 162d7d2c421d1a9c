use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{parse_datetime, parse_uuid};
use crate::error::StorageError;
use crate::models::{Association, ProductVersion};
use crate::store::VersionStore;

pub(super) const VERSION_COLUMNS: &str =
    "id, product_id, version, codename, description, has_team, sort_order, created_at, updated_at";

pub(super) fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ProductVersion> {
    Ok(ProductVersion {
        id: parse_uuid(row.get::<_, String>(0)?),
        product_id: parse_uuid(row.get::<_, String>(1)?),
        version: row.get(2)?,
        codename: row.get(3)?,
        description: row.get(4)?,
        has_team: row.get::<_, i32>(5)? != 0,
        order: row.get(6)?,
        created_at: parse_datetime(row.get::<_, String>(7)?),
        updated_at: parse_datetime(row.get::<_, String>(8)?),
    })
}

/// [`VersionStore`] over a borrowed SQLite connection.
///
/// Construct it over a [`rusqlite::Transaction`] to make a reorder or clone
/// atomic.
pub struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub(super) fn connection(&self) -> &'c Connection {
        self.conn
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ProductVersion>, StorageError> {
        let version = self
            .conn
            .query_row(
                &format!("SELECT {} FROM product_versions WHERE id = ?", VERSION_COLUMNS),
                [id.to_string()],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }

    fn copy_links(
        &self,
        table: &str,
        column: &str,
        source: Uuid,
        target: Uuid,
    ) -> Result<usize, StorageError> {
        let copied = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} (product_version_id, {column})
                 SELECT ?1, {column} FROM {table} WHERE product_version_id = ?2"
            ),
            (target.to_string(), source.to_string()),
        )?;
        Ok(copied)
    }
}

impl VersionStore for SqliteStore<'_> {
    fn siblings(&self, product_id: Uuid) -> Result<Vec<ProductVersion>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM product_versions WHERE product_id = ? ORDER BY sort_order, version",
            VERSION_COLUMNS
        ))?;

        let versions = stmt
            .query_map([product_id.to_string()], version_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn insert(&self, version: &ProductVersion) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO product_versions (id, product_id, version, codename, description, has_team, sort_order, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                version.id.to_string(),
                version.product_id.to_string(),
                &version.version,
                &version.codename,
                &version.description,
                if version.has_team { 1 } else { 0 },
                version.order,
                version.created_at.to_rfc3339(),
                version.updated_at.to_rfc3339(),
            ),
        )?;
        Ok(())
    }

    fn save(&self, version: &ProductVersion) -> Result<(), StorageError> {
        let rows = self.conn.execute(
            "UPDATE product_versions
             SET product_id = ?, version = ?, codename = ?, description = ?, has_team = ?, sort_order = ?, updated_at = ?
             WHERE id = ?",
            (
                version.product_id.to_string(),
                &version.version,
                &version.codename,
                &version.description,
                if version.has_team { 1 } else { 0 },
                version.order,
                version.updated_at.to_rfc3339(),
                version.id.to_string(),
            ),
        )?;

        if rows == 0 {
            return Err(StorageError::Conflict {
                entity: "product version",
                id: version.id,
            });
        }
        Ok(())
    }

    fn copy_association(
        &self,
        source: Uuid,
        target: Uuid,
        association: Association,
    ) -> Result<usize, StorageError> {
        match association {
            Association::Environments => {
                self.copy_links("product_version_environments", "environment_id", source, target)
            }
            Association::Team => self.copy_links("product_version_team", "user_id", source, target),
            Association::Runs | Association::Caseversions => {
                Err(StorageError::UnsupportedAssociation(association.as_str()))
            }
        }
    }
}
