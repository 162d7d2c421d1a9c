mod schema;
mod store;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::cloning::{self, ClonePolicy};
use crate::error::{Error, Result};
use crate::models::*;
use crate::reorder;
use crate::store::VersionStore;

pub use store::SqliteStore;
use store::{version_from_row, VERSION_COLUMNS};

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::config("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::config(format!("Cannot create {}: {}", parent.display(), e)))?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// Run `f` against a [`SqliteStore`] inside an immediate transaction.
    ///
    /// The write lock is taken up front so the siblings read for a reorder
    /// cannot change before the new orders are written. Any error rolls back
    /// everything `f` did.
    fn write<T>(&self, f: impl FnOnce(&SqliteStore<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&SqliteStore::new(&tx))?;
        tx.commit()?;
        Ok(value)
    }

    // ============================================================
    // Product operations
    // ============================================================

    pub fn get_all_products(&self) -> Result<Vec<Product>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, description, created_at, updated_at
             FROM products ORDER BY name",
        )?;

        let products = stmt
            .query_map([], |row| {
                Ok(Product {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                    updated_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    }

    pub fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let product = conn
            .query_row(
                "SELECT id, name, description, created_at, updated_at
                 FROM products WHERE id = ?",
                [id.to_string()],
                |row| {
                    Ok(Product {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        description: row.get(2)?,
                        created_at: parse_datetime(row.get::<_, String>(3)?),
                        updated_at: parse_datetime(row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;

        Ok(product)
    }

    pub fn create_product(&self, input: CreateProductInput) -> Result<Product> {
        let name = require_text("product name", &input.name)?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO products (id, name, description, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &name,
                &input.description,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        tracing::info!("Created product {} ({})", name, id);

        Ok(Product {
            id,
            name,
            description: input.description,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_product_with_versions(&self, id: Uuid) -> Result<Option<ProductWithVersions>> {
        let Some(product) = self.get_product(id)? else {
            return Ok(None);
        };

        let versions = self.get_versions_by_product(id)?;

        Ok(Some(ProductWithVersions { product, versions }))
    }

    pub fn add_product_team_member(&self, product_id: Uuid, user_id: Uuid) -> Result<()> {
        self.get_product(product_id)?
            .ok_or_else(|| Error::not_found("product", product_id))?;
        self.get_user(user_id)?
            .ok_or_else(|| Error::not_found("user", user_id))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO product_team (product_id, user_id) VALUES (?, ?)",
            (product_id.to_string(), user_id.to_string()),
        )?;
        Ok(())
    }

    pub fn get_product_team(&self, product_id: Uuid) -> Result<Vec<User>> {
        self.users_linked("product_team", "product_id", product_id)
    }

    // ============================================================
    // User operations
    // ============================================================

    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let username = require_text("username", &input.username)?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, username, created_at) VALUES (?, ?, ?)",
            (id.to_string(), &username, now.to_rfc3339()),
        )?;

        Ok(User {
            id,
            username,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let user = conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE id = ?",
                [id.to_string()],
                |row| {
                    Ok(User {
                        id: parse_uuid(row.get::<_, String>(0)?),
                        username: row.get(1)?,
                        created_at: parse_datetime(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;

        Ok(user)
    }

    fn users_linked(&self, table: &str, column: &str, owner_id: Uuid) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT u.id, u.username, u.created_at
             FROM users u JOIN {table} t ON t.user_id = u.id
             WHERE t.{column} = ? ORDER BY u.username"
        ))?;

        let users = stmt
            .query_map([owner_id.to_string()], |row| {
                Ok(User {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    username: row.get(1)?,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }

    // ============================================================
    // Product Version operations
    // ============================================================

    pub fn get_version(&self, id: Uuid) -> Result<Option<ProductVersion>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        Ok(SqliteStore::new(&conn).get(id)?)
    }

    /// All versions of a product, in `order`.
    pub fn get_versions_by_product(&self, product_id: Uuid) -> Result<Vec<ProductVersion>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM product_versions WHERE product_id = ? ORDER BY sort_order, version",
            VERSION_COLUMNS
        ))?;

        let versions = stmt
            .query_map([product_id.to_string()], version_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// Insert a version and re-rank its siblings.
    ///
    /// The returned version carries its final `order`.
    pub fn create_version(
        &self,
        product_id: Uuid,
        input: CreateVersionInput,
    ) -> Result<ProductVersion> {
        let version = require_text("version", &input.version)?;
        self.get_product(product_id)?
            .ok_or_else(|| Error::not_found("product", product_id))?;

        let new = ProductVersion::new(product_id, CreateVersionInput { version, ..input });

        let created = self.write(|store| {
            store.insert(&new)?;
            let siblings = reorder::reorder(store, product_id)?;
            find_ranked(siblings, new.id)
        })?;

        tracing::info!(
            "Created version {} of product {} at position {}",
            created.version,
            product_id,
            created.order
        );
        Ok(created)
    }

    /// Apply a partial update; re-ranks the siblings when `version` changes.
    pub fn update_version(
        &self,
        id: Uuid,
        input: UpdateVersionInput,
    ) -> Result<Option<ProductVersion>> {
        let new_version = input
            .version
            .as_deref()
            .map(|v| require_text("version", v))
            .transpose()?;

        self.write(|store| {
            let Some(existing) = store.get(id)? else {
                return Ok(None);
            };

            let mut updated = existing.clone();
            if let Some(version) = new_version {
                updated.version = version;
            }
            if let Some(codename) = input.codename {
                updated.codename = codename;
            }
            if let Some(description) = input.description {
                updated.description = Some(description);
            }
            if let Some(has_team) = input.has_team {
                updated.has_team = has_team;
            }
            updated.updated_at = Utc::now();
            store.save(&updated)?;

            if updated.version == existing.version {
                return Ok(Some(updated));
            }

            tracing::info!(
                "Version {} renamed from {} to {}",
                id,
                existing.version,
                updated.version
            );
            let siblings = reorder::reorder(store, updated.product_id)?;
            find_ranked(siblings, id).map(Some)
        })
    }

    /// Re-rank every version of a product.
    pub fn reorder_product(&self, product_id: Uuid) -> Result<Vec<ProductVersion>> {
        self.get_product(product_id)?
            .ok_or_else(|| Error::not_found("product", product_id))?;

        self.write(|store| Ok(reorder::reorder(store, product_id)?))
    }

    /// Clone a version with the standard policy (".next", "Cloned: ",
    /// environments and team).
    pub fn clone_version(&self, id: Uuid) -> Result<ProductVersion> {
        self.clone_version_with(id, &ClonePolicy::product_version())
    }

    pub fn clone_version_with(&self, id: Uuid, policy: &ClonePolicy) -> Result<ProductVersion> {
        self.write(|store| {
            let source = store
                .get(id)?
                .ok_or_else(|| Error::not_found("product version", id))?;
            cloning::clone_version(store, &source, policy)
        })
    }

    pub fn get_version_detail(&self, id: Uuid) -> Result<Option<ProductVersionDetail>> {
        let Some(version) = self.get_version(id)? else {
            return Ok(None);
        };
        let product = self
            .get_product(version.product_id)?
            .ok_or_else(|| Error::not_found("product", version.product_id))?;
        let environments = self.get_version_environments(id)?;
        let team = self.get_version_team(id)?;

        Ok(Some(ProductVersionDetail {
            product,
            version,
            environments,
            team,
        }))
    }

    // ============================================================
    // Version team operations
    // ============================================================

    pub fn add_version_team_member(&self, version_id: Uuid, user_id: Uuid) -> Result<()> {
        self.get_version(version_id)?
            .ok_or_else(|| Error::not_found("product version", version_id))?;
        self.get_user(user_id)?
            .ok_or_else(|| Error::not_found("user", user_id))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT OR IGNORE INTO product_version_team (product_version_id, user_id) VALUES (?, ?)",
            (version_id.to_string(), user_id.to_string()),
        )?;
        Ok(())
    }

    /// Members linked directly to the version, regardless of `has_team`.
    pub fn get_version_own_team(&self, version_id: Uuid) -> Result<Vec<User>> {
        self.users_linked("product_version_team", "product_version_id", version_id)
    }

    /// The team in effect: the version's own team when `has_team` is set,
    /// otherwise its product's team.
    pub fn get_version_team(&self, version_id: Uuid) -> Result<Vec<User>> {
        let version = self
            .get_version(version_id)?
            .ok_or_else(|| Error::not_found("product version", version_id))?;

        if version.has_team {
            self.get_version_own_team(version_id)
        } else {
            self.get_product_team(version.product_id)
        }
    }

    // ============================================================
    // Environment operations
    // ============================================================

    /// Create one environment per combination of the given category elements
    /// and link each to the version, all in one transaction.
    pub fn attach_environment_matrix(
        &self,
        version_id: Uuid,
        categories: &BTreeMap<String, Vec<String>>,
    ) -> Result<Vec<Environment>> {
        self.write(|store| {
            store
                .get(version_id)?
                .ok_or_else(|| Error::not_found("product version", version_id))?;

            let conn = store.connection();
            let environments = environment_matrix(categories)
                .into_iter()
                .map(|elements| insert_environment(conn, elements))
                .collect::<Result<Vec<_>>>()?;

            for environment in &environments {
                conn.execute(
                    "INSERT INTO product_version_environments (product_version_id, environment_id)
                     VALUES (?, ?)",
                    (version_id.to_string(), environment.id.to_string()),
                )?;
            }

            tracing::debug!(
                "Attached {} environments to version {}",
                environments.len(),
                version_id
            );
            Ok(environments)
        })
    }

    pub fn get_version_environments(&self, version_id: Uuid) -> Result<Vec<Environment>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT e.id, e.elements, e.created_at
             FROM environments e
             JOIN product_version_environments pve ON pve.environment_id = e.id
             WHERE pve.product_version_id = ? ORDER BY e.created_at, e.id",
        )?;

        let environments = stmt
            .query_map([version_id.to_string()], |row| {
                let elements_json: String = row.get(1)?;
                let elements = serde_json::from_str(&elements_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
                })?;
                Ok(Environment {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    elements,
                    created_at: parse_datetime(row.get::<_, String>(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(environments)
    }

    // ============================================================
    // Run and Case Version operations
    // ============================================================

    pub fn create_run(&self, version_id: Uuid, input: CreateRunInput) -> Result<Run> {
        let name = require_text("run name", &input.name)?;
        self.get_version(version_id)?
            .ok_or_else(|| Error::not_found("product version", version_id))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO runs (id, product_version_id, name, created_at) VALUES (?, ?, ?, ?)",
            (id.to_string(), version_id.to_string(), &name, now.to_rfc3339()),
        )?;

        Ok(Run {
            id,
            product_version_id: version_id,
            name,
            created_at: now,
        })
    }

    pub fn get_runs_by_version(&self, version_id: Uuid) -> Result<Vec<Run>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, product_version_id, name, created_at
             FROM runs WHERE product_version_id = ? ORDER BY created_at",
        )?;

        let runs = stmt
            .query_map([version_id.to_string()], |row| {
                Ok(Run {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    product_version_id: parse_uuid(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    pub fn create_case_version(
        &self,
        version_id: Uuid,
        input: CreateCaseVersionInput,
    ) -> Result<CaseVersion> {
        let name = require_text("case name", &input.name)?;
        self.get_version(version_id)?
            .ok_or_else(|| Error::not_found("product version", version_id))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO case_versions (id, product_version_id, name, created_at) VALUES (?, ?, ?, ?)",
            (id.to_string(), version_id.to_string(), &name, now.to_rfc3339()),
        )?;

        Ok(CaseVersion {
            id,
            product_version_id: version_id,
            name,
            created_at: now,
        })
    }

    pub fn get_case_versions_by_version(&self, version_id: Uuid) -> Result<Vec<CaseVersion>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, product_version_id, name, created_at
             FROM case_versions WHERE product_version_id = ? ORDER BY created_at",
        )?;

        let cases = stmt
            .query_map([version_id.to_string()], |row| {
                Ok(CaseVersion {
                    id: parse_uuid(row.get::<_, String>(0)?),
                    product_version_id: parse_uuid(row.get::<_, String>(1)?),
                    name: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cases)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

fn insert_environment(conn: &Connection, elements: Vec<String>) -> Result<Environment> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO environments (id, elements, created_at) VALUES (?, ?, ?)",
        (id.to_string(), serde_json::to_string(&elements)?, now.to_rfc3339()),
    )?;

    Ok(Environment {
        id,
        elements,
        created_at: now,
    })
}

fn find_ranked(siblings: Vec<ProductVersion>, id: Uuid) -> Result<ProductVersion> {
    siblings
        .into_iter()
        .find(|v| v.id == id)
        .ok_or_else(|| Error::not_found("product version", id))
}

/// Trimmed copy of `value`, rejecting blank input.
fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
