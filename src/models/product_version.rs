use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Environment, Product, User};

/// A version of a product.
///
/// `order` is the 1-based rank of this version among all versions of the same
/// product, by numeral-aware comparison of `version`. It is recomputed for every
/// sibling whenever a version is inserted or its `version` string changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductVersion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub version: String,
    /// Human-friendly name for the release (e.g. "Aurora").
    pub codename: String,
    pub description: Option<String>,
    /// Whether this version keeps its own team instead of using the product's.
    pub has_team: bool,
    pub order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductVersion {
    /// Build a not-yet-persisted version. `order` stays 0 until the siblings are
    /// ranked.
    pub fn new(product_id: Uuid, input: CreateVersionInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            product_id,
            version: input.version,
            codename: input.codename.unwrap_or_default(),
            description: input.description,
            has_team: input.has_team,
            order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The owning product's id.
    pub fn parent(&self) -> Uuid {
        self.product_id
    }
}

/// Input for creating a new product version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVersionInput {
    pub version: String,
    #[serde(default)]
    pub codename: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub has_team: bool,
}

/// Input for updating a version. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVersionInput {
    pub version: Option<String>,
    pub codename: Option<String>,
    pub description: Option<String>,
    pub has_team: Option<bool>,
}

/// A version together with its product and associations.
///
/// Displays as "<product name> <version>".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductVersionDetail {
    pub product: Product,
    #[serde(flatten)]
    pub version: ProductVersion,
    pub environments: Vec<Environment>,
    /// Effective team: the version's own team, or the product's when
    /// `has_team` is false.
    pub team: Vec<User>,
}

impl fmt::Display for ProductVersionDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.product.name, self.version.version)
    }
}
