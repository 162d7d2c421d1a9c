use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProductVersion;

/// A product under test.
///
/// Products are the parent of their versions. The product team is the default
/// team of every version that does not keep its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductInput {
    pub name: String,
    pub description: Option<String>,
}

/// A product with its versions in order, used for detailed responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithVersions {
    #[serde(flatten)]
    pub product: Product,
    pub versions: Vec<ProductVersion>,
}
