use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A test run executed against a product version.
///
/// Runs belong to the version they were recorded for and are never carried
/// over to a clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    pub id: Uuid,
    pub product_version_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRunInput {
    pub name: String,
}

/// A test case as written for a specific product version.
///
/// Like runs, case versions stay with their version when it is cloned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseVersion {
    pub id: Uuid,
    pub product_version_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a case version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCaseVersionInput {
    pub name: String,
}
