//! Policy-driven cloning of product versions.
//!
//! What a clone copies is data, not code: a [`ClonePolicy`] lists the text
//! fields to rewrite and the associations to duplicate. Anything not listed
//! (runs, case versions, the sibling position) is left behind.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result, StorageError};
use crate::models::{Association, ProductVersion};
use crate::reorder::reorder;
use crate::store::VersionStore;

/// Rewrite applied to a text field of the clone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Prefix(String),
    Suffix(String),
}

impl Transform {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Self::Prefix(prefix) => format!("{}{}", prefix, value),
            Self::Suffix(suffix) => format!("{}{}", value, suffix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub transform: Transform,
}

impl FieldRule {
    pub fn new(field: impl Into<String>, transform: Transform) -> Self {
        Self {
            field: field.into(),
            transform,
        }
    }
}

/// Declarative description of a clone: field rewrites plus the associations
/// to duplicate onto the new entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClonePolicy {
    #[serde(default)]
    pub fields: Vec<FieldRule>,
    #[serde(default)]
    pub associations: Vec<Association>,
}

impl ClonePolicy {
    /// The standard policy for product versions: `version` gets ".next",
    /// `codename` gets "Cloned: ", environments and team are copied.
    pub fn product_version() -> Self {
        Self {
            fields: vec![
                FieldRule::new("version", Transform::Suffix(".next".to_string())),
                FieldRule::new("codename", Transform::Prefix("Cloned: ".to_string())),
            ],
            associations: vec![Association::Environments, Association::Team],
        }
    }

    /// Reject policies that ask for an owned collection to be copied.
    pub fn validate(&self) -> Result<()> {
        if let Some(association) = self.associations.iter().find(|a| !a.is_copyable()) {
            return Err(Error::validation(format!(
                "{} cannot be copied to a clone",
                association.as_str()
            )));
        }
        Ok(())
    }
}

impl Default for ClonePolicy {
    fn default() -> Self {
        Self::product_version()
    }
}

/// An entity whose text fields can be addressed by name.
pub trait Cloneable {
    fn text_field_mut(&mut self, field: &str) -> Option<&mut String>;
}

impl Cloneable for ProductVersion {
    fn text_field_mut(&mut self, field: &str) -> Option<&mut String> {
        match field {
            "version" => Some(&mut self.version),
            "codename" => Some(&mut self.codename),
            _ => None,
        }
    }
}

/// Apply the policy's field rules to `entity` in place.
pub fn apply_fields<T: Cloneable + ?Sized>(entity: &mut T, policy: &ClonePolicy) -> Result<()> {
    for rule in &policy.fields {
        let value = entity
            .text_field_mut(&rule.field)
            .ok_or_else(|| Error::validation(format!("unknown field: {}", rule.field)))?;
        let rewritten = rule.transform.apply(value);
        *value = rewritten;
    }
    Ok(())
}

/// Create a clone of `source` under `policy` and re-rank its siblings.
///
/// The clone gets a fresh id and is inserted before associations are copied.
/// Returns the clone carrying its final `order`. Every step's error is
/// returned unchanged; run this inside a transaction to avoid a partial clone.
pub fn clone_version<S: VersionStore + ?Sized>(
    store: &S,
    source: &ProductVersion,
    policy: &ClonePolicy,
) -> Result<ProductVersion> {
    policy.validate()?;

    let mut clone = source.clone();
    apply_fields(&mut clone, policy)?;
    let now = Utc::now();
    clone.id = Uuid::new_v4();
    clone.order = 0;
    clone.created_at = now;
    clone.updated_at = now;

    store.insert(&clone)?;

    for association in &policy.associations {
        let copied = store.copy_association(source.id, clone.id, *association)?;
        tracing::debug!(
            "Copied {} {} from {} to {}",
            copied,
            association.as_str(),
            source.id,
            clone.id
        );
    }

    let siblings = reorder(store, clone.product_id)?;
    let clone = siblings
        .into_iter()
        .find(|v| v.id == clone.id)
        .ok_or(StorageError::Conflict {
            entity: "product version",
            id: clone.id,
        })?;

    tracing::info!(
        "Cloned version {} ({}) as {} ({})",
        source.version,
        source.id,
        clone.version,
        clone.id
    );
    Ok(clone)
}
