use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A test environment: one element per category, e.g. `["Linux", "Firefox"]`.
///
/// Environments are shared. Versions link to them, so cloning a version links
/// the clone to the same environments rather than duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    pub id: Uuid,
    pub elements: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Expand `{category: [elements]}` into every combination picking one element
/// per category. Categories are visited in key order.
///
/// An empty map or a category with no elements yields no combinations.
pub fn environment_matrix(categories: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    if categories.is_empty() {
        return Vec::new();
    }

    let mut combos: Vec<Vec<String>> = vec![Vec::new()];
    for elements in categories.values() {
        combos = combos
            .iter()
            .flat_map(|prefix| {
                elements.iter().map(move |element| {
                    let mut combo = prefix.clone();
                    combo.push(element.clone());
                    combo
                })
            })
            .collect();
    }
    combos
}
