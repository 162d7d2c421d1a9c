//! Plain-text rendering for the command line.

use crate::models::{ProductVersion, ProductVersionDetail, ProductWithVersions};

/// Render a product and its versions as a tree, in version order.
///
/// Example output:
/// ```text
/// Firefox
/// ├── 1  2.9
/// ├── 2  2.10 (Aurora)
/// └── 3  2.11
/// ```
pub fn render_product(product: &ProductWithVersions) -> String {
    let mut output = String::new();
    output.push_str(&product.product.name);
    output.push('\n');

    let width = product
        .versions
        .iter()
        .map(|v| v.order.to_string().len())
        .max()
        .unwrap_or(1);

    for (i, version) in product.versions.iter().enumerate() {
        let branch = if i == product.versions.len() - 1 {
            "└── "
        } else {
            "├── "
        };
        output.push_str(branch);
        output.push_str(&format!("{:>width$}  ", version.order, width = width));
        output.push_str(&version_label(version));
        output.push('\n');
    }
    output
}

/// Render a list of versions, one per line, as "<order>\t<version>\t<id>".
pub fn render_versions(versions: &[ProductVersion]) -> String {
    versions
        .iter()
        .map(|v| format!("{}\t{}\t{}\n", v.order, version_label(v), v.id))
        .collect()
}

pub fn render_detail(detail: &ProductVersionDetail) -> String {
    let version = &detail.version;
    let mut output = format!("{}\n", detail);
    output.push_str(&format!("  id:       {}\n", version.id));
    if !version.codename.is_empty() {
        output.push_str(&format!("  codename: {}\n", version.codename));
    }
    if let Some(description) = &version.description {
        output.push_str(&format!("  about:    {}\n", description));
    }
    output.push_str(&format!("  order:    {}\n", version.order));

    let source = if version.has_team { "own" } else { "product" };
    let members: Vec<&str> = detail.team.iter().map(|u| u.username.as_str()).collect();
    output.push_str(&format!(
        "  team:     {} ({})\n",
        if members.is_empty() { "-".to_string() } else { members.join(", ") },
        source
    ));

    if detail.environments.is_empty() {
        output.push_str("  environments: -\n");
    } else {
        output.push_str("  environments:\n");
        for environment in &detail.environments {
            output.push_str(&format!("    - {}\n", environment.elements.join(", ")));
        }
    }
    output
}

fn version_label(version: &ProductVersion) -> String {
    if version.codename.is_empty() {
        version.version.clone()
    } else {
        format!("{} ({})", version.version, version.codename)
    }
}
