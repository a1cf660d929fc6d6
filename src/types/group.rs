use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fixed palette used to derive a display color for groups that have no
/// explicit color. Indexed by a byte-sum hash so the pick is pure and
/// stable across reloads.
pub const GROUP_PALETTE: [&str; 4] = ["#f6d365", "#a18cd1", "#43cea2", "#ff6f91"];

/// Represents a bookmark group (tag).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time in milliseconds since the UNIX epoch.
    pub created_at: i64,
}

impl Group {
    /// Resolves the color this group should render with.
    ///
    /// Resolution order: local per-group override, explicit stored color,
    /// deterministic palette hash over the group id.
    pub fn display_color(&self, overrides: &HashMap<String, String>) -> String {
        if let Some(over) = overrides.get(&self.id) {
            return over.clone();
        }
        if let Some(color) = &self.color {
            return color.clone();
        }
        derived_color(&self.id).to_string()
    }
}

/// Deterministically picks a palette color for the given seed.
pub fn derived_color(seed: &str) -> &'static str {
    GROUP_PALETTE[palette_hash(seed) % GROUP_PALETTE.len()]
}

/// Byte-sum hash shared by color and gradient derivation.
pub fn palette_hash(seed: &str) -> usize {
    seed.bytes().map(|b| b as usize).sum()
}
