//! Two-level category hierarchy.

use common::CategoryId;
use serde::{Deserialize, Serialize};

/// A category as shown to clients, with its parent's name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub parent_id: CategoryId,
    pub category_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category_name: Option<String>,
}

impl Category {
    /// Returns true for top-level categories.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_root_parent()
    }

    /// Returns the id of the top-level category this one belongs to.
    pub fn root_id(&self) -> CategoryId {
        if self.is_root() { self.id } else { self.parent_id }
    }
}

/// Resolves category ids.
pub trait CategoryLookup: Send + Sync {
    /// Returns the category with its parent name, or `None` if unknown.
    fn category(&self, id: CategoryId) -> Option<Category>;
}

const CATEGORIES: &[(i32, i32, &str)] = &[
    (1, 0, "Sofas"),
    (2, 1, "Armchairs"),
    (3, 1, "Two-seater sofas"),
    (4, 1, "Corner sofas"),
    (5, 1, "Bunk sofas"),
    (6, 1, "Sofa beds"),
    (10, 0, "Home chairs"),
    (11, 10, "Stools"),
    (12, 10, "Cushioned stools"),
    (13, 10, "Dining chairs"),
    (14, 10, "Living room chairs"),
    (15, 10, "Counter chairs"),
    (20, 0, "Kids chairs"),
    (21, 20, "Study chairs"),
    (22, 20, "Baby sofas"),
    (23, 20, "Kids high chairs"),
    (24, 20, "Table chairs"),
    (30, 0, "Office chairs"),
    (31, 30, "Desk chairs"),
    (32, 30, "Business chairs"),
    (33, 30, "Swivel chairs"),
    (34, 30, "Reclining chairs"),
    (35, 30, "Throwing chairs"),
    (40, 0, "Folding chairs"),
    (41, 40, "Pipe chairs"),
    (42, 40, "Wooden folding chairs"),
    (43, 40, "Kitchen chairs"),
    (44, 40, "Outdoor chairs"),
    (45, 40, "Work chairs"),
    (50, 0, "Benches"),
    (51, 50, "Single benches"),
    (52, 50, "Double benches"),
    (53, 50, "Outdoor benches"),
    (54, 50, "Storage benches"),
    (55, 50, "Benches with backrest"),
    (56, 50, "Benchmarks"),
    (60, 0, "Floor chairs"),
    (61, 60, "Japanese floor chairs"),
    (62, 60, "High floor chairs"),
    (63, 60, "Gaming floor chairs"),
    (64, 60, "Rocking chairs"),
    (65, 60, "Floor cushions"),
    (66, 60, "Air chairs"),
];

/// The fixed category table shipped with the marketplace.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCategories;

impl StaticCategories {
    pub fn new() -> Self {
        Self
    }

    fn raw(id: i32) -> Option<(i32, i32, &'static str)> {
        CATEGORIES.iter().copied().find(|(cid, _, _)| *cid == id)
    }
}

impl CategoryLookup for StaticCategories {
    fn category(&self, id: CategoryId) -> Option<Category> {
        let (cid, parent, name) = Self::raw(id.get())?;
        let parent_category_name = if parent == 0 {
            None
        } else {
            Some(Self::raw(parent)?.2.to_string())
        };
        Some(Category {
            id: CategoryId::new(cid),
            parent_id: CategoryId::new(parent),
            category_name: name.to_string(),
            parent_category_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_resolves_parent_name() {
        let c = StaticCategories::new()
            .category(CategoryId::new(32))
            .unwrap();
        assert_eq!(c.parent_id, CategoryId::new(30));
        assert_eq!(c.parent_category_name.as_deref(), Some("Office chairs"));
        assert_eq!(c.root_id(), CategoryId::new(30));
        assert!(!c.is_root());
    }

    #[test]
    fn test_root_has_no_parent_name() {
        let c = StaticCategories::new()
            .category(CategoryId::new(50))
            .unwrap();
        assert!(c.is_root());
        assert_eq!(c.parent_category_name, None);
        assert_eq!(c.root_id(), CategoryId::new(50));
    }

    #[test]
    fn test_unknown_category() {
        let lookup = StaticCategories::new();
        assert!(lookup.category(CategoryId::new(7)).is_none());
        assert!(lookup.category(CategoryId::new(0)).is_none());
    }

    #[test]
    fn test_every_parent_is_a_root() {
        let lookup = StaticCategories::new();
        for (_, parent, _) in CATEGORIES.iter().filter(|(_, p, _)| *p != 0) {
            let p = lookup.category(CategoryId::new(*parent)).unwrap();
            assert!(p.is_root());
        }
    }
}
