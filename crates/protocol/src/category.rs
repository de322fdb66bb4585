use serde::{Deserialize, Serialize};

use crate::strings::SharedStr;

/// Named colors a category can be painted with. Renderers resolve these to
/// concrete values from their active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryColor {
    Transparent,
    Purple,
    Green,
    Orange,
    Yellow,
    LightBlue,
    Grey,
    Blue,
    Brown,
    Magenta,
    Red,
    LightRed,
    DarkGray,
}

/// One entry of a profile's category list, indexed by the call-node table's
/// `category` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: SharedStr,
    pub color: CategoryColor,
    /// Subcategory 0 is the unspecified subcategory.
    #[serde(default)]
    pub subcategories: Vec<SharedStr>,
}

impl Category {
    pub fn new(name: &str, color: CategoryColor) -> Self {
        Self {
            name: name.into(),
            color,
            subcategories: vec!["Other".into()],
        }
    }

    pub fn with_subcategories(mut self, subcategories: &[&str]) -> Self {
        self.subcategories = subcategories.iter().map(|&s| s.into()).collect();
        self
    }
}

/// Label for a category/subcategory pair, e.g. `"JavaScript: Baseline"`.
/// Subcategory 0 (or an unknown subcategory) shows only the category name.
pub fn category_pair_label(categories: &[Category], category: usize, subcategory: usize) -> String {
    let category = &categories[category];
    match category.subcategories.get(subcategory) {
        Some(name) if subcategory != 0 => format!("{}: {}", category.name, name),
        _ => category.name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category::new("Other", CategoryColor::Grey),
            Category::new("JavaScript", CategoryColor::Yellow)
                .with_subcategories(&["Other", "Baseline", "Ion"]),
        ]
    }

    #[test]
    fn pair_label_includes_subcategory() {
        let cats = categories();
        assert_eq!(category_pair_label(&cats, 1, 2), "JavaScript: Ion");
        assert_eq!(category_pair_label(&cats, 1, 0), "JavaScript");
        assert_eq!(category_pair_label(&cats, 0, 0), "Other");
    }

    #[test]
    fn colors_use_lowercase_names() {
        let json = serde_json::to_string(&CategoryColor::LightBlue).unwrap_or_default();
        assert_eq!(json, "\"lightblue\"");
    }
}
