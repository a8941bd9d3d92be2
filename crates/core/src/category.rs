use serde::{Deserialize, Serialize};

/// Tag color used when a fact names a category missing from the table.
pub const FALLBACK_COLOR: &str = "#78716c";

const DEFAULT_CATEGORIES: [(&str, &str); 8] = [
    ("technology", "#3b82f6"),
    ("science", "#16a34a"),
    ("finance", "#ef4444"),
    ("society", "#eab308"),
    ("entertainment", "#db2777"),
    ("health", "#14b8a6"),
    ("history", "#f97316"),
    ("news", "#8b5cf6"),
];

/// A topical label with its display color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub color: String,
}

/// Read-only, ordered lookup table of categories.
///
/// Built once and handed to whatever renders tags or validates
/// submissions. [`CategoryTable::default`] is the standard set of eight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTable {
    entries: Vec<Category>,
}

impl CategoryTable {
    /// Build a table from `(name, color)` pairs, keeping their order.
    ///
    /// Later duplicates of a name are ignored.
    pub fn new<N, C>(pairs: impl IntoIterator<Item = (N, C)>) -> Self
    where
        N: Into<String>,
        C: Into<String>,
    {
        let mut entries: Vec<Category> = Vec::new();
        for (name, color) in pairs {
            let name = name.into();
            if entries.iter().any(|c| c.name == name) {
                continue;
            }
            entries.push(Category {
                name,
                color: color.into(),
            });
        }
        Self { entries }
    }

    /// Find a category by exact name.
    pub fn lookup(&self, name: &str) -> Option<&Category> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Tag color for `name`, or [`FALLBACK_COLOR`] when it is unknown.
    pub fn color_or_fallback(&self, name: &str) -> &str {
        self.lookup(name)
            .map(|c| c.color.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORIES)
    }
}

/// Which slice of the fact table the board is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    /// The category name, or `None` for [`CategoryFilter::All`].
    pub fn category(&self) -> Option<&str> {
        match self {
            CategoryFilter::All => None,
            CategoryFilter::Category(name) => Some(name),
        }
    }

    /// Does a fact in `category` belong in this slice?
    pub fn matches(&self, category: &str) -> bool {
        self.category().is_none_or(|name| name == category)
    }
}

impl From<&str> for CategoryFilter {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            CategoryFilter::All
        } else {
            CategoryFilter::Category(s.to_string())
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(s: String) -> Self {
        CategoryFilter::from(s.as_str())
    }
}

impl From<CategoryFilter> for String {
    fn from(filter: CategoryFilter) -> Self {
        filter.to_string()
    }
}

impl std::fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.category().unwrap_or("all"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_eight_ordered_categories() {
        let table = CategoryTable::default();
        let names: Vec<&str> = table.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "technology",
                "science",
                "finance",
                "society",
                "entertainment",
                "health",
                "history",
                "news"
            ]
        );
        assert_eq!(table.lookup("science").unwrap().color, "#16a34a");
    }

    #[test]
    fn lookup_miss_is_explicit() {
        let table = CategoryTable::default();
        assert!(table.lookup("astrology").is_none());
        assert!(!table.contains("astrology"));
        assert_eq!(table.color_or_fallback("astrology"), FALLBACK_COLOR);
        assert_eq!(table.color_or_fallback("news"), "#8b5cf6");
    }

    #[test]
    fn custom_table_ignores_duplicate_names() {
        let table = CategoryTable::new([("a", "#000"), ("b", "#111"), ("a", "#222")]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.lookup("a").unwrap().color, "#000");
    }

    #[test]
    fn filter_parses_all_and_names() {
        assert_eq!(CategoryFilter::from("all"), CategoryFilter::All);
        assert_eq!(CategoryFilter::from("ALL"), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from("science"),
            CategoryFilter::Category("science".into())
        );
        assert_eq!(CategoryFilter::All.to_string(), "all");
    }

    #[test]
    fn filter_matches() {
        assert!(CategoryFilter::All.matches("news"));
        let science = CategoryFilter::from("science");
        assert!(science.matches("science"));
        assert!(!science.matches("news"));
    }
}
