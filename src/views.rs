//! Derived, read-only views over the item collection.
//!
//! Everything here is a pure function of the items and a [`ViewState`]. The
//! results borrow from the items and are meant to be recomputed whenever the
//! store or the selection changes, never cached across mutations.
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::library::{ContentItem, Platform};

/// Label shown for items with no category or subcategory.
pub const UNSET_LABEL: &str = "(unset)";

// ============================================================================
// View Selection
// ============================================================================

/// Which named filter is active. Category views carry their filter value, so
/// a category view without one cannot be expressed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    Home,
    Favorites,
    Archived,
    Unwatched,
    Category(String),
    /// Filters on `subcategory` alone; `category` records where the user
    /// navigated from.
    Subcategory {
        category: String,
        subcategory: String,
    },
    Settings,
}

/// Transient selection state passed into every derivation. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub view: ActiveView,
    /// Non-empty query overrides `view` entirely.
    pub search: String,
    /// Unwatched first, then newest first within each group.
    pub unwatched_first: bool,
}

impl ViewState {
    pub fn new(view: ActiveView) -> Self {
        Self {
            view,
            ..Default::default()
        }
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search = query.into();
        self
    }

    pub fn with_unwatched_first(mut self, on: bool) -> Self {
        self.unwatched_first = on;
        self
    }

    pub fn is_searching(&self) -> bool {
        !self.search.is_empty()
    }
}

// ============================================================================
// Category Tree
// ============================================================================

/// One top-level category and the distinct subcategories seen under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBranch<'a> {
    /// `None` is the unset bucket.
    pub category: Option<&'a str>,
    pub subcategories: BTreeSet<Option<&'a str>>,
}

/// Category → subcategories among non-archived items.
///
/// Categories appear in order of first occurrence in `items`; archived items
/// never contribute a category or a subcategory.
pub fn category_tree(items: &[ContentItem]) -> Vec<CategoryBranch<'_>> {
    let mut tree: Vec<CategoryBranch<'_>> = Vec::new();
    for item in items.iter().filter(|i| !i.is_archived) {
        let category = item.category.as_deref();
        let subcategory = item.subcategory.as_deref();
        match tree.iter_mut().find(|b| b.category == category) {
            Some(branch) => {
                branch.subcategories.insert(subcategory);
            }
            None => tree.push(CategoryBranch {
                category,
                subcategories: BTreeSet::from([subcategory]),
            }),
        }
    }
    tree
}

// ============================================================================
// Filtering and Sorting
// ============================================================================

fn matches_search(item: &ContentItem, needle: &str) -> bool {
    item.title.to_lowercase().contains(needle)
        || item
            .category
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(needle))
}

fn matches_view(item: &ContentItem, view: &ActiveView) -> bool {
    match view {
        ActiveView::Archived => item.is_archived,
        _ if item.is_archived => false,
        ActiveView::Favorites => item.is_favorite,
        ActiveView::Unwatched => !item.watched,
        ActiveView::Category(name) => item.category.as_deref() == Some(name.as_str()),
        ActiveView::Subcategory { subcategory, .. } => {
            item.subcategory.as_deref() == Some(subcategory.as_str())
        }
        ActiveView::Home | ActiveView::Settings => true,
    }
}

/// The items to show for a selection.
///
/// 1. A non-empty search matches title or category, case-insensitively, and
///    includes archived items.
/// 2. Otherwise the active view filters; every view except `Archived` hides
///    archived items.
/// 3. With `unwatched_first` the result is stably sorted unwatched-first and
///    newest-first inside each group; otherwise store order is kept.
pub fn filtered_items<'a>(items: &'a [ContentItem], state: &ViewState) -> Vec<&'a ContentItem> {
    let mut result: Vec<&ContentItem> = if state.is_searching() {
        let needle = state.search.to_lowercase();
        items.iter().filter(|i| matches_search(i, &needle)).collect()
    } else {
        items
            .iter()
            .filter(|i| matches_view(i, &state.view))
            .collect()
    };

    if state.unwatched_first {
        result.sort_by(|a, b| {
            a.watched
                .cmp(&b.watched)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
    }
    result
}

// ============================================================================
// Facet Counts
// ============================================================================

/// A navigational facet that gets a badge count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet<'a> {
    Favorites,
    Archived,
    Unwatched,
    Category(Option<&'a str>),
    Subcategory(Option<&'a str>),
    Platform(Platform),
}

/// Count items in a facet. Archived items only count toward `Archived`.
pub fn count(items: &[ContentItem], facet: Facet<'_>) -> usize {
    items
        .iter()
        .filter(|i| match facet {
            Facet::Archived => i.is_archived,
            _ if i.is_archived => false,
            Facet::Favorites => i.is_favorite,
            Facet::Unwatched => !i.watched,
            Facet::Category(c) => i.category.as_deref() == c,
            Facet::Subcategory(s) => i.subcategory.as_deref() == s,
            Facet::Platform(p) => i.platform == p,
        })
        .count()
}

/// Display label for a category or subcategory bucket.
pub fn bucket_label(bucket: Option<&str>) -> &str {
    bucket.unwrap_or(UNSET_LABEL)
}

/// Heading for the list a selection produces.
pub fn view_title(state: &ViewState) -> Cow<'_, str> {
    if state.is_searching() {
        return Cow::Borrowed("Search Index");
    }
    match &state.view {
        ActiveView::Home => Cow::Borrowed("Central Index"),
        ActiveView::Favorites => Cow::Borrowed("Priority Hub"),
        ActiveView::Unwatched => Cow::Borrowed("Queue"),
        ActiveView::Archived => Cow::Borrowed("Archive"),
        ActiveView::Settings => Cow::Borrowed("Settings"),
        ActiveView::Category(name) => Cow::Borrowed(name.as_str()),
        ActiveView::Subcategory { subcategory, .. } => Cow::Borrowed(subcategory.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Classification;
    use pretty_assertions::assert_eq;

    fn item(id: &str, title: &str, category: &str, subcategory: &str, ts: i64) -> ContentItem {
        let mut it = ContentItem::new(
            format!("https://example.com/{id}"),
            Classification {
                title: title.to_string(),
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                ..Default::default()
            },
        );
        it.id = id.to_string();
        it.timestamp = ts;
        it
    }

    fn ids(items: &[&ContentItem]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    fn library() -> Vec<ContentItem> {
        let mut items = vec![
            item("e", "Morning Yoga", "Fitness", "Yoga", 50),
            item("d", "Rust Async", "Tech", "Rust", 40),
            item("c", "Old Talk", "Tech", "Talks", 30),
            item("b", "Career Tips", "Career", "Advice", 20),
            item("a", "Go Generics", "Tech", "Go", 10),
        ];
        items[1].is_favorite = true;
        items[2].is_archived = true;
        items[2].is_favorite = true;
        items[3].watched = true;
        items
    }

    #[test]
    fn test_home_excludes_archived_and_keeps_order() {
        let items = library();
        let result = filtered_items(&items, &ViewState::default());
        assert_eq!(ids(&result), vec!["e", "d", "b", "a"]);
    }

    #[test]
    fn test_favorites_view() {
        let items = library();
        let result = filtered_items(&items, &ViewState::new(ActiveView::Favorites));
        assert_eq!(ids(&result), vec!["d"]);
    }

    #[test]
    fn test_archived_view_ignores_other_flags() {
        let items = library();
        let result = filtered_items(&items, &ViewState::new(ActiveView::Archived));
        assert_eq!(ids(&result), vec!["c"]);
    }

    #[test]
    fn test_unwatched_view() {
        let items = library();
        let result = filtered_items(&items, &ViewState::new(ActiveView::Unwatched));
        assert_eq!(ids(&result), vec!["e", "d", "a"]);
    }

    #[test]
    fn test_category_view() {
        let items = library();
        let state = ViewState::new(ActiveView::Category("Tech".into()));
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["d", "a"]);
    }

    #[test]
    fn test_subcategory_view_matches_subcategory_only() {
        let mut items = library();
        items.push(item("f", "Rust in Games", "Entertainment", "Rust", 5));
        let state = ViewState::new(ActiveView::Subcategory {
            category: "Tech".into(),
            subcategory: "Rust".into(),
        });
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["d", "f"]);
    }

    #[test]
    fn test_settings_view_behaves_like_home() {
        let items = library();
        let settings = filtered_items(&items, &ViewState::new(ActiveView::Settings));
        let home = filtered_items(&items, &ViewState::default());
        assert_eq!(ids(&settings), ids(&home));
    }

    #[test]
    fn test_search_overrides_view_and_includes_archived() {
        let items = library();
        let state = ViewState::new(ActiveView::Favorites).with_search("TALK");
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["c"]);
    }

    #[test]
    fn test_search_matches_category() {
        let items = library();
        let state = ViewState::default().with_search("tech");
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["d", "c", "a"]);
    }

    #[test]
    fn test_search_tolerates_unset_category() {
        let mut items = library();
        items[0].category = None;
        let state = ViewState::default().with_search("yoga");
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["e"]);
    }

    #[test]
    fn test_unwatched_first_sort() {
        let mut items = library();
        items[0].watched = true; // e, ts 50
        let state = ViewState::default().with_unwatched_first(true);
        // unwatched: d(40), a(10); watched: e(50), b(20)
        assert_eq!(ids(&filtered_items(&items, &state)), vec!["d", "a", "e", "b"]);
    }

    #[test]
    fn test_category_tree() {
        let items = library();
        let tree = category_tree(&items);

        let names: Vec<_> = tree.iter().map(|b| b.category).collect();
        assert_eq!(names, vec![Some("Fitness"), Some("Tech"), Some("Career")]);

        let tech = &tree[1];
        // "Talks" belongs only to the archived item
        assert_eq!(
            tech.subcategories,
            BTreeSet::from([Some("Go"), Some("Rust")])
        );
    }

    #[test]
    fn test_category_tree_unset_bucket() {
        let mut items = library();
        items[0].category = None;
        items[0].subcategory = None;
        let tree = category_tree(&items);
        assert_eq!(tree[0].category, None);
        assert_eq!(tree[0].subcategories, BTreeSet::from([None]));
        assert_eq!(bucket_label(tree[0].category), UNSET_LABEL);
    }

    #[test]
    fn test_counts() {
        let items = library();
        assert_eq!(count(&items, Facet::Favorites), 1);
        assert_eq!(count(&items, Facet::Archived), 1);
        assert_eq!(count(&items, Facet::Unwatched), 3);
        assert_eq!(count(&items, Facet::Category(Some("Tech"))), 2);
        assert_eq!(count(&items, Facet::Subcategory(Some("Talks"))), 0);
        assert_eq!(count(&items, Facet::Category(None)), 0);
        assert_eq!(count(&items, Facet::Platform(Platform::Other)), 4);
    }

    #[test]
    fn test_view_titles() {
        assert_eq!(view_title(&ViewState::default()), "Central Index");
        assert_eq!(
            view_title(&ViewState::new(ActiveView::Favorites)),
            "Priority Hub"
        );
        assert_eq!(
            view_title(&ViewState::new(ActiveView::Category("Tech".into()))),
            "Tech"
        );
        assert_eq!(
            view_title(&ViewState::default().with_search("x")),
            "Search Index"
        );
    }
}
