//! Query engine: filtered, sorted views over a collection snapshot.
//!
//! Pure and deterministic. The search term and both filters compose
//! conjunctively; all sorts are stable, so ties keep collection order.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{WineRecord, WineType};

/// Wine type filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TypeFilter {
    /// No filtering.
    #[default]
    All,
    /// Nothing matches.
    None,
    /// Matches any of the selected types.
    AnyOf(BTreeSet<WineType>),
}

impl TypeFilter {
    /// Maps a multi-select chip selection onto a filter.
    ///
    /// An empty selection matches nothing and a full selection matches
    /// everything.
    pub fn from_selection(selected: &BTreeSet<WineType>) -> Self {
        if selected.is_empty() {
            TypeFilter::None
        } else if selected.len() == WineType::ALL.len() {
            TypeFilter::All
        } else {
            TypeFilter::AnyOf(selected.clone())
        }
    }

    pub fn only(wine_type: WineType) -> Self {
        TypeFilter::AnyOf(BTreeSet::from([wine_type]))
    }

    fn matches(&self, wine_type: WineType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::None => false,
            TypeFilter::AnyOf(types) => types.contains(&wine_type),
        }
    }
}

/// Cellar filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellarFilter {
    #[default]
    All,
    Only(bool),
}

impl CellarFilter {
    fn matches(&self, in_cellar: bool) -> bool {
        match self {
            CellarFilter::All => true,
            CellarFilter::Only(expected) => *expected == in_cellar,
        }
    }
}

/// Structured filters for a query. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub wine_type: TypeFilter,
    pub in_cellar: CellarFilter,
}

impl FilterOptions {
    /// Resets both filters.
    pub fn clear(&mut self) {
        *self = FilterOptions::default();
    }

    pub fn is_active(&self) -> bool {
        *self != FilterOptions::default()
    }
}

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOption {
    /// Most recently added first.
    #[default]
    DateAdded,
    /// Highest personal rating first.
    Rating,
    NameAz,
    NameZa,
}

/// A complete query: free-text search, filters and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WineQuery {
    pub search: String,
    pub filters: FilterOptions,
    pub sort: SortOption,
}

impl WineQuery {
    pub fn new(search: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: FilterOptions) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort(mut self, sort: SortOption) -> Self {
        self.sort = sort;
        self
    }

    /// Runs the query against a collection snapshot.
    ///
    /// Only an empty search term disables text matching; any other term,
    /// whitespace included, is matched as a literal substring.
    pub fn run<'a>(&self, records: &'a [WineRecord]) -> Vec<&'a WineRecord> {
        let term = self.search.to_lowercase();

        let mut wines: Vec<&WineRecord> = records
            .iter()
            .filter(|wine| term.is_empty() || matches_search(wine, &term))
            .filter(|wine| self.filters.wine_type.matches(wine.wine_type))
            .filter(|wine| self.filters.in_cellar.matches(wine.in_cellar))
            .collect();

        wines.sort_by(|a, b| compare(a, b, self.sort));
        wines
    }
}

/// Filters and sorts by date added, newest first.
pub fn filter_wines<'a>(
    records: &'a [WineRecord],
    search: &str,
    filters: &FilterOptions,
) -> Vec<&'a WineRecord> {
    WineQuery::new(search)
        .with_filters(filters.clone())
        .run(records)
}

/// Case-insensitive substring match on name, notes or varietal.
fn matches_search(wine: &WineRecord, term: &str) -> bool {
    [&wine.name, &wine.notes, &wine.varietal]
        .iter()
        .any(|field| field.to_lowercase().contains(term))
}

fn compare(a: &WineRecord, b: &WineRecord, sort: SortOption) -> Ordering {
    match sort {
        SortOption::DateAdded => b.date_added.cmp(&a.date_added),
        SortOption::Rating => b.rating.total_cmp(&a.rating),
        SortOption::NameAz => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortOption::NameZa => b.name.to_lowercase().cmp(&a.name.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WineId;
    use crate::normalize::normalize_document;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(id: &str, data: serde_json::Value) -> WineRecord {
        normalize_document(
            Some(id),
            &data,
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    fn scenario() -> Vec<WineRecord> {
        vec![
            doc(
                "1",
                json!({"name": "Chablis", "dateAdded": "2024-01-01", "varietal": "Chardonnay"}),
            ),
            doc(
                "2",
                json!({"name": "Malbec", "dateAdded": "2024-02-01", "varietal": "Malbec"}),
            ),
        ]
    }

    fn mixed() -> Vec<WineRecord> {
        vec![
            doc("r1", json!({"name": "Barolo", "wineType": "red", "inCellar": true, "rating": 4.5, "schemaVersion": 2, "dateAdded": "2024-03-01"})),
            doc("w1", json!({"name": "albariño", "wineType": "white", "rating": 3, "schemaVersion": 2, "dateAdded": "2024-03-02"})),
            doc("s1", json!({"name": "Cava", "wineType": "sparkling", "inCellar": true, "notes": "Party bubbles", "dateAdded": "2024-03-01"})),
            doc("x1", json!({"name": "Mystery", "dateAdded": "2024-02-15"})),
        ]
    }

    fn names(result: &[&WineRecord]) -> Vec<String> {
        result.iter().map(|w| w.name.clone()).collect()
    }

    #[test]
    fn test_no_filters_returns_all_newest_first() {
        let wines = scenario();
        let result = filter_wines(&wines, "", &FilterOptions::default());
        assert_eq!(names(&result), vec!["Malbec", "Chablis"]);
    }

    #[test]
    fn test_empty_collection() {
        let result = filter_wines(&[], "anything", &FilterOptions::default());
        assert!(result.is_empty());
    }

    #[test]
    fn test_search_matches_varietal_case_insensitive() {
        let wines = scenario();
        let result = filter_wines(&wines, "chard", &FilterOptions::default());
        assert_eq!(names(&result), vec!["Chablis"]);
    }

    #[test]
    fn test_search_matches_notes() {
        let wines = mixed();
        let result = filter_wines(&wines, "BUBBLES", &FilterOptions::default());
        assert_eq!(names(&result), vec!["Cava"]);
    }

    #[test]
    fn test_whitespace_search_is_a_literal_term() {
        let wines = vec![
            doc("p", json!({"name": "Pinot Noir", "dateAdded": "2024-02-01"})),
            doc("m", json!({"name": "Malbec", "dateAdded": "2024-01-01"})),
        ];
        let result = filter_wines(&wines, " ", &FilterOptions::default());
        assert_eq!(names(&result), vec!["Pinot Noir"]);
        assert!(filter_wines(&wines, "   ", &FilterOptions::default()).is_empty());
    }

    #[test]
    fn test_type_filter_without_matches() {
        let wines = scenario();
        let filters = FilterOptions {
            wine_type: TypeFilter::only(WineType::Red),
            ..FilterOptions::default()
        };
        assert!(filter_wines(&wines, "", &filters).is_empty());
    }

    #[test]
    fn test_type_none_is_always_empty() {
        let wines = mixed();
        for cellar in [CellarFilter::All, CellarFilter::Only(true), CellarFilter::Only(false)] {
            let filters = FilterOptions {
                wine_type: TypeFilter::None,
                in_cellar: cellar,
            };
            assert!(filter_wines(&wines, "", &filters).is_empty());
            assert!(filter_wines(&wines, "a", &filters).is_empty());
        }
    }

    #[test]
    fn test_multi_type_selection_matches_any() {
        let wines = mixed();
        let selected = BTreeSet::from([WineType::Red, WineType::Sparkling]);
        let filters = FilterOptions {
            wine_type: TypeFilter::from_selection(&selected),
            ..FilterOptions::default()
        };
        let result = filter_wines(&wines, "", &filters);
        assert_eq!(names(&result), vec!["Barolo", "Cava"]);
    }

    #[test]
    fn test_full_selection_is_no_filter() {
        let selected: BTreeSet<WineType> = WineType::ALL.into_iter().collect();
        assert_eq!(TypeFilter::from_selection(&selected), TypeFilter::All);
        assert_eq!(TypeFilter::from_selection(&BTreeSet::new()), TypeFilter::None);

        let wines = mixed();
        let filters = FilterOptions {
            wine_type: TypeFilter::from_selection(&selected),
            ..FilterOptions::default()
        };
        assert_eq!(filter_wines(&wines, "", &filters).len(), wines.len());
    }

    #[test]
    fn test_five_of_six_types_still_filters() {
        let selected: BTreeSet<WineType> = WineType::ALL
            .into_iter()
            .filter(|t| *t != WineType::Unknown)
            .collect();
        let wines = mixed();
        let filters = FilterOptions {
            wine_type: TypeFilter::from_selection(&selected),
            ..FilterOptions::default()
        };
        let result = filter_wines(&wines, "", &filters);
        assert!(!names(&result).contains(&"Mystery".to_string()));
        assert_eq!(result.len(), 3);
    }

    #[test]
    fn test_cellar_filter_composes_with_search() {
        let wines = mixed();
        let filters = FilterOptions {
            in_cellar: CellarFilter::Only(true),
            ..FilterOptions::default()
        };
        assert_eq!(names(&filter_wines(&wines, "", &filters)), vec!["Barolo", "Cava"]);
        assert_eq!(names(&filter_wines(&wines, "cava", &filters)), vec!["Cava"]);
        assert!(filter_wines(&wines, "mystery", &filters).is_empty());
    }

    #[test]
    fn test_date_ties_keep_collection_order() {
        let wines = mixed();
        let result = filter_wines(&wines, "", &FilterOptions::default());
        assert_eq!(names(&result), vec!["albariño", "Barolo", "Cava", "Mystery"]);
    }

    #[test]
    fn test_other_sorts() {
        let wines = mixed();
        let by_rating = WineQuery::default().with_sort(SortOption::Rating).run(&wines);
        assert_eq!(by_rating[0].id, WineId::new("r1"));
        assert_eq!(by_rating[1].id, WineId::new("w1"));

        let az = WineQuery::default().with_sort(SortOption::NameAz).run(&wines);
        assert_eq!(names(&az), vec!["albariño", "Barolo", "Cava", "Mystery"]);

        let za = WineQuery::default().with_sort(SortOption::NameZa).run(&wines);
        assert_eq!(names(&za), vec!["Mystery", "Cava", "Barolo", "albariño"]);
    }

    #[test]
    fn test_clear_filters() {
        let mut filters = FilterOptions {
            wine_type: TypeFilter::None,
            in_cellar: CellarFilter::Only(true),
        };
        assert!(filters.is_active());
        filters.clear();
        assert!(!filters.is_active());
    }
}
