//! Context for cellar-aware recommendations.

use crate::models::WineRecord;

/// Personal ratings at or above this count as liked.
pub const LIKED_THRESHOLD: f64 = 4.0;

/// The slices of the collection a recommendation prompt is grounded on.
#[derive(Debug, Clone, Default)]
pub struct RecommendationContext<'a> {
    pub cellar_wines: Vec<&'a WineRecord>,
    pub liked_wines: Vec<&'a WineRecord>,
}

impl<'a> RecommendationContext<'a> {
    pub fn from_collection(records: &'a [WineRecord]) -> Self {
        Self {
            cellar_wines: records.iter().filter(|w| w.in_cellar).collect(),
            liked_wines: records
                .iter()
                .filter(|w| w.rating >= LIKED_THRESHOLD)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cellar_wines.is_empty() && self.liked_wines.is_empty()
    }

    /// Renders both lists as plain text for a prompt.
    pub fn render(&self) -> String {
        let mut out = String::from("Wines in my cellar:\n");
        push_lines(&mut out, &self.cellar_wines);
        out.push_str("\nWines I rated highly:\n");
        push_lines(&mut out, &self.liked_wines);
        out
    }

    /// Full prompt for a user question.
    pub fn prompt(&self, question: &str) -> String {
        format!(
            "You are a friendly sommelier helping me choose wine. Use my cellar and ratings below. \
             Prefer wines from my cellar when they fit; otherwise recommend new wines similar to the ones I liked. \
             Answer in concise Markdown.\n\n{}\nQuestion: {}",
            self.render(),
            question.trim()
        )
    }
}

fn push_lines(out: &mut String, wines: &[&WineRecord]) {
    if wines.is_empty() {
        out.push_str("- (none)\n");
        return;
    }
    for wine in wines {
        out.push_str(&format!(
            "- {} {} ({}, {}, {})",
            wine.name,
            wine.vintage_label(),
            if wine.varietal.is_empty() { "unknown varietal" } else { wine.varietal.as_str() },
            if wine.country.is_empty() { "unknown country" } else { wine.country.as_str() },
            wine.wine_type,
        ));
        if wine.is_rated() {
            out.push_str(&format!(", my rating {:.1}/5", wine.rating));
        }
        if wine.price > 0.0 {
            out.push_str(&format!(", about ${:.0}", wine.price));
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_document;
    use chrono::Utc;
    use serde_json::json;

    fn collection() -> Vec<WineRecord> {
        let now = Utc::now();
        vec![
            normalize_document(Some("1"), &json!({"name": "Barolo", "inCellar": true, "rating": 3, "schemaVersion": 2, "vintage": 2016, "wineType": "red"}), now),
            normalize_document(Some("2"), &json!({"name": "Sancerre", "rating": 4.5, "schemaVersion": 2, "price": 32}), now),
            normalize_document(Some("3"), &json!({"name": "Plonk", "rating": 2, "schemaVersion": 2}), now),
        ]
    }

    #[test]
    fn test_context_selection() {
        let wines = collection();
        let ctx = RecommendationContext::from_collection(&wines);
        assert_eq!(ctx.cellar_wines.len(), 1);
        assert_eq!(ctx.cellar_wines[0].name, "Barolo");
        assert_eq!(ctx.liked_wines.len(), 1);
        assert_eq!(ctx.liked_wines[0].name, "Sancerre");
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_render_includes_details() {
        let wines = collection();
        let text = RecommendationContext::from_collection(&wines).render();
        assert!(text.contains("- Barolo 2016 (unknown varietal, unknown country, red), my rating 3.0/5"));
        assert!(text.contains("Sancerre N/V"));
        assert!(text.contains("about $32"));
        assert!(!text.contains("Plonk"));
    }

    #[test]
    fn test_empty_context_prompt() {
        let ctx = RecommendationContext::from_collection(&[]);
        assert!(ctx.is_empty());
        let prompt = ctx.prompt("  Pasta tonight?  ");
        assert!(prompt.contains("- (none)"));
        assert!(prompt.ends_with("Question: Pasta tonight?"));
    }
}
