//! Plain-text and export formatting for the CLI.

use vinoteca_core::WineRecord;

/// CSV header matching [`csv_row`].
pub const CSV_HEADER: &str = "id,name,vintage,varietal,country,wine_type,rating,public_rating,review_count,rating_source,price,in_cellar,notes,date_added,last_updated";

/// One CSV line for a record.
pub fn csv_row(wine: &WineRecord) -> String {
    [
        escape_csv(wine.id.as_str()),
        escape_csv(&wine.name),
        wine.vintage.to_string(),
        escape_csv(&wine.varietal),
        escape_csv(&wine.country),
        wine.wine_type.to_string(),
        wine.rating.to_string(),
        wine.public_rating.to_string(),
        wine.review_count.to_string(),
        escape_csv(&wine.rating_source),
        wine.price.to_string(),
        wine.in_cellar.to_string(),
        escape_csv(&wine.notes),
        wine.date_added.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        wine.last_updated.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    ]
    .join(",")
}

/// Escape a string for CSV output
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Collapse whitespace and cut to `max_chars` characters, adding an ellipsis
/// if needed.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.chars().count() <= max_chars {
        cleaned
    } else {
        let cut: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

/// Half-star rating as stars, e.g. `★★★½`.
pub fn rating_stars(rating: f64) -> String {
    if rating <= 0.0 {
        return "unrated".to_string();
    }
    let halves = (rating * 2.0).round() as usize;
    let mut stars = "★".repeat(halves / 2);
    if halves % 2 == 1 {
        stars.push('½');
    }
    stars
}

/// One-line summary used by `list`.
pub fn summary_line(index: usize, wine: &WineRecord) -> String {
    let mut line = format!(
        "{}. {} {} [{}] {}",
        index,
        wine.name,
        wine.vintage_label(),
        wine.wine_type,
        rating_stars(wine.rating)
    );
    if wine.in_cellar {
        line.push_str(" (in cellar)");
    }
    line
}
