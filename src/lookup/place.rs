//! Place-name extraction from free-text queries

/// Words that never name a place.
const STOP_WORDS: &[&str] = &[
    "weather", "in", "the", "what", "is", "are", "how", "for", "of", "and", "now", "today",
    "coordinates", "population", "many", "people", "live", "traffic", "jam", "tell", "about",
    "there", "right", "current", "like", "does", "where", "city", "bad", "show",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("sf", "San Francisco"),
    ("spb", "Saint Petersburg"),
    ("msk", "Moscow"),
    ("ny", "New York"),
    ("la", "Los Angeles"),
];

/// Known abbreviation first, otherwise the first non-stop word longer than
/// two characters, capitalised.
pub fn extract_place(query: &str) -> Option<String> {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    for word in &words {
        if let Some((_, full)) = ABBREVIATIONS.iter().find(|(abbr, _)| abbr == word) {
            return Some(full.to_string());
        }
    }

    words
        .iter()
        .find(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .map(|w| capitalise(w))
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
