//! Query term parsing and matching.
//!
//! - Multi-term AND queries with the '+' operator
//! - ASCII case-insensitive matching

/// Split a search box string on `+` into lowercased AND terms.
/// Blank pieces are dropped, so `"tokio + "` is just `["tokio"]` and a
/// query of only spaces and separators yields no terms at all.
pub fn parse_search_terms(query: &str) -> Vec<String> {
    query
        .split('+')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Check if text contains a search term (ASCII case-insensitive)
pub fn text_contains_term(text: &str, term: &str) -> bool {
    let term_chars: Vec<char> = term.chars().collect();
    if term_chars.is_empty() {
        return true;
    }

    let text_chars: Vec<char> = text.chars().collect();
    text_chars.windows(term_chars.len()).any(|window| {
        window
            .iter()
            .zip(&term_chars)
            .all(|(c, t)| c.eq_ignore_ascii_case(t))
    })
}
