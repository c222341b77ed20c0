use crate::constants::READING_WORDS_PER_MINUTE;

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis when cut.
/// Whitespace runs are collapsed so multi-line bodies read as one line.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let cut: String = collapsed.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

/// Estimated reading time in whole minutes (never less than 1).
pub fn reading_time_mins(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    let minutes = (words as f64 / READING_WORDS_PER_MINUTE as f64).ceil() as u32;
    minutes.max(1)
}
