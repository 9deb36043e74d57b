/// Banned-term detection for message content

/// Split lowercased text into word tokens (runs of alphanumerics or `_`)
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

/// Check text against the banned terms.
/// Returns the first term, in configuration order, that matches.
///
/// Single words only match whole tokens ("ass" does not match "class").
/// Terms containing a space are phrases and match anywhere in the text.
pub fn detect<'a>(text: &str, banned_terms: &'a [String]) -> Option<&'a str> {
    let text_lower = text.to_lowercase();
    let words: Vec<&str> = tokens(&text_lower).collect();

    for term in banned_terms {
        let term_lower = term.to_lowercase();
        if term_lower.is_empty() {
            continue;
        }

        if words.contains(&term_lower.as_str()) {
            return Some(term.as_str());
        }

        // Phrases are checked against the raw lowercased text
        if term_lower.contains(' ') && text_lower.contains(&term_lower) {
            return Some(term.as_str());
        }
    }

    None
}
