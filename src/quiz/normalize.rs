use icu_normalizer::DecomposingNormalizerBorrowed;

/// Letters that carry a diacritic but have no canonical decomposition, so
/// stripping combining marks never reaches them. Extend per language.
const SUBSTITUTIONS: &[(char, char)] = &[('ł', 'l')];

fn is_combining_diacritic(ch: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&ch)
}

fn is_word_or_space(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch.is_whitespace()
}

fn substitute(ch: char) -> char {
    SUBSTITUTIONS
        .iter()
        .find(|(from, _)| *from == ch)
        .map(|(_, to)| *to)
        .unwrap_or(ch)
}

/// Canonicalize free-text input for comparison.
///
/// Internal whitespace runs are kept as typed: `"hello world"` and
/// `"hello   world"` normalize differently.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let decomposed = DecomposingNormalizerBorrowed::new_nfd().normalize(&lowered);
    let stripped: String = decomposed
        .chars()
        .filter(|&ch| !is_combining_diacritic(ch))
        .map(substitute)
        .filter(|&ch| is_word_or_space(ch))
        .collect();
    stripped.trim().to_string()
}

pub fn compare(user: &str, correct: &str) -> bool {
    normalize(user) == normalize(correct)
}
