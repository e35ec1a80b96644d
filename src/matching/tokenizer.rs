//! Product-name tokenizer

/// Characters that separate tokens besides whitespace
const SEPARATORS: [char; 9] = ['-', '\u{2014}', ',', '(', ')', '[', ']', '{', '}'];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || SEPARATORS.contains(&c)
}

/// Split a raw product name into ordered, non-blank tokens
pub fn tokenize(name: &str) -> Vec<String> {
    name.split(is_separator)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
