//! Identifier conversions used for summaries and parameter descriptions.

use once_cell::sync::Lazy;
use regex::Regex;

static SNAKE_BOUNDARY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^[A-Za-z])|_([A-Za-z])").unwrap());

/// Character classes used to split identifiers into words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    Other,
}

impl CharClass {
    fn of(c: char) -> Self {
        if c.is_lowercase() {
            CharClass::Lower
        } else if c.is_uppercase() {
            CharClass::Upper
        } else if c.is_ascii_digit() {
            CharClass::Digit
        } else {
            CharClass::Other
        }
    }
}

/// Converts `snake_case` to `CamelCase` (`story_id` becomes `StoryId`).
pub fn convert_to_camel_case(input: &str) -> String {
    SNAKE_BOUNDARY_REGEX
        .replace_all(input, |caps: &regex::Captures| caps[0].replace('_', "").to_uppercase())
        .to_string()
}

/// Splits a camel-case identifier into capitalized words (`tokenId` becomes `Token Id`,
/// `GetHTTPStatus` becomes `Get HTTP Status`).
pub fn convert_from_camel_case(input: &str) -> String {
    let mut runs: Vec<Vec<char>> = Vec::new();
    let mut last_class = None;

    for c in input.chars() {
        let class = CharClass::of(c);
        match runs.last_mut() {
            Some(run) if last_class == Some(class) => run.push(c),
            _ => runs.push(vec![c]),
        }
        last_class = Some(class);
    }

    // "HTTPStatus" splits as "HTTPS" + "tatus"; move the last capital over
    for i in 0..runs.len().saturating_sub(1) {
        let upper_then_lower = runs[i].first().is_some_and(|c| c.is_uppercase())
            && runs[i + 1].first().is_some_and(|c| c.is_lowercase());
        if upper_then_lower {
            if let Some(moved) = runs[i].pop() {
                runs[i + 1].insert(0, moved);
            }
        }
    }

    runs.into_iter()
        .filter(|run| !run.is_empty())
        .enumerate()
        .map(|(i, run)| {
            let word: String = run.into_iter().collect();
            if i == 0 {
                capitalize(&word)
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Human-readable description of a parameter or handler name.
pub fn humanize(name: &str) -> String {
    if name.contains('_') {
        convert_from_camel_case(&convert_to_camel_case(name))
    } else {
        convert_from_camel_case(name)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_to_camel_case() {
        assert_eq!(convert_to_camel_case("story_id"), "StoryId");
        assert_eq!(convert_to_camel_case("page_size_limit"), "PageSizeLimit");
        assert_eq!(convert_to_camel_case("plain"), "Plain");
    }

    #[test]
    fn test_convert_from_camel_case() {
        assert_eq!(convert_from_camel_case("tokenId"), "Token Id");
        assert_eq!(
            convert_from_camel_case("GetStoryAuthorization"),
            "Get Story Authorization"
        );
        assert_eq!(convert_from_camel_case("GetHTTPStatus"), "Get HTTP Status");
        assert_eq!(convert_from_camel_case("page2"), "Page 2");
        assert_eq!(convert_from_camel_case(""), "");
    }

    #[test]
    fn test_humanize_snake_case() {
        assert_eq!(humanize("story_id"), "Story Id");
        assert_eq!(humanize("storyId"), "Story Id");
        assert_eq!(humanize("type"), "Type");
    }
}
