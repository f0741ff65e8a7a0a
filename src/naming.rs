//! Directory-name parsing for the `N.name` ordering convention.
//!
//! Every page directory follows the same pattern: an optional numeric prefix
//! terminated by a dot (`1.`, `020.`) followed by the page name. The prefix is
//! what puts a page into sibling and navigation order; directories without one
//! are *floating*. This module provides the single parsing function that splits
//! both parts consistently.
//!
//! ## Display Names
//!
//! Hyphens in the name portion become spaces and every word is title-cased:
//! - `1.getting-started/` → "Getting Started"
//! - `about-us/` → "About Us"
//! - `2.FAQ/` → "FAQ" (all-caps words are kept)

/// Result of parsing a page directory name like `2.getting-started`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// True if the name carries a numeric ordering prefix (`^[0-9]+\.`).
    pub ordered: bool,
    /// Name with the ordering prefix stripped, hyphens preserved.
    /// For floating entries this is the full input.
    pub name: String,
    /// Display title: hyphens → spaces, title-cased.
    pub display_title: String,
}

/// Parse a directory name following the `N.name` convention.
///
/// - `"1.intro"` → ordered, name="intro", display_title="Intro"
/// - `"010.getting-started"` → ordered, name="getting-started", display_title="Getting Started"
/// - `"3."` → ordered, name="", display_title=""
/// - `"alpha"` → floating, name="alpha"
/// - `"12"` → floating (no dot), name="12"
/// - `"v1.2"` → floating (prefix is not all digits), name="v1.2"
pub fn parse_entry_name(dir_name: &str) -> ParsedName {
    let digits = dir_name.bytes().take_while(u8::is_ascii_digit).count();
    let (ordered, name) = if digits > 0 && dir_name.as_bytes().get(digits) == Some(&b'.') {
        (true, &dir_name[digits + 1..])
    } else {
        (false, dir_name)
    };

    ParsedName {
        ordered,
        name: name.to_string(),
        display_title: title_case(&name.replace('-', " ")),
    }
}

/// Title-case every whitespace-separated word.
///
/// Words that are entirely upper-case are treated as acronyms and left alone.
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let has_lower = word.chars().any(char::is_lowercase);
            let has_upper = word.chars().any(char::is_uppercase);
            if has_upper && !has_lower {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_single_word() {
        let p = parse_entry_name("1.intro");
        assert!(p.ordered);
        assert_eq!(p.name, "intro");
        assert_eq!(p.display_title, "Intro");
    }

    #[test]
    fn ordered_multi_word() {
        let p = parse_entry_name("010.getting-started");
        assert!(p.ordered);
        assert_eq!(p.name, "getting-started");
        assert_eq!(p.display_title, "Getting Started");
    }

    #[test]
    fn ordered_with_empty_name() {
        let p = parse_entry_name("3.");
        assert!(p.ordered);
        assert_eq!(p.name, "");
        assert_eq!(p.display_title, "");
    }

    #[test]
    fn floating_plain_name() {
        let p = parse_entry_name("alpha");
        assert!(!p.ordered);
        assert_eq!(p.name, "alpha");
        assert_eq!(p.display_title, "Alpha");
    }

    #[test]
    fn digits_without_dot_are_floating() {
        let p = parse_entry_name("12");
        assert!(!p.ordered);
        assert_eq!(p.name, "12");
    }

    #[test]
    fn dash_separator_is_not_a_prefix() {
        let p = parse_entry_name("010-Landscapes");
        assert!(!p.ordered);
        assert_eq!(p.name, "010-Landscapes");
    }

    #[test]
    fn version_like_names_are_floating() {
        let p = parse_entry_name("v1.2");
        assert!(!p.ordered);
        assert_eq!(p.name, "v1.2");
    }

    #[test]
    fn only_first_prefix_is_stripped() {
        let p = parse_entry_name("1.2.three");
        assert!(p.ordered);
        assert_eq!(p.name, "2.three");
    }

    #[test]
    fn very_long_prefix_still_orders() {
        let p = parse_entry_name("000000000000000000000001.deep");
        assert!(p.ordered);
        assert_eq!(p.name, "deep");
    }

    #[test]
    fn title_case_lowercases_tail() {
        assert_eq!(title_case("hELLO wORLD"), "Hello World");
    }

    #[test]
    fn title_case_keeps_acronyms() {
        assert_eq!(title_case("the FAQ page"), "The FAQ Page");
    }

    #[test]
    fn title_case_preserves_double_spaces() {
        assert_eq!(title_case("a  b"), "A  B");
    }
}
