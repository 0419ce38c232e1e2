//! Canonical file names for stored items.
//!
//! An item named `name` with id `id` is stored as
//! `<sanitized name>_<id>.xml`, where sanitizing replaces every maximal run
//! of whitespace with a single underscore. The mapping runs both ways: at
//! startup the id is parsed back out of each file name, which is how the
//! index is rebuilt from the directory alone.

use crate::item::{Item, ItemId};
use regex::Regex;
use std::sync::LazyLock;

/// Extension of every stored item file.
pub const EXTENSION: &str = ".xml";

/// Runs of ASCII whitespace (space, tab, newline, vertical tab, form feed,
/// carriage return).
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\n\x0B\x0C\r ]+").expect("valid whitespace pattern"));

/// Names recognised as stored items during the startup scan.
static ITEM_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_\-]*_(\d+)\.xml$").expect("valid item file pattern")
});

/// Replaces each run of whitespace in `name` with a single underscore.
#[must_use]
pub fn sanitize(name: &str) -> String {
    WHITESPACE_RUN.replace_all(name, "_").into_owned()
}

/// Builds the canonical file name for a name/id pair.
#[must_use]
pub fn file_name(name: &str, id: ItemId) -> String {
    format!("{}_{id}{EXTENSION}", sanitize(name))
}

/// Builds the canonical file name for an item from its current name.
#[must_use]
pub fn file_name_for(item: &dyn Item) -> String {
    file_name(item.name(), item.id())
}

/// Extracts the item id from a stored file name.
///
/// Returns `None` for anything that does not match the item file pattern,
/// including ids too large for [`ItemId`].
#[must_use]
pub fn parse_id(file_name: &str) -> Option<ItemId> {
    ITEM_FILE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

/// Returns whether a file written for `name` would be found again by
/// [`parse_id`].
///
/// Blank names and names with characters outside `[A-Za-z0-9_-]` (after
/// sanitizing) are not recoverable.
#[must_use]
pub fn is_recoverable_name(name: &str) -> bool {
    !name.trim().is_empty()
        && sanitize(name)
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("Pin", "Pin")]
    #[case::single_space("Pin Map", "Pin_Map")]
    #[case::collapsed_run("Pin   Map", "Pin_Map")]
    #[case::mixed_whitespace("Pin \t\n Map", "Pin_Map")]
    #[case::leading("  Pin", "_Pin")]
    #[case::trailing("Pin ", "Pin_")]
    #[case::existing_underscore("Pin_ Map", "Pin__Map")]
    fn sanitize_collapses_whitespace(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitize(name), expected);
    }

    #[test]
    fn file_name_matches_documented_example() {
        assert_eq!(file_name("Pin Map", 7), "Pin_Map_7.xml");
    }

    #[test]
    fn file_name_has_no_leading_zeros() {
        assert_eq!(file_name("a", 0), "a_0.xml");
        assert_eq!(file_name("a", 10), "a_10.xml");
    }

    #[rstest]
    #[case::canonical("Pin_Map_7.xml", Some(7))]
    #[case::hyphen("mesh-data_12.xml", Some(12))]
    #[case::empty_name("_3.xml", Some(3))]
    #[case::trailing_underscore_part("a_1_2.xml", Some(2))]
    #[case::leading_zeros("a_007.xml", Some(7))]
    #[case::unrelated("notes.txt", None)]
    #[case::no_id("Pin_Map.xml", None)]
    #[case::no_separator("PinMap7.xml", None)]
    #[case::wrong_extension("Pin_Map_7.json", None)]
    #[case::temp_file("Pin_Map_7.xml.tmp", None)]
    #[case::space("Pin Map_7.xml", None)]
    #[case::non_ascii("caf\u{e9}_7.xml", None)]
    #[case::negative("a_-7.xml", None)]
    #[case::overflow("a_99999999999999999999999.xml", None)]
    fn parse_id_cases(#[case] file: &str, #[case] expected: Option<ItemId>) {
        assert_eq!(parse_id(file), expected);
    }

    #[rstest]
    #[case::plain("Pin Map", true)]
    #[case::hyphenated("mesh-2 data", true)]
    #[case::blank("   ", false)]
    #[case::empty("", false)]
    #[case::slash("a/b", false)]
    #[case::parens("Reactor (v2)", false)]
    #[case::accent("caf\u{e9}", false)]
    fn recoverable_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_recoverable_name(name), expected);
    }

    proptest! {
        #[test]
        fn recoverable_names_round_trip_their_id(
            name in "[a-zA-Z0-9_\\- \t]{0,24}[a-zA-Z0-9]",
            id in any::<u64>(),
        ) {
            prop_assume!(is_recoverable_name(&name));
            prop_assert_eq!(parse_id(&file_name(&name, id)), Some(id));
        }

        #[test]
        fn sanitized_names_contain_no_whitespace(name in "\\PC{0,32}") {
            let sanitized = sanitize(&name);
            prop_assert!(!sanitized.contains([' ', '\t', '\n', '\r', '\x0B', '\x0C']));
        }

        #[test]
        fn sanitize_is_idempotent(name in "\\PC{0,32}") {
            let once = sanitize(&name);
            prop_assert_eq!(sanitize(&once), once);
        }
    }
}
