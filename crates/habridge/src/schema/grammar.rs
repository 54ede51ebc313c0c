// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! The two mini-grammars embedded in middleware type tags.
//!
//! A field's type tag is either a fixed primitive name, a sequence form
//! `sequence<elem>`, or a qualified path `package/TypeName`. Callers try
//! the sequence form first, then the qualified path, whenever a tag is
//! not one of the primitive names. Both parsers are strict: the whole
//! input must match or the parse is rejected.

/// Parse a `sequence<elem>` tag, returning the element tag.
///
/// The element tag may itself be a primitive name or a qualified path,
/// so the inner character set admits `/` in addition to word characters.
pub fn parse_sequence(tag: &str) -> Option<&str> {
    let inner = tag.strip_prefix("sequence<")?.strip_suffix('>')?;
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'/') {
        return None;
    }
    Some(inner)
}

/// Parse a `package/TypeName` tag, returning `(package, type_name)`.
pub fn parse_message_path(tag: &str) -> Option<(&str, &str)> {
    let (package, name) = tag.split_once('/')?;
    if package.is_empty() || name.is_empty() {
        return None;
    }
    let word = |s: &str| s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !word(package) || !word(name) {
        return None;
    }
    Some((package, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_of_primitive() {
        assert_eq!(parse_sequence("sequence<uint16>"), Some("uint16"));
        assert_eq!(parse_sequence("sequence<string>"), Some("string"));
    }

    #[test]
    fn sequence_of_message_path() {
        assert_eq!(
            parse_sequence("sequence<geometry_msgs/Point>"),
            Some("geometry_msgs/Point")
        );
    }

    #[test]
    fn sequence_rejects_non_sequences() {
        assert_eq!(parse_sequence("uint16"), None);
        assert_eq!(parse_sequence("sequence<>"), None);
        assert_eq!(parse_sequence("sequence<uint16"), None);
        assert_eq!(parse_sequence("sequence<a b>"), None);
        // Bounded sequences are not part of the grammar.
        assert_eq!(parse_sequence("sequence<uint8, 10>"), None);
    }

    #[test]
    fn message_path() {
        assert_eq!(
            parse_message_path("std_msgs/Header"),
            Some(("std_msgs", "Header"))
        );
        assert_eq!(parse_message_path("a_b/C_1"), Some(("a_b", "C_1")));
    }

    #[test]
    fn message_path_rejects_partial_matches() {
        assert_eq!(parse_message_path("uint16"), None);
        assert_eq!(parse_message_path("/Header"), None);
        assert_eq!(parse_message_path("std_msgs/"), None);
        assert_eq!(parse_message_path("a/b/c"), None);
        assert_eq!(parse_message_path("pkg/Name extra"), None);
    }
}
