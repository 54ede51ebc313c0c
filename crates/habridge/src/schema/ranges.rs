// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Fixed integer ranges for the transport schema.
//!
//! Bounds are compile-time constants keyed by width and signedness.
//! They are held as `i128` so the full `uint64` range fits alongside
//! the signed minima.

pub const INT8_MIN: i128 = i8::MIN as i128;
pub const INT8_MAX: i128 = i8::MAX as i128;
pub const INT16_MIN: i128 = i16::MIN as i128;
pub const INT16_MAX: i128 = i16::MAX as i128;
pub const INT32_MIN: i128 = i32::MIN as i128;
pub const INT32_MAX: i128 = i32::MAX as i128;
pub const INT64_MIN: i128 = i64::MIN as i128;
pub const INT64_MAX: i128 = i64::MAX as i128;

pub const UINT8_MIN: i128 = 0;
pub const UINT8_MAX: i128 = u8::MAX as i128;
pub const UINT16_MIN: i128 = 0;
pub const UINT16_MAX: i128 = u16::MAX as i128;
pub const UINT32_MIN: i128 = 0;
pub const UINT32_MAX: i128 = u32::MAX as i128;
pub const UINT64_MIN: i128 = 0;
pub const UINT64_MAX: i128 = u64::MAX as i128;

/// An inclusive integer range attached to an `int` schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: i128,
    pub max: i128,
}

impl IntRange {
    /// Check membership, inclusive on both ends.
    pub fn contains(&self, value: i128) -> bool {
        self.min <= value && value <= self.max
    }
}

/// The fixed primitive tag table (18 entries).
///
/// `octet`, `byte` and `char` all carry the 8-bit unsigned range.
/// `float`/`float32` and `double`/`float64` are alternate spellings the
/// middleware emits depending on the interface definition dialect.
pub const PRIMITIVE_TAGS: [&str; 18] = [
    "boolean", "octet", "byte", "char", "int8", "int16", "int32", "int64", "uint8", "uint16",
    "uint32", "uint64", "float", "float32", "double", "float64", "string", "wstring",
];

/// Whether `tag` is one of the fixed primitive names.
pub fn is_primitive(tag: &str) -> bool {
    PRIMITIVE_TAGS.contains(&tag)
}

/// The integer range for an integer-valued primitive tag, if any.
pub fn integer_range(tag: &str) -> Option<IntRange> {
    let (min, max) = match tag {
        "octet" | "byte" | "char" | "uint8" => (UINT8_MIN, UINT8_MAX),
        "int8" => (INT8_MIN, INT8_MAX),
        "int16" => (INT16_MIN, INT16_MAX),
        "int32" => (INT32_MIN, INT32_MAX),
        "int64" => (INT64_MIN, INT64_MAX),
        "uint16" => (UINT16_MIN, UINT16_MAX),
        "uint32" => (UINT32_MIN, UINT32_MAX),
        "uint64" => (UINT64_MIN, UINT64_MAX),
        _ => return None,
    };
    Some(IntRange { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_inclusive() {
        let r = integer_range("uint16").unwrap();
        assert!(r.contains(0));
        assert!(r.contains(65535));
        assert!(!r.contains(-1));
        assert!(!r.contains(65536));
    }

    #[test]
    fn octet_byte_char_share_the_u8_range() {
        for tag in ["octet", "byte", "char", "uint8"] {
            assert_eq!(integer_range(tag), Some(IntRange { min: 0, max: 255 }));
        }
    }

    #[test]
    fn non_integer_tags_have_no_range() {
        assert_eq!(integer_range("boolean"), None);
        assert_eq!(integer_range("float"), None);
        assert_eq!(integer_range("string"), None);
        assert_eq!(integer_range("sequence<uint8>"), None);
    }

    #[test]
    fn primitive_table_is_complete() {
        assert!(is_primitive("boolean"));
        assert!(is_primitive("wstring"));
        assert!(!is_primitive("std_msgs/Header"));
        assert_eq!(PRIMITIVE_TAGS.len(), 18);
    }
}
