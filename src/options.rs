//! Search and compile option bits.

use bitflags::bitflags;

bitflags! {
    /// Independent modifiers accepted at compile time and per search call.
    ///
    /// Compile-time options are baked into the [`Regex`](crate::Regex);
    /// search-time options are OR'd with them for the duration of one call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Options: u32 {
        /// Case-insensitive matching, folded per code point by the encoding.
        const IGNORECASE = 1 << 0;
        /// Extended syntax: unescaped whitespace and `#` comments in the
        /// pattern are ignored outside character classes.
        const EXTEND = 1 << 1;
        /// `.` also matches newline.
        const MULTILINE = 1 << 2;
        /// `^` and `$` match only at the ends of the subject range.
        const SINGLELINE = 1 << 3;
        /// Clears [`Options::SINGLELINE`] if a caller habitually sets it.
        const NEGATE_SINGLELINE = 1 << 4;
        /// Keep the longest match at the first anchor that matches at all.
        const FIND_LONGEST = 1 << 5;
        /// Reject zero-length matches.
        const FIND_NOT_EMPTY = 1 << 6;
        /// Plain `(...)` groups capture even when named groups are present.
        const CAPTURE_GROUP = 1 << 7;
        /// Plain `(...)` groups never capture.
        const DONT_CAPTURE_GROUP = 1 << 8;
    }
}

impl Options {
    /// Resolve the anchor mode: SINGLELINE unless NEGATE_SINGLELINE wins.
    pub(crate) fn singleline(self) -> bool {
        self.contains(Options::SINGLELINE) && !self.contains(Options::NEGATE_SINGLELINE)
    }
}
