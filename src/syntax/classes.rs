//! Character class sets and membership tests.

use phf::{Map, phf_map};

use crate::encoding::{CharKind, Encoding};

/// A character class: a possibly negated union of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ClassSet {
    pub negated: bool,
    pub items: Vec<ClassItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClassItem {
    Single(u32),
    Range(u32, u32),
    /// A named class; `negated` covers `\D`, `\W`, `\S` and `[:^alpha:]`.
    Kind { kind: ClassKind, negated: bool },
}

/// Named classes: the Perl escapes plus the POSIX bracket names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClassKind {
    Word,
    Digit,
    Space,
    Alnum,
    Alpha,
    Blank,
    Cntrl,
    Graph,
    Lower,
    Print,
    Punct,
    Upper,
    XDigit,
    Ascii,
}

/// POSIX bracket names, `[:alpha:]` style.
pub(crate) static POSIX_CLASSES: Map<&'static str, ClassKind> = phf_map! {
    "alnum" => ClassKind::Alnum,
    "alpha" => ClassKind::Alpha,
    "ascii" => ClassKind::Ascii,
    "blank" => ClassKind::Blank,
    "cntrl" => ClassKind::Cntrl,
    "digit" => ClassKind::Digit,
    "graph" => ClassKind::Graph,
    "lower" => ClassKind::Lower,
    "print" => ClassKind::Print,
    "punct" => ClassKind::Punct,
    "space" => ClassKind::Space,
    "upper" => ClassKind::Upper,
    "word" => ClassKind::Word,
    "xdigit" => ClassKind::XDigit,
};

impl ClassSet {
    /// The class for a standalone Perl escape like `\d` or `\W`.
    pub(crate) fn from_kind(kind: ClassKind, negated: bool) -> Self {
        Self {
            negated: false,
            items: vec![ClassItem::Kind { kind, negated }],
        }
    }

    /// Membership test for one code point.
    pub(crate) fn contains(&self, cp: u32, enc: &dyn Encoding) -> bool {
        let base = self.items.iter().any(|item| item.matches(cp, enc));
        if self.negated { !base } else { base }
    }
}

impl ClassItem {
    fn matches(&self, cp: u32, enc: &dyn Encoding) -> bool {
        match self {
            ClassItem::Single(c) => *c == cp,
            ClassItem::Range(lo, hi) => *lo <= cp && cp <= *hi,
            ClassItem::Kind { kind, negated } => {
                let base = kind_matches(*kind, cp, enc);
                if *negated { !base } else { base }
            }
        }
    }
}

fn kind_matches(kind: ClassKind, cp: u32, enc: &dyn Encoding) -> bool {
    let class = enc.classify(cp);
    match kind {
        ClassKind::Word => class.is_word(),
        ClassKind::Digit => class == CharKind::Digit,
        ClassKind::Space => class == CharKind::Space,
        ClassKind::Alnum => class.is_word() && cp != '_' as u32,
        ClassKind::Alpha => class == CharKind::Word && cp != '_' as u32,
        ClassKind::Blank => cp == 0x20 || cp == 0x09,
        ClassKind::Cntrl => cp < 0x20 || cp == 0x7f,
        ClassKind::Graph => cp > 0x20 && cp != 0x7f && class != CharKind::Space,
        ClassKind::Lower => is_cased_letter(cp) && enc.fold_case(cp) == cp,
        ClassKind::Print => cp >= 0x20 && cp != 0x7f && (cp < 0x80 || class != CharKind::Other),
        ClassKind::Punct => cp < 0x80 && is_ascii_punct(cp),
        ClassKind::Upper => is_cased_letter(cp) && enc.fold_case(cp) != cp,
        ClassKind::XDigit => {
            (0x30..=0x39).contains(&cp) || (0x41..=0x46).contains(&cp) || (0x61..=0x66).contains(&cp)
        }
        ClassKind::Ascii => cp < 0x80,
    }
}

fn is_ascii_punct(cp: u32) -> bool {
    let b = cp as u8;
    b.is_ascii_punctuation()
}

/// True for letters that participate in case at all.
fn is_cased_letter(cp: u32) -> bool {
    match char::from_u32(cp) {
        Some(c) => c.is_lowercase() || c.is_uppercase(),
        None => false,
    }
}

/// The simple single-character uppercase counterpart, identity if none.
///
/// Used by case-insensitive class matching to try the raised form of a code
/// point alongside its folded form.
pub(crate) fn simple_uppercase(cp: u32) -> u32 {
    let Some(c) = char::from_u32(cp) else {
        return cp;
    };
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u as u32,
        _ => cp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::UTF_8;

    fn class(items: Vec<ClassItem>) -> ClassSet {
        ClassSet {
            negated: false,
            items,
        }
    }

    #[test]
    fn single_and_range() {
        let cs = class(vec![
            ClassItem::Single('x' as u32),
            ClassItem::Range('0' as u32, '9' as u32),
        ]);
        assert!(cs.contains('x' as u32, UTF_8));
        assert!(cs.contains('5' as u32, UTF_8));
        assert!(!cs.contains('y' as u32, UTF_8));
    }

    #[test]
    fn negated_set() {
        let cs = ClassSet {
            negated: true,
            items: vec![ClassItem::Range('a' as u32, 'z' as u32)],
        };
        assert!(!cs.contains('m' as u32, UTF_8));
        assert!(cs.contains('M' as u32, UTF_8));
    }

    #[test]
    fn perl_digit_and_negation() {
        let digit = ClassSet::from_kind(ClassKind::Digit, false);
        assert!(digit.contains('3' as u32, UTF_8));
        assert!(!digit.contains('a' as u32, UTF_8));

        let not_digit = ClassSet::from_kind(ClassKind::Digit, true);
        assert!(!not_digit.contains('3' as u32, UTF_8));
        assert!(not_digit.contains('a' as u32, UTF_8));
    }

    #[test]
    fn posix_names_resolve() {
        assert_eq!(POSIX_CLASSES.get("alpha"), Some(&ClassKind::Alpha));
        assert_eq!(POSIX_CLASSES.get("xdigit"), Some(&ClassKind::XDigit));
        assert_eq!(POSIX_CLASSES.get("bogus"), None);
    }

    #[test]
    fn upper_and_lower_track_case() {
        let upper = ClassSet::from_kind(ClassKind::Upper, false);
        assert!(upper.contains('A' as u32, UTF_8));
        assert!(!upper.contains('a' as u32, UTF_8));
        assert!(!upper.contains('_' as u32, UTF_8));

        let lower = ClassSet::from_kind(ClassKind::Lower, false);
        assert!(lower.contains('a' as u32, UTF_8));
        assert!(!lower.contains('A' as u32, UTF_8));
    }

    #[test]
    fn alpha_excludes_underscore_and_digits() {
        let alpha = ClassSet::from_kind(ClassKind::Alpha, false);
        assert!(alpha.contains('q' as u32, UTF_8));
        assert!(!alpha.contains('_' as u32, UTF_8));
        assert!(!alpha.contains('4' as u32, UTF_8));
    }

    #[test]
    fn simple_uppercase_round_trip() {
        assert_eq!(simple_uppercase('a' as u32), 'A' as u32);
        assert_eq!(simple_uppercase('é' as u32), 'É' as u32);
        assert_eq!(simple_uppercase('7' as u32), '7' as u32);
    }
}
