//! Pattern syntax: parsing encoded pattern bytes into an AST.
//!
//! # Pattern grammar
//!
//! | Construct       | Meaning                                          |
//! |-----------------|--------------------------------------------------|
//! | `ab`            | Concatenation                                    |
//! | `a\|b`          | Alternation                                      |
//! | `a*` `a+` `a?`  | Quantifiers (suffix `?` lazy, `+` possessive)    |
//! | `a{n}` `a{n,m}` | Bounded repetition                               |
//! | `[a-z]` `[^…]`  | Character class, negated class                   |
//! | `[[:alpha:]]`   | POSIX class inside a character class             |
//! | `\d \w \s` …    | Perl classes (upper-case negates)                |
//! | `.`             | Any character (newline only with MULTILINE)      |
//! | `^` `$`         | Line anchors                                     |
//! | `\A \z \Z`      | Subject-range anchors                            |
//! | `\b \B`         | Word boundary, non-boundary                      |
//! | `(a)`           | Capturing group                                  |
//! | `(?:a)`         | Non-capturing group                              |
//! | `(?<name>a)`    | Named group (also `(?P<name>a)`)                 |
//! | `(?>a)`         | Atomic group                                     |
//! | `(?=a)` `(?!a)` | Lookahead                                        |
//! | `(?<=a)` `(?<!a)` | Lookbehind (bounded length)                    |
//! | `(?#…)`         | Comment                                          |
//! | `\1` … `\k<name>` | Numbered and named backreferences              |
//! | `\xHH` `\x{…}`  | Code-point escapes                               |
//!
//! The parser reads the pattern through its encoding's decoder, so
//! multi-byte literals and group names are handled as code points, and every
//! error carries the byte offset where it was detected.

pub(crate) mod ast;
pub(crate) mod classes;
pub(crate) mod parser;
