//! A backtracking regular expression engine over explicitly encoded byte
//! buffers, with named capture groups and reusable match regions.
//!
//! Patterns are compiled against one of six built-in encodings (ASCII,
//! ISO-8859-1, UTF-8, UTF-16BE/LE, UTF-32BE/LE) and searched against byte
//! buffers in that encoding. All offsets, in and out, are byte positions.
//!
//! # Example
//!
//! ```rust
//! use onibi::{Options, Regex, Region};
//!
//! let re = Regex::new(r"(?<word>\w+)-(\d+)").unwrap();
//! let mut region = Region::new();
//!
//! let start = re
//!     .search(b"item abc-42", 0, &mut region, Options::empty())
//!     .unwrap();
//! assert_eq!(start, Some(5));
//! assert_eq!(region.get(0), Some((5, 11)));
//! assert_eq!(region.get(1), Some((5, 8)));
//! assert_eq!(re.group_numbers("word"), &[1]);
//! ```

mod compile;
mod encoding;
mod error;
mod exec;
mod find;
mod names;
mod options;
mod program;
mod region;
mod syntax;

pub use compile::compile;
pub use encoding::{
    ASCII, CharKind, Encoding, ISO_8859_1, UTF_8, UTF_16BE, UTF_16LE, UTF_32BE, UTF_32LE,
    builtin_encodings, initialize,
};
pub use error::{ErrorInfo, ErrorKind};
pub use find::{Match, Matches};
pub use names::NameTable;
pub use options::Options;
pub use program::Regex;
pub use region::Region;
