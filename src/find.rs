//! Iteration over successive matches.

use crate::error::ErrorInfo;
use crate::options::Options;
use crate::program::Regex;
use crate::region::Region;

/// One match, holding its capture spans and a view of the subject.
#[derive(Debug, Clone)]
pub struct Match<'s> {
    subject: &'s [u8],
    region: Region,
}

impl<'s> Match<'s> {
    /// Byte offset of the match start.
    pub fn start(&self) -> usize {
        self.region.get(0).map(|(s, _)| s).unwrap_or(0)
    }

    /// Byte offset one past the match end.
    pub fn end(&self) -> usize {
        self.region.get(0).map(|(_, e)| e).unwrap_or(0)
    }

    /// The matched bytes.
    pub fn as_bytes(&self) -> &'s [u8] {
        &self.subject[self.start()..self.end()]
    }

    /// The span of capture group `index` (0 = whole match), or `None` when
    /// the group did not participate.
    pub fn group_span(&self, index: usize) -> Option<(usize, usize)> {
        self.region.get(index)
    }

    /// The bytes captured by group `index`.
    pub fn group(&self, index: usize) -> Option<&'s [u8]> {
        let (start, end) = self.region.get(index)?;
        Some(&self.subject[start..end])
    }

    /// All capture spans.
    pub fn region(&self) -> &Region {
        &self.region
    }
}

/// Iterator over non-overlapping matches, left to right.
///
/// Yields `Err` once and stops if a search fails (malformed subject bytes,
/// retry limit); plain exhaustion ends the iteration silently.
pub struct Matches<'r, 's> {
    re: &'r Regex,
    subject: &'s [u8],
    options: Options,
    at: usize,
    region: Region,
    done: bool,
}

impl Regex {
    /// Iterate all matches in `subject`.
    pub fn find_iter<'r, 's>(&'r self, subject: &'s [u8], options: Options) -> Matches<'r, 's> {
        Matches {
            re: self,
            subject,
            options,
            at: 0,
            region: Region::new(),
            done: false,
        }
    }
}

impl<'s> Iterator for Matches<'_, 's> {
    type Item = Result<Match<'s>, ErrorInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.at > self.subject.len() {
            return None;
        }
        match self
            .re
            .search(self.subject, self.at, &mut self.region, self.options)
        {
            Ok(Some(_)) => {
                let (start, end) = self.region.get(0).expect("match has a whole-match span");
                if end == start {
                    // Advance one code point past a zero-length match.
                    if end >= self.subject.len() {
                        self.done = true;
                    } else {
                        match self.re.encoding().decode(self.subject, end) {
                            Ok((_, len)) => self.at = end + len,
                            Err(err) => {
                                self.done = true;
                                return Some(Err(err));
                            }
                        }
                    }
                } else {
                    self.at = end;
                }
                Some(Ok(Match {
                    subject: self.subject,
                    region: self.region.clone(),
                }))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
