//! Backtracking search executor.
//!
//! Runs a compiled program against a subject with an explicit choice-point
//! stack: `Split` pushes a saved engine state (program counter, input
//! position, capture and loop-mark snapshots), and failures pop the most
//! recent state instead of recursing. Resource use is bounded by data, not
//! call depth: exceeding the stack or step limits is a reported error, never
//! a crash.

use log::debug;

use crate::encoding::Encoding;
use crate::error::{ErrorInfo, ErrorKind};
use crate::options::Options;
use crate::program::{Inst, Regex, SubKind};
use crate::region::Region;
use crate::syntax::ast::AssertKind;
use crate::syntax::classes::{ClassSet, simple_uppercase};

/// Maximum live choice points.
const STACK_LIMIT: usize = 1 << 16;

/// Maximum instruction dispatches per search call.
const RETRY_LIMIT: usize = 10_000_000;

impl Regex {
    /// Search the whole of `subject` for the leftmost match at or after
    /// byte offset `at`.
    ///
    /// Returns the byte offset of the match start, `None` on no-match, and
    /// an error for invalid arguments, malformed subject bytes, or resource
    /// exhaustion. On success `region` is resized and overwritten with the
    /// capture spans.
    pub fn search(
        &self,
        subject: &[u8],
        at: usize,
        region: &mut Region,
        options: Options,
    ) -> Result<Option<usize>, ErrorInfo> {
        self.search_range(subject, 0, subject.len(), at, region, options)
    }

    /// Like [`Regex::search`], restricted to `range_start..range_end`.
    /// Anchors treat the range ends as the subject ends.
    pub fn search_range(
        &self,
        subject: &[u8],
        range_start: usize,
        range_end: usize,
        at: usize,
        region: &mut Region,
        options: Options,
    ) -> Result<Option<usize>, ErrorInfo> {
        if range_end > subject.len() || range_start > range_end || at < range_start || at > range_end
        {
            return Err(ErrorInfo::new(ErrorKind::InvalidArgument));
        }
        Engine::new(self, subject, range_start, range_end, options).search(at, region)
    }

    /// Anchored match at exactly `at`. Returns the match end offset.
    pub fn match_at(
        &self,
        subject: &[u8],
        at: usize,
        region: &mut Region,
        options: Options,
    ) -> Result<Option<usize>, ErrorInfo> {
        if at > subject.len() {
            return Err(ErrorInfo::new(ErrorKind::InvalidArgument));
        }
        let mut engine = Engine::new(self, subject, 0, subject.len(), options);
        match engine.attempt(at)? {
            Some(end) => {
                engine.fill_region(region, at, end);
                Ok(Some(end))
            }
            None => Ok(None),
        }
    }
}

/// A saved state to resume from on failure.
struct Choice {
    pc: usize,
    pos: usize,
    starts: Vec<Option<usize>>,
    ends: Vec<Option<usize>>,
    marks: Vec<usize>,
}

type Snapshot = (Vec<Option<usize>>, Vec<Option<usize>>, Vec<usize>);

struct Engine<'r, 's> {
    re: &'r Regex,
    enc: &'static dyn Encoding,
    subject: &'s [u8],
    range_start: usize,
    range_end: usize,
    ignorecase: bool,
    multiline: bool,
    singleline: bool,
    find_longest: bool,
    find_not_empty: bool,
    starts: Vec<Option<usize>>,
    ends: Vec<Option<usize>>,
    marks: Vec<usize>,
    steps: usize,
}

impl<'r, 's> Engine<'r, 's> {
    fn new(
        re: &'r Regex,
        subject: &'s [u8],
        range_start: usize,
        range_end: usize,
        options: Options,
    ) -> Self {
        let opts = re.options | options;
        Engine {
            re,
            enc: re.enc,
            subject,
            range_start,
            range_end,
            ignorecase: opts.contains(Options::IGNORECASE),
            multiline: opts.contains(Options::MULTILINE),
            singleline: opts.singleline(),
            find_longest: opts.contains(Options::FIND_LONGEST),
            find_not_empty: opts.contains(Options::FIND_NOT_EMPTY),
            starts: vec![None; re.groups + 1],
            ends: vec![None; re.groups + 1],
            marks: vec![0; re.marks],
            steps: 0,
        }
    }

    /// Leftmost search: anchor at `from`, advance code-point-wise.
    fn search(&mut self, from: usize, region: &mut Region) -> Result<Option<usize>, ErrorInfo> {
        let mut anchor = from;
        loop {
            if let Some(end) = self.attempt(anchor)? {
                self.fill_region(region, anchor, end);
                return Ok(Some(anchor));
            }
            if anchor >= self.range_end {
                break;
            }
            let (_, len) = self.enc.decode(self.subject, anchor)?;
            anchor += len;
            if anchor > self.range_end {
                break;
            }
        }
        Ok(None)
    }

    /// One match attempt anchored at `anchor`; returns the match end.
    fn attempt(&mut self, anchor: usize) -> Result<Option<usize>, ErrorInfo> {
        self.starts.fill(None);
        self.ends.fill(None);
        self.marks.fill(0);
        let re = self.re;
        let reject_empty = self.find_not_empty.then_some(anchor);
        self.run(&re.insts, anchor, None, self.find_longest, reject_empty)
    }

    fn fill_region(&self, region: &mut Region, start: usize, end: usize) {
        region.reset(self.re.groups + 1);
        region.set(0, Some((start, end)));
        for g in 1..=self.re.groups {
            if let (Some(s), Some(e)) = (self.starts[g], self.ends[g]) {
                region.set(g, Some((s, e)));
            }
        }
    }

    /// Execute `prog` from `at`.
    ///
    /// `must_end` constrains acceptable match ends (lookbehind bodies must
    /// end exactly at the lookbehind position). `longest` explores every
    /// success and keeps the longest. `reject_empty_at` refuses successes
    /// ending where they started.
    fn run(
        &mut self,
        prog: &[Inst],
        at: usize,
        must_end: Option<usize>,
        longest: bool,
        reject_empty_at: Option<usize>,
    ) -> Result<Option<usize>, ErrorInfo> {
        let re = self.re;
        let mut stack: Vec<Choice> = Vec::new();
        let mut best: Option<(usize, Vec<Option<usize>>, Vec<Option<usize>>)> = None;
        let mut pc: usize = 0;
        let mut pos = at;

        loop {
            self.steps += 1;
            if self.steps > RETRY_LIMIT {
                debug!("retry limit hit after {} steps", self.steps);
                return Err(ErrorInfo::new(ErrorKind::RetryLimitExceeded));
            }

            let advanced = match &prog[pc] {
                Inst::Literal(cps) => {
                    let mut p = pos;
                    let mut ok = true;
                    for &want in cps.iter() {
                        if p >= self.range_end {
                            ok = false;
                            break;
                        }
                        let (cp, len) = self.enc.decode(self.subject, p)?;
                        let eq = if self.ignorecase {
                            self.enc.fold_case(cp) == self.enc.fold_case(want)
                        } else {
                            cp == want
                        };
                        if !eq {
                            ok = false;
                            break;
                        }
                        p += len;
                    }
                    if ok {
                        pos = p;
                        pc += 1;
                    }
                    ok
                }

                Inst::Any => {
                    if pos >= self.range_end {
                        false
                    } else {
                        let (cp, len) = self.enc.decode(self.subject, pos)?;
                        if cp == '\n' as u32 && !self.multiline {
                            false
                        } else {
                            pos += len;
                            pc += 1;
                            true
                        }
                    }
                }

                Inst::Class(cs) => {
                    if pos >= self.range_end {
                        false
                    } else {
                        let (cp, len) = self.enc.decode(self.subject, pos)?;
                        if self.class_matches(cs, cp) {
                            pos += len;
                            pc += 1;
                            true
                        } else {
                            false
                        }
                    }
                }

                Inst::Assert(kind) => {
                    let ok = self.assert_holds(*kind, pos)?;
                    if ok {
                        pc += 1;
                    }
                    ok
                }

                Inst::GroupStart(g) => {
                    self.starts[*g as usize] = Some(pos);
                    self.ends[*g as usize] = None;
                    pc += 1;
                    true
                }

                Inst::GroupEnd(g) => {
                    self.ends[*g as usize] = Some(pos);
                    pc += 1;
                    true
                }

                Inst::Split {
                    preferred,
                    alternate,
                } => {
                    if stack.len() >= STACK_LIMIT {
                        debug!("choice stack limit hit at depth {}", stack.len());
                        return Err(ErrorInfo::new(ErrorKind::RetryLimitExceeded));
                    }
                    stack.push(Choice {
                        pc: *alternate as usize,
                        pos,
                        starts: self.starts.clone(),
                        ends: self.ends.clone(),
                        marks: self.marks.clone(),
                    });
                    pc = *preferred as usize;
                    true
                }

                Inst::Jump(target) => {
                    pc = *target as usize;
                    true
                }

                Inst::EmptyStart(mark) => {
                    self.marks[*mark as usize] = pos;
                    pc += 1;
                    true
                }

                Inst::EmptyEnd { mark, back } => {
                    if pos == self.marks[*mark as usize] {
                        // The iteration was zero-width; leave the loop.
                        pc += 1;
                    } else {
                        pc = *back as usize;
                    }
                    true
                }

                Inst::Backref(group) => {
                    let g = *group as usize;
                    if self.participated(g) {
                        match self.compare_span(g, pos)? {
                            Some(new_pos) => {
                                pos = new_pos;
                                pc += 1;
                                true
                            }
                            None => false,
                        }
                    } else {
                        false
                    }
                }

                Inst::NamedBackref(groups) => {
                    let mut matched = None;
                    for &g in groups.iter() {
                        let g = g as usize;
                        if self.participated(g)
                            && let Some(new_pos) = self.compare_span(g, pos)?
                        {
                            matched = Some(new_pos);
                            break;
                        }
                    }
                    match matched {
                        Some(new_pos) => {
                            pos = new_pos;
                            pc += 1;
                            true
                        }
                        None => false,
                    }
                }

                Inst::Sub { index, kind } => {
                    let sub = &re.subs[*index as usize];
                    match *kind {
                        SubKind::Atomic => {
                            let save = self.snapshot();
                            match self.run(sub, pos, None, false, None)? {
                                Some(end) => {
                                    pos = end;
                                    pc += 1;
                                    true
                                }
                                None => {
                                    self.restore(&save);
                                    false
                                }
                            }
                        }
                        SubKind::LookAhead { negative } => {
                            let save = self.snapshot();
                            let matched = self.run(sub, pos, None, false, None)?.is_some();
                            self.finish_look(matched, negative, &save, &mut pc)
                        }
                        SubKind::LookBehind {
                            negative,
                            min_chars,
                            max_chars,
                        } => {
                            let save = self.snapshot();
                            let matched =
                                self.look_behind_matches(sub, pos, min_chars, max_chars, &save)?;
                            self.finish_look(matched, negative, &save, &mut pc)
                        }
                    }
                }

                Inst::Match => {
                    let rejected = reject_empty_at == Some(pos)
                        || must_end.is_some_and(|end| pos != end);
                    if !rejected {
                        if !longest {
                            return Ok(Some(pos));
                        }
                        let better = best.as_ref().is_none_or(|(end, _, _)| pos > *end);
                        if better {
                            best = Some((pos, self.starts.clone(), self.ends.clone()));
                        }
                        // Keep exploring for a longer match.
                    }
                    false
                }
            };

            if advanced {
                continue;
            }
            match stack.pop() {
                Some(choice) => {
                    pc = choice.pc;
                    pos = choice.pos;
                    self.starts = choice.starts;
                    self.ends = choice.ends;
                    self.marks = choice.marks;
                }
                None => {
                    if let Some((end, starts, ends)) = best {
                        self.starts = starts;
                        self.ends = ends;
                        return Ok(Some(end));
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Shared tail of both lookaround kinds: keep captures only from a
    /// positive match, restore otherwise.
    fn finish_look(
        &mut self,
        matched: bool,
        negative: bool,
        save: &Snapshot,
        pc: &mut usize,
    ) -> bool {
        if matched != negative {
            if negative {
                self.restore(save);
            }
            *pc += 1;
            true
        } else {
            self.restore(save);
            false
        }
    }

    /// Try each candidate width, stepping back from `pos`; the body must
    /// end exactly at `pos`.
    fn look_behind_matches(
        &mut self,
        sub: &[Inst],
        pos: usize,
        min_chars: u32,
        max_chars: u32,
        save: &Snapshot,
    ) -> Result<bool, ErrorInfo> {
        let mut candidate = pos;
        let mut width = 0u32;
        while width < min_chars {
            match self.enc.step_back(self.subject, self.range_start, candidate) {
                Some(p) => {
                    candidate = p;
                    width += 1;
                }
                None => return Ok(false),
            }
        }
        loop {
            if self.run(sub, candidate, Some(pos), false, None)?.is_some() {
                return Ok(true);
            }
            self.restore(save);
            if width == max_chars {
                return Ok(false);
            }
            match self.enc.step_back(self.subject, self.range_start, candidate) {
                Some(p) => {
                    candidate = p;
                    width += 1;
                }
                None => return Ok(false),
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        (self.starts.clone(), self.ends.clone(), self.marks.clone())
    }

    fn restore(&mut self, save: &Snapshot) {
        self.starts.clone_from(&save.0);
        self.ends.clone_from(&save.1);
        self.marks.clone_from(&save.2);
    }

    fn participated(&self, group: usize) -> bool {
        self.starts[group].is_some() && self.ends[group].is_some()
    }

    /// Match the text of `group`'s capture again at `pos`; returns the new
    /// position. Comparison is per code point so case folding works across
    /// unequal byte lengths.
    fn compare_span(&self, group: usize, pos: usize) -> Result<Option<usize>, ErrorInfo> {
        let (mut ref_at, ref_end) = match (self.starts[group], self.ends[group]) {
            (Some(s), Some(e)) => (s, e),
            _ => return Ok(None),
        };
        let mut sub_at = pos;
        while ref_at < ref_end {
            if sub_at >= self.range_end {
                return Ok(None);
            }
            let (ref_cp, ref_len) = self.enc.decode(self.subject, ref_at)?;
            let (sub_cp, sub_len) = self.enc.decode(self.subject, sub_at)?;
            let eq = if self.ignorecase {
                self.enc.fold_case(ref_cp) == self.enc.fold_case(sub_cp)
            } else {
                ref_cp == sub_cp
            };
            if !eq {
                return Ok(None);
            }
            ref_at += ref_len;
            sub_at += sub_len;
        }
        Ok(Some(sub_at))
    }

    fn class_matches(&self, cs: &ClassSet, cp: u32) -> bool {
        if cs.contains(cp, self.enc) {
            return true;
        }
        self.ignorecase
            && (cs.contains(self.enc.fold_case(cp), self.enc)
                || cs.contains(simple_uppercase(cp), self.enc))
    }

    fn prev_char(&self, pos: usize) -> Result<Option<u32>, ErrorInfo> {
        match self.enc.step_back(self.subject, self.range_start, pos) {
            Some(p) => {
                let (cp, _) = self.enc.decode(self.subject, p)?;
                Ok(Some(cp))
            }
            None => Ok(None),
        }
    }

    fn assert_holds(&self, kind: AssertKind, pos: usize) -> Result<bool, ErrorInfo> {
        Ok(match kind {
            AssertKind::LineStart => {
                pos == self.range_start
                    || (!self.singleline && self.prev_char(pos)? == Some('\n' as u32))
            }
            AssertKind::LineEnd => {
                if pos == self.range_end {
                    true
                } else if self.singleline {
                    false
                } else {
                    let (cp, _) = self.enc.decode(self.subject, pos)?;
                    cp == '\n' as u32
                }
            }
            AssertKind::BufStart => pos == self.range_start,
            AssertKind::BufEnd => pos == self.range_end,
            AssertKind::BufEndOrNewline => {
                if pos == self.range_end {
                    true
                } else {
                    let (cp, len) = self.enc.decode(self.subject, pos)?;
                    cp == '\n' as u32 && pos + len == self.range_end
                }
            }
            AssertKind::WordBoundary | AssertKind::NotWordBoundary => {
                let before = match self.prev_char(pos)? {
                    Some(cp) => Some(self.enc.classify(cp).is_word()),
                    None => None,
                };
                let after = if pos < self.range_end {
                    let (cp, _) = self.enc.decode(self.subject, pos)?;
                    Some(self.enc.classify(cp).is_word())
                } else {
                    None
                };
                let boundary = match (before, after) {
                    (Some(b), Some(a)) => b != a,
                    (None, Some(a)) => a,
                    (Some(b), None) => b,
                    (None, None) => false,
                };
                if kind == AssertKind::WordBoundary {
                    boundary
                } else {
                    !boundary
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::encoding::{ISO_8859_1, UTF_16BE, UTF_8};

    fn find(pattern: &str, subject: &str) -> Option<usize> {
        let re = Regex::new(pattern).unwrap();
        let mut region = Region::new();
        re.search(subject.as_bytes(), 0, &mut region, Options::empty())
            .unwrap()
    }

    fn span(pattern: &str, subject: &str, group: usize) -> Option<(usize, usize)> {
        let re = Regex::new(pattern).unwrap();
        let mut region = Region::new();
        re.search(subject.as_bytes(), 0, &mut region, Options::empty())
            .unwrap()?;
        region.get(group)
    }

    fn find_opt(pattern: &str, subject: &str, options: Options) -> Option<(usize, usize)> {
        let re = Regex::with_options(pattern, options).unwrap();
        let mut region = Region::new();
        re.search(subject.as_bytes(), 0, &mut region, options)
            .unwrap()?;
        region.get(0)
    }

    // --- Literals and search positions ---

    #[test]
    fn literal_search_position() {
        assert_eq!(find("world", "hello world"), Some(6));
        assert_eq!(find("hello", "hello world"), Some(0));
    }

    #[test]
    fn no_match_is_none_not_error() {
        assert_eq!(find("xyz", "hello"), None);
    }

    #[test]
    fn search_from_offset_skips_earlier_matches() {
        let re = Regex::new("a").unwrap();
        let mut region = Region::new();
        let found = re
            .search(b"aba", 1, &mut region, Options::empty())
            .unwrap();
        assert_eq!(found, Some(2));
    }

    #[test]
    fn search_range_restricts_both_ends() {
        let re = Regex::new("a").unwrap();
        let mut region = Region::new();
        let found = re
            .search_range(b"abca", 1, 3, 1, &mut region, Options::empty())
            .unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn match_at_is_anchored() {
        let re = Regex::new("b").unwrap();
        let mut region = Region::new();
        assert_eq!(
            re.match_at(b"abc", 1, &mut region, Options::empty()).unwrap(),
            Some(2)
        );
        assert_eq!(
            re.match_at(b"abc", 0, &mut region, Options::empty()).unwrap(),
            None
        );
    }

    // --- Dot and options ---

    #[test]
    fn dot_excludes_newline_by_default() {
        assert_eq!(find("a.b", "a\nb"), None);
        assert_eq!(find("a.b", "axb"), Some(0));
    }

    #[test]
    fn multiline_dot_matches_newline() {
        assert_eq!(find_opt("a.b", "a\nb", Options::MULTILINE), Some((0, 3)));
    }

    #[test]
    fn ignorecase_literals() {
        assert_eq!(find_opt("hello", "say HeLLo", Options::IGNORECASE), Some((4, 9)));
    }

    #[test]
    fn ignorecase_applies_at_search_time() {
        let re = Regex::new("abc").unwrap();
        let mut region = Region::new();
        let found = re
            .search(b"xABCx", 0, &mut region, Options::IGNORECASE)
            .unwrap();
        assert_eq!(found, Some(1));
    }

    #[test]
    fn ignorecase_classes() {
        assert_eq!(find_opt("[a-z]+", "ABC", Options::IGNORECASE), Some((0, 3)));
        assert_eq!(find_opt("[A-Z]+", "abc", Options::IGNORECASE), Some((0, 3)));
    }

    // --- Anchors ---

    #[test]
    fn line_anchors() {
        assert_eq!(find("^hello", "hello world"), Some(0));
        assert_eq!(find("^hello", " hello"), None);
        assert_eq!(find("world$", "hello world"), Some(6));
        assert_eq!(find("world$", "hello world!"), None);
    }

    #[test]
    fn line_anchors_at_newlines() {
        assert_eq!(find("^line2", "line1\nline2"), Some(6));
        assert_eq!(find("line1$", "line1\nline2"), Some(0));
    }

    #[test]
    fn singleline_pins_anchors_to_subject_ends() {
        assert_eq!(
            find_opt("^line2", "line1\nline2", Options::SINGLELINE),
            None
        );
        assert_eq!(
            find_opt("^line1", "line1\nline2", Options::SINGLELINE),
            Some((0, 5))
        );
    }

    #[test]
    fn subject_anchors() {
        assert_eq!(find(r"\Ahello", "hello"), Some(0));
        assert_eq!(find(r"\Ahello", " hello"), None);
        assert_eq!(find(r"world\z", "hello world"), Some(6));
        assert_eq!(find(r"world\z", "hello world\n"), None);
        assert_eq!(find(r"world\Z", "hello world\n"), Some(6));
        assert_eq!(find(r"world\Z", "hello world"), Some(6));
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(find(r"\bfoo\b", "a foo bar"), Some(2));
        assert_eq!(find(r"\bfoo\b", "afoobar"), None);
        assert_eq!(find(r"\Boo\B", "afoobar"), Some(2));
    }

    // --- Quantifiers ---

    #[test]
    fn greedy_star_backtracks() {
        assert_eq!(span("a*a", "aaa", 0), Some((0, 3)));
        assert_eq!(span("a*", "aaa", 0), Some((0, 3)));
    }

    #[test]
    fn lazy_quantifier_prefers_short() {
        assert_eq!(span("a+?", "aaa", 0), Some((0, 1)));
        assert_eq!(span("a*?b", "aab", 0), Some((0, 3)));
    }

    #[test]
    fn bounded_repetition() {
        assert_eq!(span("a{2,3}", "aaaa", 0), Some((0, 3)));
        assert_eq!(find("a{3}", "aa"), None);
        assert_eq!(span("a{2,}", "aaaa", 0), Some((0, 4)));
    }

    #[test]
    fn optional_matches_empty() {
        assert_eq!(span("ab?c", "ac", 0), Some((0, 2)));
        assert_eq!(span("ab?c", "abc", 0), Some((0, 3)));
    }

    #[test]
    fn zero_length_match_has_equal_offsets() {
        assert_eq!(span("x*", "abc", 0), Some((0, 0)));
    }

    #[test]
    fn empty_pattern_matches_everywhere() {
        assert_eq!(span("", "abc", 0), Some((0, 0)));
        assert_eq!(span("", "", 0), Some((0, 0)));
    }

    #[test]
    fn star_of_optional_terminates() {
        // The loop guard must stop zero-width iterations.
        assert_eq!(span("(a?)*", "b", 0), Some((0, 0)));
        assert_eq!(span("(?:)*", "b", 0), Some((0, 0)));
    }

    // --- Alternation ---

    #[test]
    fn alternation_prefers_left_branch() {
        assert_eq!(span("ab|a", "ab", 0), Some((0, 2)));
        assert_eq!(span("a|ab", "ab", 0), Some((0, 1)));
    }

    #[test]
    fn alternation_backtracks_across_branches() {
        assert_eq!(span("(a|ab)c", "abc", 0), Some((0, 3)));
    }

    // --- Captures ---

    #[test]
    fn capture_offsets_in_subject_coordinates() {
        // Whole match "ab" at (1, 3); group 1 = (1, 2); group 2 = (2, 3).
        assert_eq!(span("(a)(b)", "xaby", 0), Some((1, 3)));
        assert_eq!(span("(a)(b)", "xaby", 1), Some((1, 2)));
        assert_eq!(span("(a)(b)", "xaby", 2), Some((2, 3)));
    }

    #[test]
    fn nested_groups() {
        assert_eq!(span("((a)b)", "ab", 1), Some((0, 2)));
        assert_eq!(span("((a)b)", "ab", 2), Some((0, 1)));
    }

    #[test]
    fn unparticipating_group_is_unset() {
        assert_eq!(span("(a)|(b)", "b", 0), Some((0, 1)));
        assert_eq!(span("(a)|(b)", "b", 1), None);
        assert_eq!(span("(a)|(b)", "b", 2), Some((0, 1)));
    }

    #[test]
    fn region_is_overwritten_per_search() {
        let re = Regex::new("(a)(b)?").unwrap();
        let mut region = Region::new();
        re.search(b"ab", 0, &mut region, Options::empty()).unwrap();
        assert_eq!(region.get(2), Some((1, 2)));
        re.search(b"a", 0, &mut region, Options::empty()).unwrap();
        assert_eq!(region.get(2), None);
    }

    // --- Backreferences ---

    #[test]
    fn numbered_backref() {
        assert_eq!(find(r"(foo)bar\1", "foobarfoo"), Some(0));
        assert_eq!(find(r"(foo)bar\1", "foobarbaz"), None);
    }

    #[test]
    fn backref_to_unset_group_fails() {
        assert_eq!(find(r"(?:(a)|b)\1", "bb"), None);
        assert_eq!(find(r"(?:(a)|b)\1", "aa"), Some(0));
    }

    #[test]
    fn backref_under_ignorecase() {
        assert_eq!(
            find_opt(r"(ab)\1", "aBAb", Options::IGNORECASE),
            Some((0, 4))
        );
    }

    #[test]
    fn named_backref() {
        assert_eq!(find(r"(?<q>'|`)\k<q>", "x`` "), Some(1));
        assert_eq!(find(r"(?<q>'|`)\k<q>", "x'` "), None);
    }

    #[test]
    fn multiplex_named_backref_uses_participating_group() {
        // Only one of the two groups named `q` participates per branch.
        let pattern = r"(?:(?<q>a)|(?<q>b))\k<q>";
        assert_eq!(find(pattern, "aa"), Some(0));
        assert_eq!(find(pattern, "bb"), Some(0));
        assert_eq!(find(pattern, "ab"), None);
    }

    // --- Atomic groups and possessive quantifiers ---

    #[test]
    fn atomic_group_forbids_backtracking_into_body() {
        assert_eq!(find("(?>a*)a", "aaa"), None);
        assert_eq!(find("(?>a*)b", "aaab"), Some(0));
    }

    #[test]
    fn possessive_quantifier() {
        assert_eq!(find("a*+a", "aaa"), None);
        assert_eq!(span("ab*+c", "abbc", 0), Some((0, 4)));
    }

    // --- Lookaround ---

    #[test]
    fn lookahead() {
        assert_eq!(span("foo(?=bar)", "foobar", 0), Some((0, 3)));
        assert_eq!(find("foo(?=bar)", "foobaz"), None);
        assert_eq!(span("foo(?!bar)", "foobaz", 0), Some((0, 3)));
        assert_eq!(find("foo(?!bar)", "foobar"), None);
    }

    #[test]
    fn lookbehind() {
        assert_eq!(span("(?<=foo)bar", "foobar", 0), Some((3, 6)));
        assert_eq!(find("(?<=foo)bar", "xxxbar"), None);
        assert_eq!(span("(?<!foo)bar", "xxxbar", 0), Some((3, 6)));
        assert_eq!(find("(?<!foo)bar", "foobar"), None);
    }

    #[test]
    fn variable_width_lookbehind() {
        assert_eq!(span("(?<=a|bc)d", "bcd", 0), Some((2, 3)));
        assert_eq!(span("(?<=a|bc)d", "ad", 0), Some((1, 2)));
    }

    #[test]
    fn lookahead_captures_persist() {
        assert_eq!(span(r"(?=(ab))a", "ab", 1), Some((0, 2)));
    }

    // --- FIND_LONGEST / FIND_NOT_EMPTY ---

    #[test]
    fn find_longest_keeps_longest_at_anchor() {
        assert_eq!(find_opt("a|ab", "xab", Options::FIND_LONGEST), Some((1, 3)));
        // Without the option the left branch wins.
        assert_eq!(find_opt("a|ab", "xab", Options::empty()), Some((1, 2)));
    }

    #[test]
    fn find_longest_still_prefers_leftmost_anchor() {
        assert_eq!(find_opt("ab|b", "ab", Options::FIND_LONGEST), Some((0, 2)));
    }

    #[test]
    fn find_not_empty_rejects_empty_matches() {
        // A pattern that can only match empty yields no match, not a crash.
        assert_eq!(find_opt("x*", "bbb", Options::FIND_NOT_EMPTY), None);
        // Where a non-empty match exists it is found instead.
        assert_eq!(
            find_opt("a*", "bba", Options::FIND_NOT_EMPTY),
            Some((2, 3))
        );
    }

    // --- Errors ---

    #[test]
    fn start_offset_past_end_is_invalid_argument() {
        let re = Regex::new("a").unwrap();
        let mut region = Region::new();
        let err = re
            .search(b"abc", 5, &mut region, Options::empty())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn inverted_range_is_invalid_argument() {
        let re = Regex::new("a").unwrap();
        let mut region = Region::new();
        let err = re
            .search_range(b"abc", 2, 1, 2, &mut region, Options::empty())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn invalid_subject_bytes_are_reported() {
        let re = Regex::new("b").unwrap();
        let mut region = Region::new();
        let err = re
            .search(b"a\xffb", 0, &mut region, Options::empty())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidByteSequence);
    }

    #[test]
    fn match_before_invalid_bytes_succeeds() {
        let re = Regex::new("a").unwrap();
        let mut region = Region::new();
        let found = re
            .search(b"a\xff", 0, &mut region, Options::empty())
            .unwrap();
        assert_eq!(found, Some(0));
    }

    #[test]
    fn catastrophic_backtracking_is_an_error_not_a_hang() {
        let re = Regex::new("(a|aa)*c").unwrap();
        let subject = "a".repeat(64);
        let mut region = Region::new();
        let err = re
            .search(subject.as_bytes(), 0, &mut region, Options::empty())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RetryLimitExceeded);
    }

    // --- Determinism ---

    #[test]
    fn identical_compiles_match_identically() {
        let a = Regex::new(r"(\w+)@(\w+)").unwrap();
        let b = Regex::new(r"(\w+)@(\w+)").unwrap();
        let subject = b"mail: someone@example";
        let mut ra = Region::new();
        let mut rb = Region::new();
        let fa = a.search(subject, 0, &mut ra, Options::empty()).unwrap();
        let fb = b.search(subject, 0, &mut rb, Options::empty()).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(ra, rb);
    }

    // --- Non-UTF-8 subjects ---

    #[test]
    fn utf16be_search_reports_byte_offsets() {
        fn utf16be(s: &str) -> Vec<u8> {
            s.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
        }
        let re = compile(&utf16be("ab"), UTF_16BE, Options::empty()).unwrap();
        let subject = utf16be("xab");
        let mut region = Region::new();
        let found = re.search(&subject, 0, &mut region, Options::empty()).unwrap();
        assert_eq!(found, Some(2));
        assert_eq!(region.get(0), Some((2, 6)));
    }

    #[test]
    fn latin1_ignorecase_folds_accents() {
        // É (0xC9) matches é (0xE9) under ISO-8859-1 folding.
        let re = compile(&[0xc9], ISO_8859_1, Options::IGNORECASE).unwrap();
        let mut region = Region::new();
        let found = re
            .search(&[0x20, 0xe9], 0, &mut region, Options::IGNORECASE)
            .unwrap();
        assert_eq!(found, Some(1));
    }

    #[test]
    fn utf8_multibyte_class_range() {
        let re = compile("[α-ω]+".as_bytes(), UTF_8, Options::empty()).unwrap();
        let subject = "αβγ".as_bytes();
        let mut region = Region::new();
        let found = re.search(subject, 0, &mut region, Options::empty()).unwrap();
        assert_eq!(found, Some(0));
        assert_eq!(region.get(0), Some((0, 6)));
    }

    #[test]
    fn anchor_advance_respects_code_point_boundaries() {
        // Searching for β must not try anchors inside α's bytes.
        let re = compile("β".as_bytes(), UTF_8, Options::empty()).unwrap();
        let subject = "αβ".as_bytes();
        let mut region = Region::new();
        let found = re.search(subject, 0, &mut region, Options::empty()).unwrap();
        assert_eq!(found, Some(2));
    }
}
