//! Recursive descent parser for pattern strings.
//!
//! The parser reads the pattern through its [`Encoding`]'s decoder, so every
//! construct is recognized on decoded code points (a `|` in UTF-16BE is the
//! two bytes `00 7C`) and every error is tagged with the byte offset where it
//! was detected.

use crate::encoding::Encoding;
use crate::error::{ErrorInfo, ErrorKind};
use crate::options::Options;

use super::ast::*;
use super::classes::{ClassItem, ClassKind, ClassSet, POSIX_CLASSES};

/// Largest count accepted in a `{n,m}` repetition.
const MAX_REPEAT: u32 = 100_000;

/// Parse a pattern into an AST. Group numbering and backreference
/// resolution happen later, in the compiler.
pub(crate) fn parse(
    pattern: &[u8],
    enc: &'static dyn Encoding,
    options: Options,
) -> Result<Node, ErrorInfo> {
    let mut parser = Parser {
        pattern,
        enc,
        pos: 0,
        options,
    };
    let node = parser.parse_alternation()?;
    if parser.pos < pattern.len() {
        // An unmatched ')' stopped the top-level parse.
        return Err(parser.error(ErrorKind::UnmatchedParen));
    }
    Ok(node)
}

struct Parser<'p> {
    pattern: &'p [u8],
    enc: &'static dyn Encoding,
    pos: usize,
    options: Options,
}

/// One resolved element inside a character class.
enum ClassAtom {
    Char(u32),
    Kind { kind: ClassKind, negated: bool },
}

impl Parser<'_> {
    fn error(&self, kind: ErrorKind) -> ErrorInfo {
        ErrorInfo::in_input(kind, self.pos, self.pattern)
    }

    fn error_at(&self, kind: ErrorKind, offset: usize) -> ErrorInfo {
        ErrorInfo::in_input(kind, offset, self.pattern)
    }

    /// Decode the code point at `offset` without consuming it.
    fn decode_at(&self, offset: usize) -> Result<Option<(u32, usize)>, ErrorInfo> {
        if offset >= self.pattern.len() {
            return Ok(None);
        }
        self.enc
            .decode(self.pattern, offset)
            .map(Some)
            .map_err(|e| self.error_at(ErrorKind::InvalidByteSequence, e.offset.unwrap_or(offset)))
    }

    fn peek(&self) -> Result<Option<(u32, usize)>, ErrorInfo> {
        self.decode_at(self.pos)
    }

    /// Consume and return the next code point.
    fn next_char(&mut self) -> Result<Option<u32>, ErrorInfo> {
        match self.peek()? {
            Some((cp, len)) => {
                self.pos += len;
                Ok(Some(cp))
            }
            None => Ok(None),
        }
    }

    /// Consume the next code point when it equals `want`.
    fn eat(&mut self, want: char) -> Result<bool, ErrorInfo> {
        if let Some((cp, len)) = self.peek()?
            && cp == want as u32
        {
            self.pos += len;
            return Ok(true);
        }
        Ok(false)
    }

    /// In extended syntax, skip whitespace and `#` comments.
    fn skip_extended(&mut self) -> Result<(), ErrorInfo> {
        if !self.options.contains(Options::EXTEND) {
            return Ok(());
        }
        while let Some((cp, len)) = self.peek()? {
            match cp {
                0x09 | 0x0a | 0x0b | 0x0c | 0x0d | 0x20 => self.pos += len,
                cp if cp == '#' as u32 => {
                    self.pos += len;
                    while let Some(c) = self.next_char()? {
                        if c == '\n' as u32 {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    // ─── Grammar productions ────────────────────────────────────────────────

    fn parse_alternation(&mut self) -> Result<Node, ErrorInfo> {
        let mut branches = vec![self.parse_concat()?];
        while self.eat('|')? {
            branches.push(self.parse_concat()?);
        }
        Ok(Node::alternate(branches))
    }

    fn parse_concat(&mut self) -> Result<Node, ErrorInfo> {
        let mut pieces: Vec<Node> = Vec::new();
        loop {
            self.skip_extended()?;
            match self.peek()? {
                None => break,
                Some((cp, _)) if cp == '|' as u32 || cp == ')' as u32 => break,
                _ => {}
            }
            match (pieces.last_mut(), self.parse_piece()?) {
                // Comment groups contribute nothing.
                (_, Node::Empty) => {}
                // Merge adjacent unquantified literals into one run.
                (Some(Node::Literal(run)), Node::Literal(mut next)) => run.append(&mut next),
                (_, piece) => pieces.push(piece),
            }
        }
        Ok(Node::concat(pieces))
    }

    /// One atom with any trailing quantifier.
    fn parse_piece(&mut self) -> Result<Node, ErrorInfo> {
        let mut node = self.parse_atom()?;
        let mut quantified = false;
        loop {
            self.skip_extended()?;
            let quant_pos = self.pos;
            let bounds = match self.peek()? {
                Some((cp, len)) if cp == '*' as u32 => {
                    self.pos += len;
                    Some((0, None))
                }
                Some((cp, len)) if cp == '+' as u32 => {
                    self.pos += len;
                    Some((1, None))
                }
                Some((cp, len)) if cp == '?' as u32 => {
                    self.pos += len;
                    Some((0, Some(1)))
                }
                Some((cp, _)) if cp == '{' as u32 => self.try_parse_bounds()?,
                _ => None,
            };
            let Some((min, max)) = bounds else { break };
            if quantified {
                return Err(self.error_at(ErrorKind::NestedRepeatInvalid, quant_pos));
            }
            if matches!(node, Node::Assert(_) | Node::Empty) {
                return Err(self.error_at(ErrorKind::TargetOfRepeatInvalid, quant_pos));
            }
            let kind = if self.eat('?')? {
                RepeatKind::Lazy
            } else if self.eat('+')? {
                RepeatKind::Possessive
            } else {
                RepeatKind::Greedy
            };
            node = Node::Repeat {
                body: Box::new(node),
                min,
                max,
                kind,
            };
            quantified = true;
        }
        Ok(node)
    }

    fn parse_atom(&mut self) -> Result<Node, ErrorInfo> {
        let atom_pos = self.pos;
        let Some((cp, len)) = self.peek()? else {
            return Err(self.error(ErrorKind::PrematureEnd));
        };
        match char::from_u32(cp) {
            Some('(') => {
                self.pos += len;
                self.parse_group(atom_pos)
            }
            Some('[') => {
                self.pos += len;
                self.parse_class()
            }
            Some('.') => {
                self.pos += len;
                Ok(Node::Any)
            }
            Some('^') => {
                self.pos += len;
                Ok(Node::Assert(AssertKind::LineStart))
            }
            Some('$') => {
                self.pos += len;
                Ok(Node::Assert(AssertKind::LineEnd))
            }
            Some('*') | Some('+') | Some('?') => {
                Err(self.error_at(ErrorKind::TargetOfRepeatInvalid, atom_pos))
            }
            Some('{') => {
                if self.try_parse_bounds()?.is_some() {
                    return Err(self.error_at(ErrorKind::TargetOfRepeatInvalid, atom_pos));
                }
                self.pos += len;
                Ok(Node::Literal(vec![cp]))
            }
            Some('\\') => {
                self.pos += len;
                self.parse_escape(atom_pos)
            }
            _ => {
                self.pos += len;
                Ok(Node::Literal(vec![cp]))
            }
        }
    }

    /// A group body; the opening `(` has been consumed.
    fn parse_group(&mut self, open_pos: usize) -> Result<Node, ErrorInfo> {
        let kind = if self.eat('?')? {
            let ext_pos = self.pos;
            let Some(ext) = self.next_char()? else {
                return Err(self.error(ErrorKind::PrematureEnd));
            };
            match char::from_u32(ext) {
                Some(':') => GroupKind::NonCapture,
                Some('>') => GroupKind::Atomic,
                Some('=') => return self.finish_look(LookKind::Ahead { negative: false }),
                Some('!') => return self.finish_look(LookKind::Ahead { negative: true }),
                Some('#') => return self.skip_comment_group(open_pos),
                Some('<') => match self.peek()? {
                    Some((c, l)) if c == '=' as u32 => {
                        self.pos += l;
                        return self.finish_look(LookKind::Behind { negative: false });
                    }
                    Some((c, l)) if c == '!' as u32 => {
                        self.pos += l;
                        return self.finish_look(LookKind::Behind { negative: true });
                    }
                    _ => GroupKind::Named(self.parse_group_name('>')?),
                },
                Some('P') => {
                    if !self.eat('<')? {
                        return Err(self.error_at(ErrorKind::InvalidGroupName, ext_pos));
                    }
                    GroupKind::Named(self.parse_group_name('>')?)
                }
                // Inline option groups are recognized but not implemented.
                Some('i') | Some('m') | Some('x') | Some('s') | Some('u') | Some('-') => {
                    return Err(self.error_at(ErrorKind::UnsupportedFeature, ext_pos));
                }
                _ => return Err(self.error_at(ErrorKind::InvalidGroupName, ext_pos)),
            }
        } else {
            GroupKind::Plain
        };
        let body = self.parse_alternation()?;
        if !self.eat(')')? {
            return Err(self.error(ErrorKind::UnmatchedParen));
        }
        Ok(Node::Group {
            kind,
            body: Box::new(body),
        })
    }

    fn finish_look(&mut self, kind: LookKind) -> Result<Node, ErrorInfo> {
        let body = self.parse_alternation()?;
        if !self.eat(')')? {
            return Err(self.error(ErrorKind::UnmatchedParen));
        }
        Ok(Node::Look {
            kind,
            body: Box::new(body),
        })
    }

    /// `(?#...)` — skipped entirely.
    fn skip_comment_group(&mut self, open_pos: usize) -> Result<Node, ErrorInfo> {
        loop {
            match self.next_char()? {
                Some(cp) if cp == ')' as u32 => return Ok(Node::Empty),
                Some(_) => {}
                None => return Err(self.error_at(ErrorKind::UnmatchedParen, open_pos)),
            }
        }
    }

    /// A group name up to `term`. Names are word characters, not starting
    /// with a digit.
    fn parse_group_name(&mut self, term: char) -> Result<String, ErrorInfo> {
        let name_pos = self.pos;
        let mut name = String::new();
        loop {
            let Some((cp, len)) = self.peek()? else {
                return Err(self.error(ErrorKind::PrematureEnd));
            };
            if cp == term as u32 {
                self.pos += len;
                break;
            }
            match char::from_u32(cp) {
                Some(c) if c.is_alphanumeric() || c == '_' => {
                    name.push(c);
                    self.pos += len;
                }
                _ => return Err(self.error_at(ErrorKind::InvalidGroupName, self.pos)),
            }
        }
        if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error_at(ErrorKind::InvalidGroupName, name_pos));
        }
        Ok(name)
    }

    // ─── Escapes ────────────────────────────────────────────────────────────

    /// An escape atom; the backslash at `esc_pos` has been consumed.
    fn parse_escape(&mut self, esc_pos: usize) -> Result<Node, ErrorInfo> {
        let Some((cp, len)) = self.peek()? else {
            return Err(self.error(ErrorKind::PrematureEnd));
        };
        self.pos += len;
        let node = match char::from_u32(cp) {
            Some('n') => Node::Literal(vec!['\n' as u32]),
            Some('t') => Node::Literal(vec!['\t' as u32]),
            Some('r') => Node::Literal(vec!['\r' as u32]),
            Some('f') => Node::Literal(vec![0x0c]),
            Some('v') => Node::Literal(vec![0x0b]),
            Some('e') => Node::Literal(vec![0x1b]),
            Some('a') => Node::Literal(vec![0x07]),
            Some('0') => Node::Literal(vec![0]),
            Some('x') => {
                let value = self.parse_hex_escape(esc_pos)?;
                Node::Literal(vec![value])
            }
            Some('d') => Node::Class(ClassSet::from_kind(ClassKind::Digit, false)),
            Some('D') => Node::Class(ClassSet::from_kind(ClassKind::Digit, true)),
            Some('w') => Node::Class(ClassSet::from_kind(ClassKind::Word, false)),
            Some('W') => Node::Class(ClassSet::from_kind(ClassKind::Word, true)),
            Some('s') => Node::Class(ClassSet::from_kind(ClassKind::Space, false)),
            Some('S') => Node::Class(ClassSet::from_kind(ClassKind::Space, true)),
            Some('b') => Node::Assert(AssertKind::WordBoundary),
            Some('B') => Node::Assert(AssertKind::NotWordBoundary),
            Some('A') => Node::Assert(AssertKind::BufStart),
            Some('z') => Node::Assert(AssertKind::BufEnd),
            Some('Z') => Node::Assert(AssertKind::BufEndOrNewline),
            Some('k') => {
                if !self.eat('<')? {
                    return Err(self.error_at(ErrorKind::InvalidEscape, esc_pos));
                }
                let name = self.parse_group_name('>')?;
                Node::Backref(BackrefTarget::Name {
                    name,
                    offset: esc_pos,
                })
            }
            // Subroutine calls and Unicode properties are outside this
            // engine's dialect.
            Some('g') | Some('p') | Some('P') => {
                return Err(self.error_at(ErrorKind::UnsupportedFeature, esc_pos));
            }
            Some(c @ '1'..='9') => {
                let mut group = c as u32 - '0' as u32;
                while let Some((d, l)) = self.peek()? {
                    match char::from_u32(d) {
                        Some(d @ '0'..='9') => {
                            group = group
                                .checked_mul(10)
                                .and_then(|g| g.checked_add(d as u32 - '0' as u32))
                                .ok_or_else(|| self.error_at(ErrorKind::TooBigNumber, esc_pos))?;
                            self.pos += l;
                        }
                        _ => break,
                    }
                }
                Node::Backref(BackrefTarget::Number {
                    group,
                    offset: esc_pos,
                })
            }
            // Any other escaped character matches itself.
            _ => Node::Literal(vec![cp]),
        };
        Ok(node)
    }

    /// `\xHH` or `\x{H...}`; the `\x` has been consumed.
    fn parse_hex_escape(&mut self, esc_pos: usize) -> Result<u32, ErrorInfo> {
        let value = if self.eat('{')? {
            let digits_pos = self.pos;
            let mut value: u32 = 0;
            let mut digits = 0;
            loop {
                let Some((cp, len)) = self.peek()? else {
                    return Err(self.error(ErrorKind::PrematureEnd));
                };
                if cp == '}' as u32 {
                    self.pos += len;
                    break;
                }
                let digit = char::from_u32(cp)
                    .and_then(|c| c.to_digit(16))
                    .ok_or_else(|| self.error_at(ErrorKind::InvalidEscape, self.pos))?;
                value = value.saturating_mul(16).saturating_add(digit);
                digits += 1;
                self.pos += len;
                if value > 0x10ffff {
                    return Err(self.error_at(ErrorKind::TooBigNumber, digits_pos));
                }
            }
            if digits == 0 {
                return Err(self.error_at(ErrorKind::InvalidEscape, digits_pos));
            }
            value
        } else {
            let mut value = 0;
            for _ in 0..2 {
                let Some((cp, len)) = self.peek()? else {
                    return Err(self.error_at(ErrorKind::InvalidEscape, esc_pos));
                };
                let digit = char::from_u32(cp)
                    .and_then(|c| c.to_digit(16))
                    .ok_or_else(|| self.error_at(ErrorKind::InvalidEscape, self.pos))?;
                value = value * 16 + digit;
                self.pos += len;
            }
            value
        };
        if !self.enc.encodable(value) {
            return Err(self.error_at(ErrorKind::UnsupportedFeature, esc_pos));
        }
        Ok(value)
    }

    // ─── Repetition bounds ──────────────────────────────────────────────────

    /// Try `{n}`, `{n,}` or `{n,m}` at the current position. Returns `None`
    /// without consuming anything when the braces do not form a repetition,
    /// in which case `{` is an ordinary literal.
    fn try_parse_bounds(&mut self) -> Result<Option<(u32, Option<u32>)>, ErrorInfo> {
        let save = self.pos;
        if !self.eat('{')? {
            return Ok(None);
        }
        let min = match self.try_parse_number()? {
            Some(n) => n,
            None => {
                self.pos = save;
                return Ok(None);
            }
        };
        let max = if self.eat('}')? {
            Some(min)
        } else if self.eat(',')? {
            if self.eat('}')? {
                None
            } else {
                match self.try_parse_number()? {
                    Some(m) if self.eat('}')? => Some(m),
                    _ => {
                        self.pos = save;
                        return Ok(None);
                    }
                }
            }
        } else {
            self.pos = save;
            return Ok(None);
        };
        if let Some(m) = max
            && min > m
        {
            return Err(self.error_at(ErrorKind::InvalidRepeatRange, save));
        }
        Ok(Some((min, max)))
    }

    fn try_parse_number(&mut self) -> Result<Option<u32>, ErrorInfo> {
        let start = self.pos;
        let mut value: u32 = 0;
        let mut any = false;
        while let Some((cp, len)) = self.peek()? {
            match char::from_u32(cp).and_then(|c| c.to_digit(10)) {
                Some(d) => {
                    value = value.saturating_mul(10).saturating_add(d);
                    if value > MAX_REPEAT {
                        return Err(self.error_at(ErrorKind::TooBigNumber, start));
                    }
                    any = true;
                    self.pos += len;
                }
                None => break,
            }
        }
        Ok(any.then_some(value))
    }

    // ─── Character classes ──────────────────────────────────────────────────

    /// A `[...]` class; the opening `[` has been consumed.
    fn parse_class(&mut self) -> Result<Node, ErrorInfo> {
        let negated = self.eat('^')?;
        let mut items = Vec::new();
        let mut first = true;
        loop {
            let Some((cp, len)) = self.peek()? else {
                return Err(self.error(ErrorKind::PrematureEnd));
            };
            if cp == ']' as u32 && !first {
                self.pos += len;
                break;
            }
            first = false;

            // POSIX bracket: [:name:]
            if cp == '[' as u32
                && let Some((second, _)) = self.decode_at(self.pos + len)?
                && second == ':' as u32
            {
                items.push(self.parse_posix_bracket()?);
                continue;
            }

            let atom_pos = self.pos;
            let atom = if cp == '\\' as u32 {
                self.pos += len;
                self.parse_class_escape(atom_pos)?
            } else {
                self.pos += len;
                ClassAtom::Char(cp)
            };

            match atom {
                ClassAtom::Kind { kind, negated } => items.push(ClassItem::Kind { kind, negated }),
                ClassAtom::Char(lo) => {
                    if !self.class_range_follows()? {
                        items.push(ClassItem::Single(lo));
                        continue;
                    }
                    self.eat('-')?;
                    let hi_pos = self.pos;
                    let hi = match self.peek()? {
                        None => return Err(self.error(ErrorKind::PrematureEnd)),
                        Some((c, l)) if c == '\\' as u32 => {
                            self.pos += l;
                            match self.parse_class_escape(hi_pos)? {
                                ClassAtom::Char(hi) => hi,
                                ClassAtom::Kind { .. } => {
                                    return Err(
                                        self.error_at(ErrorKind::InvalidCharRange, atom_pos)
                                    );
                                }
                            }
                        }
                        Some((c, l)) => {
                            self.pos += l;
                            c
                        }
                    };
                    if lo > hi {
                        return Err(self.error_at(ErrorKind::InvalidCharRange, atom_pos));
                    }
                    items.push(ClassItem::Range(lo, hi));
                }
            }
        }
        Ok(Node::Class(ClassSet { negated, items }))
    }

    /// True when a `-` ahead starts a range rather than a literal at the
    /// end of the class.
    fn class_range_follows(&mut self) -> Result<bool, ErrorInfo> {
        let Some((dash, dash_len)) = self.peek()? else {
            return Ok(false);
        };
        if dash != '-' as u32 {
            return Ok(false);
        }
        match self.decode_at(self.pos + dash_len)? {
            Some((after, _)) if after != ']' as u32 => Ok(true),
            _ => Ok(false),
        }
    }

    /// `[:name:]` or `[:^name:]`; positioned at the `[`.
    fn parse_posix_bracket(&mut self) -> Result<ClassItem, ErrorInfo> {
        let bracket_pos = self.pos;
        self.eat('[')?;
        self.eat(':')?;
        let negated = self.eat('^')?;
        let mut name = String::new();
        loop {
            let Some((cp, len)) = self.peek()? else {
                return Err(self.error(ErrorKind::PrematureEnd));
            };
            match char::from_u32(cp) {
                Some(c) if c.is_ascii_lowercase() => {
                    name.push(c);
                    self.pos += len;
                }
                Some(':') => {
                    self.pos += len;
                    break;
                }
                _ => return Err(self.error_at(ErrorKind::InvalidPosixClass, bracket_pos)),
            }
        }
        if !self.eat(']')? {
            return Err(self.error_at(ErrorKind::InvalidPosixClass, bracket_pos));
        }
        let kind = POSIX_CLASSES
            .get(name.as_str())
            .copied()
            .ok_or_else(|| self.error_at(ErrorKind::InvalidPosixClass, bracket_pos))?;
        Ok(ClassItem::Kind { kind, negated })
    }

    /// An escape inside a class; the backslash at `esc_pos` has been
    /// consumed. `\b` is backspace here, and class escapes never assert.
    fn parse_class_escape(&mut self, esc_pos: usize) -> Result<ClassAtom, ErrorInfo> {
        let Some((cp, len)) = self.peek()? else {
            return Err(self.error(ErrorKind::PrematureEnd));
        };
        self.pos += len;
        let atom = match char::from_u32(cp) {
            Some('d') => ClassAtom::Kind {
                kind: ClassKind::Digit,
                negated: false,
            },
            Some('D') => ClassAtom::Kind {
                kind: ClassKind::Digit,
                negated: true,
            },
            Some('w') => ClassAtom::Kind {
                kind: ClassKind::Word,
                negated: false,
            },
            Some('W') => ClassAtom::Kind {
                kind: ClassKind::Word,
                negated: true,
            },
            Some('s') => ClassAtom::Kind {
                kind: ClassKind::Space,
                negated: false,
            },
            Some('S') => ClassAtom::Kind {
                kind: ClassKind::Space,
                negated: true,
            },
            Some('n') => ClassAtom::Char('\n' as u32),
            Some('t') => ClassAtom::Char('\t' as u32),
            Some('r') => ClassAtom::Char('\r' as u32),
            Some('f') => ClassAtom::Char(0x0c),
            Some('v') => ClassAtom::Char(0x0b),
            Some('e') => ClassAtom::Char(0x1b),
            Some('a') => ClassAtom::Char(0x07),
            Some('b') => ClassAtom::Char(0x08),
            Some('0') => ClassAtom::Char(0),
            Some('x') => ClassAtom::Char(self.parse_hex_escape(esc_pos)?),
            _ => ClassAtom::Char(cp),
        };
        Ok(atom)
    }
}
