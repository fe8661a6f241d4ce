//! Pattern compilation: AST to instruction program.
//!
//! Compilation is two passes. The first walks the AST to assign capture
//! numbers and build the name table; the second emits instructions, resolving
//! backreferences against the completed table. Group numbering depends on
//! whole-pattern knowledge: when named groups are present, plain `(...)`
//! groups only capture under `CAPTURE_GROUP`.

use log::debug;

use crate::encoding::{self, Encoding};
use crate::error::{ErrorInfo, ErrorKind};
use crate::names::NameTable;
use crate::options::Options;
use crate::program::{Inst, Regex, SubKind};
use crate::syntax::ast::{BackrefTarget, GroupKind, LookKind, Node, RepeatKind};
use crate::syntax::parser::parse;

/// Upper bound on emitted instructions across the program and all
/// sub-programs.
const MAX_INSTS: usize = 1 << 16;

/// Compile `pattern` under `enc` into a searchable [`Regex`].
pub fn compile(
    pattern: &[u8],
    enc: &'static dyn Encoding,
    options: Options,
) -> Result<Regex, ErrorInfo> {
    encoding::require_registered(enc)?;
    let ast = parse(pattern, enc, options)?;

    let named = has_named(&ast);
    let plain_captures = options.contains(Options::CAPTURE_GROUP)
        || (!named && !options.contains(Options::DONT_CAPTURE_GROUP));

    let mut scan = Scan {
        plain_captures,
        count: 0,
        names: NameTable::new(),
    };
    scan.visit(&ast);
    if scan.count > u16::MAX as u32 {
        return Err(ErrorInfo::new(ErrorKind::PatternTooLarge));
    }

    let mut compiler = Compiler {
        pattern,
        insts: Vec::new(),
        subs: Vec::new(),
        total: 0,
        next_group: 0,
        marks: 0,
        plain_captures,
        total_groups: scan.count,
        names: scan.names,
    };
    compiler.emit(&ast)?;
    compiler.push(Inst::Match)?;

    debug!(
        "compiled {} byte pattern ({}): {} instructions, {} sub-programs, {} groups",
        pattern.len(),
        enc.name(),
        compiler.total,
        compiler.subs.len(),
        compiler.total_groups,
    );

    Ok(Regex {
        insts: compiler.insts,
        subs: compiler.subs,
        groups: compiler.total_groups as usize,
        marks: compiler.marks as usize,
        names: compiler.names,
        enc,
        options,
    })
}

impl Regex {
    /// Compile a UTF-8 pattern with default options.
    pub fn new(pattern: &str) -> Result<Regex, ErrorInfo> {
        compile(pattern.as_bytes(), encoding::UTF_8, Options::empty())
    }

    /// Compile a UTF-8 pattern with `options`.
    pub fn with_options(pattern: &str, options: Options) -> Result<Regex, ErrorInfo> {
        compile(pattern.as_bytes(), encoding::UTF_8, options)
    }
}

fn has_named(node: &Node) -> bool {
    match node {
        Node::Group { kind, body } => matches!(kind, GroupKind::Named(_)) || has_named(body),
        Node::Look { body, .. } => has_named(body),
        Node::Repeat { body, .. } => has_named(body),
        Node::Concat(nodes) | Node::Alternate(nodes) => nodes.iter().any(has_named),
        _ => false,
    }
}

/// First pass: capture numbering and the name table.
struct Scan {
    plain_captures: bool,
    count: u32,
    names: NameTable,
}

impl Scan {
    fn visit(&mut self, node: &Node) {
        match node {
            Node::Group { kind, body } => {
                match kind {
                    GroupKind::Plain if self.plain_captures => self.count += 1,
                    GroupKind::Named(name) => {
                        self.count += 1;
                        self.names.add(name, self.count as i32);
                    }
                    _ => {}
                }
                self.visit(body);
            }
            Node::Look { body, .. } => self.visit(body),
            Node::Repeat { body, .. } => self.visit(body),
            Node::Concat(nodes) | Node::Alternate(nodes) => {
                for n in nodes {
                    self.visit(n);
                }
            }
            _ => {}
        }
    }
}

/// Second pass: instruction emission.
struct Compiler<'p> {
    pattern: &'p [u8],
    insts: Vec<Inst>,
    subs: Vec<Vec<Inst>>,
    /// Instructions emitted across all programs, for the size limit.
    total: usize,
    next_group: u32,
    marks: u16,
    plain_captures: bool,
    total_groups: u32,
    names: NameTable,
}

impl Compiler<'_> {
    fn push(&mut self, inst: Inst) -> Result<u32, ErrorInfo> {
        self.total += 1;
        if self.total > MAX_INSTS {
            return Err(ErrorInfo::new(ErrorKind::PatternTooLarge));
        }
        self.insts.push(inst);
        Ok((self.insts.len() - 1) as u32)
    }

    fn new_mark(&mut self) -> Result<u16, ErrorInfo> {
        let mark = self.marks;
        self.marks = self
            .marks
            .checked_add(1)
            .ok_or_else(|| ErrorInfo::new(ErrorKind::PatternTooLarge))?;
        Ok(mark)
    }

    /// Compile `body` into a fresh sub-program and return its index.
    fn compile_sub(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<(), ErrorInfo>,
    ) -> Result<u16, ErrorInfo> {
        let saved = std::mem::take(&mut self.insts);
        body(self)?;
        self.push(Inst::Match)?;
        let sub = std::mem::replace(&mut self.insts, saved);
        if self.subs.len() >= u16::MAX as usize {
            return Err(ErrorInfo::new(ErrorKind::PatternTooLarge));
        }
        self.subs.push(sub);
        Ok((self.subs.len() - 1) as u16)
    }

    fn emit(&mut self, node: &Node) -> Result<(), ErrorInfo> {
        match node {
            Node::Empty => {}
            Node::Literal(cps) => {
                self.push(Inst::Literal(cps.clone().into_boxed_slice()))?;
            }
            Node::Any => {
                self.push(Inst::Any)?;
            }
            Node::Class(cs) => {
                self.push(Inst::Class(cs.clone()))?;
            }
            Node::Assert(kind) => {
                self.push(Inst::Assert(*kind))?;
            }
            Node::Group { kind, body } => match kind {
                GroupKind::Plain if self.plain_captures => self.emit_capture(body)?,
                GroupKind::Named(_) => self.emit_capture(body)?,
                GroupKind::Plain | GroupKind::NonCapture => self.emit(body)?,
                GroupKind::Atomic => {
                    let index = self.compile_sub(|c| c.emit(body))?;
                    self.push(Inst::Sub {
                        index,
                        kind: SubKind::Atomic,
                    })?;
                }
            },
            Node::Look { kind, body } => match *kind {
                LookKind::Ahead { negative } => {
                    let index = self.compile_sub(|c| c.emit(body))?;
                    self.push(Inst::Sub {
                        index,
                        kind: SubKind::LookAhead { negative },
                    })?;
                }
                LookKind::Behind { negative } => {
                    let (min_chars, max_chars) = char_len_range(body)
                        .ok_or_else(|| ErrorInfo::new(ErrorKind::UnboundedLookBehind))?;
                    let index = self.compile_sub(|c| c.emit(body))?;
                    self.push(Inst::Sub {
                        index,
                        kind: SubKind::LookBehind {
                            negative,
                            min_chars,
                            max_chars,
                        },
                    })?;
                }
            },
            Node::Backref(BackrefTarget::Number { group, offset }) => {
                if *group == 0 || *group > self.total_groups {
                    return Err(ErrorInfo::in_input(
                        ErrorKind::InvalidBackref,
                        *offset,
                        self.pattern,
                    ));
                }
                self.push(Inst::Backref(*group as u16))?;
            }
            Node::Backref(BackrefTarget::Name { name, offset }) => {
                let numbers = self.names.group_numbers(name);
                if numbers.is_empty() {
                    return Err(ErrorInfo::in_input(
                        ErrorKind::UndefinedNameReference,
                        *offset,
                        self.pattern,
                    ));
                }
                let descending: Box<[u16]> = numbers.iter().rev().map(|&n| n as u16).collect();
                self.push(Inst::NamedBackref(descending))?;
            }
            Node::Repeat {
                body,
                min,
                max,
                kind,
            } => self.emit_repeat(body, *min, *max, *kind)?,
            Node::Concat(nodes) => {
                for n in nodes {
                    self.emit(n)?;
                }
            }
            Node::Alternate(branches) => self.emit_alternate(branches)?,
        }
        Ok(())
    }

    fn emit_capture(&mut self, body: &Node) -> Result<(), ErrorInfo> {
        self.next_group += 1;
        let group = self.next_group as u16;
        self.push(Inst::GroupStart(group))?;
        self.emit(body)?;
        self.push(Inst::GroupEnd(group))?;
        Ok(())
    }

    fn emit_alternate(&mut self, branches: &[Node]) -> Result<(), ErrorInfo> {
        let mut jumps = Vec::with_capacity(branches.len() - 1);
        for branch in &branches[..branches.len() - 1] {
            let split = self.push(Inst::Split {
                preferred: 0,
                alternate: 0,
            })?;
            self.emit(branch)?;
            jumps.push(self.push(Inst::Jump(0))?);
            let next = self.insts.len() as u32;
            self.insts[split as usize] = Inst::Split {
                preferred: split + 1,
                alternate: next,
            };
        }
        self.emit(branches.last().expect("alternation has branches"))?;
        let end = self.insts.len() as u32;
        for jump in jumps {
            self.insts[jump as usize] = Inst::Jump(end);
        }
        Ok(())
    }

    fn emit_repeat(
        &mut self,
        body: &Node,
        min: u32,
        max: Option<u32>,
        kind: RepeatKind,
    ) -> Result<(), ErrorInfo> {
        if kind == RepeatKind::Possessive {
            // A possessive repeat is its greedy form in an atomic group.
            let index = self.compile_sub(|c| c.emit_repeat(body, min, max, RepeatKind::Greedy))?;
            self.push(Inst::Sub {
                index,
                kind: SubKind::Atomic,
            })?;
            return Ok(());
        }
        let lazy = kind == RepeatKind::Lazy;
        for _ in 0..min {
            self.emit(body)?;
        }
        match max {
            None => self.emit_loop(body, lazy),
            Some(max) => {
                // Bounded extras as nested optionals: skipping one skips all
                // the following ones too.
                let mut splits = Vec::new();
                for _ in 0..max - min {
                    splits.push(self.push(Inst::Split {
                        preferred: 0,
                        alternate: 0,
                    })?);
                    self.emit(body)?;
                }
                let end = self.insts.len() as u32;
                for split in splits {
                    let body_start = split + 1;
                    self.insts[split as usize] = if lazy {
                        Inst::Split {
                            preferred: end,
                            alternate: body_start,
                        }
                    } else {
                        Inst::Split {
                            preferred: body_start,
                            alternate: end,
                        }
                    };
                }
                Ok(())
            }
        }
    }

    /// An unbounded loop with a zero-width-iteration guard.
    fn emit_loop(&mut self, body: &Node, lazy: bool) -> Result<(), ErrorInfo> {
        let head = self.push(Inst::Split {
            preferred: 0,
            alternate: 0,
        })?;
        let mark = self.new_mark()?;
        self.push(Inst::EmptyStart(mark))?;
        self.emit(body)?;
        self.push(Inst::EmptyEnd { mark, back: head })?;
        let end = self.insts.len() as u32;
        let body_start = head + 1;
        self.insts[head as usize] = if lazy {
            Inst::Split {
                preferred: end,
                alternate: body_start,
            }
        } else {
            Inst::Split {
                preferred: body_start,
                alternate: end,
            }
        };
        Ok(())
    }
}

/// Character-length bounds of `node`, or `None` when unbounded (or
/// dependent on runtime captures). Used to bound lookbehind scans.
fn char_len_range(node: &Node) -> Option<(u32, u32)> {
    Some(match node {
        Node::Empty | Node::Assert(_) | Node::Look { .. } => (0, 0),
        Node::Literal(cps) => (cps.len() as u32, cps.len() as u32),
        Node::Any | Node::Class(_) => (1, 1),
        Node::Group { body, .. } => char_len_range(body)?,
        Node::Backref(_) => return None,
        Node::Repeat {
            body, min, max, ..
        } => {
            let (body_min, body_max) = char_len_range(body)?;
            let max = match max {
                Some(m) => body_max.saturating_mul(*m),
                None if body_max == 0 => 0,
                None => return None,
            };
            (body_min.saturating_mul(*min), max)
        }
        Node::Concat(nodes) => {
            let mut min = 0u32;
            let mut max = 0u32;
            for n in nodes {
                let (nmin, nmax) = char_len_range(n)?;
                min = min.saturating_add(nmin);
                max = max.saturating_add(nmax);
            }
            (min, max)
        }
        Node::Alternate(branches) => {
            let mut min = u32::MAX;
            let mut max = 0u32;
            for b in branches {
                let (bmin, bmax) = char_len_range(b)?;
                min = min.min(bmin);
                max = max.max(bmax);
            }
            (min, max)
        }
    })
}
