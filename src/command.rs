//! Compiled script representation
//!
//! A script compiles to a flat list of [`Command`]s. Branch targets and block
//! ends are resolved to indices into that list, so the engine only needs a
//! program counter.

use crate::output::{WriteFiles, WriteTarget};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::PathBuf;

/// Where a command applies
#[derive(Debug, Clone)]
pub enum Address {
    /// Specific line number (1-based)
    Line(usize),

    /// Last line of input (`$`)
    Last,

    /// Lines matching a regex; `None` is the empty regex `//`, which means
    /// whatever regex was used last
    Regex(Option<Regex>),
}

/// One piece of an `s` replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementPart {
    Literal(String),
    /// `&` or `\0`
    WholeMatch,
    /// `\1` to `\9`
    Group(usize),
}

/// Replacement text split into literal and back-reference parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementTemplate {
    pub parts: Vec<ReplacementPart>,
}

impl ReplacementTemplate {
    /// Highest group number referenced, 0 if none
    pub fn max_group(&self) -> usize {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ReplacementPart::Group(n) => Some(*n),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

/// Offsets of the whole match and up to nine groups in the last subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSet {
    slots: [Option<(usize, usize)>; 10],
}

impl CaptureSet {
    pub fn from_captures(caps: &Captures<'_>) -> Self {
        let mut slots = [None; 10];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = caps.get(i).map(|m| (m.start(), m.end()));
        }
        Self { slots }
    }

    /// Bounds of group `n` (0 is the whole match)
    pub fn get(&self, n: usize) -> Option<(usize, usize)> {
        self.slots.get(n).copied().flatten()
    }

    pub fn clear(&mut self) {
        self.slots = [None; 10];
    }
}

/// Compiled `s` command
#[derive(Debug)]
pub struct Substitution {
    /// `None` reuses the last regex
    pub regex: Option<Regex>,
    pub replacement: ReplacementTemplate,
    /// 1-based occurrence to start replacing at
    pub occurrence: usize,
    /// Keep replacing after the first replaced occurrence
    pub global: bool,
    /// `p` flag
    pub print: bool,
    /// `w` flag
    pub write: Option<WriteTarget>,
}

/// Compiled `y` command
#[derive(Debug, Clone, Default)]
pub struct Transliteration {
    map: HashMap<char, char>,
}

impl Transliteration {
    /// Build the table from equal-length sequences; the first mapping given
    /// for a character wins
    pub fn new(source: &[char], dest: &[char]) -> Self {
        let mut map = HashMap::with_capacity(source.len());
        for (&from, &to) in source.iter().zip(dest) {
            map.entry(from).or_insert(to);
        }
        Self { map }
    }

    pub fn apply(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.map.get(&c).copied().unwrap_or(c))
            .collect()
    }
}

/// Target of `b`, `t` and `T`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Label as written; `None` jumps to the end of the script
    pub label: Option<String>,
    /// Index of the `:` command, filled in after parsing
    pub target: Option<usize>,
}

/// What a command does
#[derive(Debug)]
pub enum CommandKind {
    /// `p`
    Print,
    /// `P`
    PrintFirstSegment,
    /// `d`
    Delete,
    /// `D`
    DeleteFirstSegment,
    /// `s`
    Substitute(Box<Substitution>),
    /// `a`
    Append(String),
    /// `i`
    Insert(String),
    /// `c`
    Change(String),
    /// `r`
    ReadFile(PathBuf),
    /// `w`
    WriteFile(WriteTarget),
    /// `=`
    PrintLineNumber,
    /// `n`
    NextLine,
    /// `N`
    AppendNextLine,
    /// `y`
    Translate(Transliteration),
    /// `g`: hold space replaces pattern space
    HoldGet,
    /// `G`: newline and hold space appended to pattern space
    HoldAppend,
    /// `h`: pattern space replaces hold space
    HoldSet,
    /// `H`: newline and pattern space appended to hold space
    HoldMerge,
    /// `x`
    Exchange,
    /// `b`
    Branch(Branch),
    /// `t`
    BranchIfSubstituted(Branch),
    /// `T`
    BranchIfNotSubstituted(Branch),
    /// `:`
    Label(String),
    /// `{`, with the index of its matching `}`
    BlockOpen { close: usize },
    /// `}`
    BlockClose,
    /// `q`
    Quit,
    /// `l`
    List,
}

impl CommandKind {
    /// Script letter for this command
    pub fn letter(&self) -> char {
        match self {
            CommandKind::Print => 'p',
            CommandKind::PrintFirstSegment => 'P',
            CommandKind::Delete => 'd',
            CommandKind::DeleteFirstSegment => 'D',
            CommandKind::Substitute(_) => 's',
            CommandKind::Append(_) => 'a',
            CommandKind::Insert(_) => 'i',
            CommandKind::Change(_) => 'c',
            CommandKind::ReadFile(_) => 'r',
            CommandKind::WriteFile(_) => 'w',
            CommandKind::PrintLineNumber => '=',
            CommandKind::NextLine => 'n',
            CommandKind::AppendNextLine => 'N',
            CommandKind::Translate(_) => 'y',
            CommandKind::HoldGet => 'g',
            CommandKind::HoldAppend => 'G',
            CommandKind::HoldSet => 'h',
            CommandKind::HoldMerge => 'H',
            CommandKind::Exchange => 'x',
            CommandKind::Branch(_) => 'b',
            CommandKind::BranchIfSubstituted(_) => 't',
            CommandKind::BranchIfNotSubstituted(_) => 'T',
            CommandKind::Label(_) => ':',
            CommandKind::BlockOpen { .. } => '{',
            CommandKind::BlockClose => '}',
            CommandKind::Quit => 'q',
            CommandKind::List => 'l',
        }
    }

    pub(crate) fn branch_mut(&mut self) -> Option<&mut Branch> {
        match self {
            CommandKind::Branch(branch)
            | CommandKind::BranchIfSubstituted(branch)
            | CommandKind::BranchIfNotSubstituted(branch) => Some(branch),
            _ => None,
        }
    }
}

/// One compiled statement
#[derive(Debug)]
pub struct Command {
    pub address1: Option<Address>,
    /// Only ever set together with `address1`
    pub address2: Option<Address>,
    /// `!`
    pub negate: bool,
    pub kind: CommandKind,
    /// True while a two-address range is open
    pub in_range: bool,
    /// Script line the command was written on
    pub line: usize,
}

impl Command {
    pub fn new(kind: CommandKind, line: usize) -> Self {
        Self {
            address1: None,
            address2: None,
            negate: false,
            kind,
            in_range: false,
            line,
        }
    }
}

/// A compiled script
#[derive(Debug, Default)]
pub struct Script {
    pub commands: Vec<Command>,
    /// Label name to index of its `:` command
    pub labels: HashMap<String, usize>,
    /// Set by a leading `#n`
    pub quiet: bool,
    pub write_files: WriteFiles,
}

impl Script {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Close every open range, used when a new input stream starts
    pub fn reset_ranges(&mut self) {
        for command in &mut self.commands {
            command.in_range = false;
        }
    }
}
