//! Script text scanning
//!
//! [`ScriptCursor`] walks the script one character at a time and tracks the
//! line number for error messages. The `read_*` functions consume the
//! delimited parts of `s` and `y` commands and regex addresses, each with
//! its own escaping rules.

use crate::cli::RegexFlavor;
use crate::command::{ReplacementPart, ReplacementTemplate};
use crate::error::{CompileError, CompileErrorKind};

/// Position in the script text
#[derive(Debug, Clone)]
pub struct ScriptCursor {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl ScriptCursor {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    pub fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Current 1-based script line
    pub fn line(&self) -> usize {
        self.line
    }

    /// Skip spaces and tabs, stopping at a newline
    pub fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.pos += 1;
        }
    }

    /// Skip the rest of the current line, leaving the newline unread
    pub fn skip_to_line_end(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.pos += 1;
        }
    }

    /// Consume characters up to (not including) the first one matching `stop`
    pub fn take_until(&mut self, stop: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(c) = self.peek() {
            if stop(c) {
                break;
            }
            taken.push(c);
            self.next_char();
        }
        taken
    }

    pub fn error(&self, kind: CompileErrorKind) -> CompileError {
        CompileError::new(self.line, kind)
    }
}

/// Error for a delimited part that ran out before its closing delimiter.
/// Parts owned by a command (`s`, `y`) report the command; addresses report
/// the delimiter.
fn unterminated(cursor: &ScriptCursor, delim: char, owner: Option<char>) -> CompileError {
    match owner {
        Some(command) => cursor.error(CompileErrorKind::UnterminatedCommand(command)),
        None => cursor.error(CompileErrorKind::UnmatchedDelimiter(delim)),
    }
}

/// Characters that are operators when they appear bare in `flavor`
fn is_special(c: char, flavor: RegexFlavor) -> bool {
    match flavor {
        RegexFlavor::BRE => matches!(c, '.' | '[' | ']' | '*' | '^' | '$'),
        RegexFlavor::ERE => matches!(
            c,
            '.' | '[' | ']' | '*' | '^' | '$' | '(' | ')' | '|' | '+' | '?' | '{' | '}'
        ),
    }
}

/// Read a regex up to the unescaped `delim` and consume the delimiter.
///
/// The text is returned in the script's own regex syntax. `\delim` becomes a
/// bare delimiter, or stays escaped when the delimiter is an operator in
/// `flavor`, so it always means the literal character. Delimiters inside a
/// bracket expression do not terminate the regex.
pub fn read_regex(
    cursor: &mut ScriptCursor,
    delim: char,
    flavor: RegexFlavor,
    owner: Option<char>,
) -> Result<String, CompileError> {
    let mut pattern = String::new();

    loop {
        let c = cursor
            .next_char()
            .ok_or_else(|| unterminated(cursor, delim, owner))?;
        match c {
            '\n' => return Err(unterminated(cursor, delim, owner)),
            c if c == delim => return Ok(pattern),
            '\\' => {
                let escaped = cursor
                    .next_char()
                    .ok_or_else(|| unterminated(cursor, delim, owner))?;
                if escaped == delim {
                    if is_special(delim, flavor) {
                        pattern.push('\\');
                    }
                    pattern.push(delim);
                } else if escaped == '\n' {
                    pattern.push_str("\\n");
                } else {
                    pattern.push('\\');
                    pattern.push(escaped);
                }
            }
            '[' => {
                pattern.push('[');
                read_bracket(cursor, &mut pattern, delim, owner)?;
            }
            _ => pattern.push(c),
        }
    }
}

/// Copy a bracket expression (after its `[`) through its closing `]`
fn read_bracket(
    cursor: &mut ScriptCursor,
    pattern: &mut String,
    delim: char,
    owner: Option<char>,
) -> Result<(), CompileError> {
    if cursor.eat('^') {
        pattern.push('^');
    }
    if cursor.eat(']') {
        pattern.push(']');
    }

    loop {
        let c = cursor
            .next_char()
            .ok_or_else(|| unterminated(cursor, delim, owner))?;
        match c {
            '\n' => return Err(unterminated(cursor, delim, owner)),
            ']' => {
                pattern.push(']');
                return Ok(());
            }
            '[' if matches!(cursor.peek(), Some(':' | '.' | '=')) => {
                let Some(kind) = cursor.next_char() else {
                    return Err(unterminated(cursor, delim, owner));
                };
                pattern.push('[');
                pattern.push(kind);
                // Copy up to and including the closing `:]`, `.]` or `=]`
                loop {
                    let inner = cursor
                        .next_char()
                        .ok_or_else(|| unterminated(cursor, delim, owner))?;
                    if inner == '\n' {
                        return Err(unterminated(cursor, delim, owner));
                    }
                    pattern.push(inner);
                    if inner == kind && cursor.peek() == Some(']') {
                        cursor.next_char();
                        pattern.push(']');
                        break;
                    }
                }
            }
            _ => pattern.push(c),
        }
    }
}

/// Read an `s` replacement up to the unescaped `delim` and split it into
/// literal text and references.
pub fn read_replacement(
    cursor: &mut ScriptCursor,
    delim: char,
) -> Result<ReplacementTemplate, CompileError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let flush = |literal: &mut String, parts: &mut Vec<ReplacementPart>| {
        if !literal.is_empty() {
            parts.push(ReplacementPart::Literal(std::mem::take(literal)));
        }
    };

    loop {
        let c = cursor
            .next_char()
            .ok_or_else(|| unterminated(cursor, delim, Some('s')))?;
        match c {
            '\n' => return Err(unterminated(cursor, delim, Some('s'))),
            c if c == delim => break,
            '&' => {
                flush(&mut literal, &mut parts);
                parts.push(ReplacementPart::WholeMatch);
            }
            '\\' => {
                let escaped = cursor
                    .next_char()
                    .ok_or_else(|| unterminated(cursor, delim, Some('s')))?;
                match escaped {
                    e if e == delim => literal.push(e),
                    '0' => {
                        flush(&mut literal, &mut parts);
                        parts.push(ReplacementPart::WholeMatch);
                    }
                    '1'..='9' => {
                        flush(&mut literal, &mut parts);
                        let group = escaped as usize - '0' as usize;
                        parts.push(ReplacementPart::Group(group));
                    }
                    'n' | '\n' => literal.push('\n'),
                    other => literal.push(other),
                }
            }
            _ => literal.push(c),
        }
    }

    flush(&mut literal, &mut parts);
    Ok(ReplacementTemplate { parts })
}

/// Read one half of a `y` command up to the unescaped `delim`
pub fn read_translation(cursor: &mut ScriptCursor, delim: char) -> Result<Vec<char>, CompileError> {
    let mut chars = Vec::new();

    loop {
        let c = cursor
            .next_char()
            .ok_or_else(|| unterminated(cursor, delim, Some('y')))?;
        match c {
            '\n' => return Err(unterminated(cursor, delim, Some('y'))),
            c if c == delim => return Ok(chars),
            '\\' => {
                let escaped = cursor
                    .next_char()
                    .ok_or_else(|| unterminated(cursor, delim, Some('y')))?;
                match escaped {
                    e if e == delim => chars.push(e),
                    '\\' => chars.push('\\'),
                    'n' | '\n' => chars.push('\n'),
                    other => {
                        chars.push('\\');
                        chars.push(other);
                    }
                }
            }
            _ => chars.push(c),
        }
    }
}

/// Read the text argument of `a`, `i` or `c`.
///
/// Leading blanks, then one optional `\` and one optional newline, are
/// skipped. Blanks after the `\` are kept. The text runs to the first
/// unescaped newline; a backslash before a newline keeps the newline.
/// Empty text is only allowed in the `\`-newline form.
pub fn read_text(cursor: &mut ScriptCursor) -> Result<String, CompileError> {
    cursor.skip_blanks();
    let multiline = cursor.eat('\\') && cursor.eat('\n');

    let mut text = String::new();
    while let Some(c) = cursor.peek() {
        if c == '\n' {
            break;
        }
        cursor.next_char();
        if c == '\\' {
            match cursor.next_char() {
                Some('n') | Some('\n') => text.push('\n'),
                Some(other) => text.push(other),
                None => {}
            }
        } else {
            text.push(c);
        }
    }

    if text.is_empty() && !multiline {
        return Err(cursor.error(CompileErrorKind::MissingText));
    }
    Ok(text)
}
