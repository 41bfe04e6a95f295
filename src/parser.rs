//! Script compiler
//!
//! Turns script text into a [`Script`]: a flat command list with block ends
//! and branch targets already resolved to indices.

use crate::bre_converter::convert_bre;
use crate::cli::RegexFlavor;
use crate::command::{
    Address, Branch, Command, CommandKind, Script, Substitution, Transliteration,
};
use crate::delimiter::{
    read_regex, read_replacement, read_text, read_translation, ScriptCursor,
};
use crate::ere_converter::convert_ere;
use crate::error::{CompileError, CompileErrorKind};
use crate::output::WriteFiles;
use regex::{Regex, RegexBuilder};
use std::path::PathBuf;
use tracing::debug;

/// Compiles sed scripts using a given regex flavor
pub struct Parser {
    /// Regex flavor the script's patterns are written in
    regex_flavor: RegexFlavor,
}

impl Parser {
    pub fn new(regex_flavor: RegexFlavor) -> Self {
        Self { regex_flavor }
    }

    /// Compile a whole script
    pub fn parse(&self, text: &str) -> Result<Script, CompileError> {
        let mut cursor = ScriptCursor::new(text);
        let mut script = Script {
            quiet: text.starts_with("#n"),
            ..Script::default()
        };
        // Indices of `{` commands still waiting for their `}`
        let mut open_blocks: Vec<usize> = Vec::new();

        loop {
            while matches!(cursor.peek(), Some(c) if c.is_whitespace() || c == ';') {
                cursor.next_char();
            }
            let Some(first) = cursor.peek() else {
                break;
            };
            if first == '#' {
                cursor.skip_to_line_end();
                continue;
            }

            let line = cursor.line();
            let mut command = self.parse_command(&mut cursor, &mut script.write_files)?;
            command.line = line;
            let index = script.commands.len();

            match &command.kind {
                CommandKind::BlockOpen { .. } => open_blocks.push(index),
                CommandKind::BlockClose => {
                    let open = open_blocks
                        .pop()
                        .ok_or_else(|| CompileError::new(line, CompileErrorKind::UnexpectedBlockClose))?;
                    script.commands[open].kind = CommandKind::BlockOpen { close: index };
                }
                CommandKind::Label(name) => {
                    if script.labels.insert(name.clone(), index).is_some() {
                        return Err(CompileError::new(
                            line,
                            CompileErrorKind::DuplicateLabel(name.clone()),
                        ));
                    }
                }
                _ => {}
            }
            script.commands.push(command);
        }

        if let Some(&open) = open_blocks.last() {
            return Err(CompileError::new(
                script.commands[open].line,
                CompileErrorKind::UnterminatedBlock,
            ));
        }

        resolve_branches(&mut script)?;

        debug!(
            commands = script.len(),
            labels = script.labels.len(),
            write_files = script.write_files.len(),
            quiet = script.quiet,
            "compiled script"
        );
        Ok(script)
    }

    /// Parse one `[addr[,addr]][!]cmd` statement
    fn parse_command(
        &self,
        cursor: &mut ScriptCursor,
        write_files: &mut WriteFiles,
    ) -> Result<Command, CompileError> {
        let address1 = self.parse_address(cursor)?;
        let mut address2 = None;
        if address1.is_some() {
            cursor.skip_blanks();
            if cursor.eat(',') {
                cursor.skip_blanks();
                address2 = Some(
                    self.parse_address(cursor)?
                        .ok_or_else(|| cursor.error(CompileErrorKind::MissingSecondAddress))?,
                );
            }
        }

        cursor.skip_blanks();
        let mut negate = false;
        if cursor.eat('!') {
            negate = true;
            cursor.skip_blanks();
            if cursor.peek() == Some('!') {
                return Err(cursor.error(CompileErrorKind::MultipleNegation));
            }
        }

        let letter = match cursor.next_char() {
            None | Some('\n') | Some(';') => {
                return Err(cursor.error(CompileErrorKind::MissingCommand));
            }
            Some(c) => c,
        };

        let has_address = address1.is_some();
        let kind = match letter {
            '{' => CommandKind::BlockOpen { close: 0 },
            '}' => {
                if has_address || negate {
                    return Err(cursor.error(CompileErrorKind::NoAddressAllowed('}')));
                }
                expect_end(cursor)?;
                CommandKind::BlockClose
            }
            ':' => {
                if has_address {
                    return Err(cursor.error(CompileErrorKind::NoAddressAllowed(':')));
                }
                cursor.skip_blanks();
                let name = cursor.take_until(|c| c.is_whitespace() || c == ';');
                if name.is_empty() {
                    return Err(cursor.error(CompileErrorKind::MissingLabel));
                }
                expect_end(cursor)?;
                CommandKind::Label(name)
            }
            'b' | 't' | 'T' => {
                cursor.skip_blanks();
                let name = cursor.take_until(|c| c.is_whitespace() || c == ';' || c == '}');
                expect_end(cursor)?;
                let branch = Branch {
                    label: (!name.is_empty()).then_some(name),
                    target: None,
                };
                match letter {
                    'b' => CommandKind::Branch(branch),
                    't' => CommandKind::BranchIfSubstituted(branch),
                    _ => CommandKind::BranchIfNotSubstituted(branch),
                }
            }
            's' => CommandKind::Substitute(Box::new(self.parse_substitute(cursor, write_files)?)),
            'y' => {
                let delim = read_delimiter(cursor, 'y')?;
                let source = read_translation(cursor, delim)?;
                let dest = read_translation(cursor, delim)?;
                if source.len() != dest.len() {
                    return Err(cursor.error(CompileErrorKind::TranslateLengthMismatch));
                }
                expect_end(cursor)?;
                CommandKind::Translate(Transliteration::new(&source, &dest))
            }
            'a' => CommandKind::Append(read_text(cursor)?),
            'i' => CommandKind::Insert(read_text(cursor)?),
            'c' => CommandKind::Change(read_text(cursor)?),
            'r' => CommandKind::ReadFile(read_filename(cursor)?),
            'w' => CommandKind::WriteFile(open_write_file(cursor, write_files)?),
            '=' | 'd' | 'D' | 'g' | 'G' | 'h' | 'H' | 'l' | 'n' | 'N' | 'p' | 'P' | 'q' | 'x' => {
                expect_end(cursor)?;
                bare_command(letter)
            }
            other => return Err(cursor.error(CompileErrorKind::UnknownCommand(other))),
        };

        Ok(Command {
            address1,
            address2,
            negate,
            kind,
            in_range: false,
            line: cursor.line(),
        })
    }

    /// Parse a line number, `$` or regex address, if one is present
    fn parse_address(&self, cursor: &mut ScriptCursor) -> Result<Option<Address>, CompileError> {
        match cursor.peek() {
            Some(c) if c.is_ascii_digit() => {
                let digits = cursor.take_until(|c| !c.is_ascii_digit());
                let number: usize = digits
                    .parse()
                    .map_err(|_| cursor.error(CompileErrorKind::LineNumberOverflow(digits.clone())))?;
                if number == 0 {
                    return Err(cursor.error(CompileErrorKind::ZeroLineAddress));
                }
                Ok(Some(Address::Line(number)))
            }
            Some('$') => {
                cursor.next_char();
                Ok(Some(Address::Last))
            }
            Some('/') => {
                cursor.next_char();
                self.parse_regex_address(cursor, '/').map(Some)
            }
            Some('\\') => {
                cursor.next_char();
                let delim = match cursor.next_char() {
                    Some(c) if c != '\n' && c != '\\' => c,
                    Some(c) => return Err(cursor.error(CompileErrorKind::InvalidDelimiter(c))),
                    None => return Err(cursor.error(CompileErrorKind::MissingCommand)),
                };
                self.parse_regex_address(cursor, delim).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn parse_regex_address(
        &self,
        cursor: &mut ScriptCursor,
        delim: char,
    ) -> Result<Address, CompileError> {
        let pattern = read_regex(cursor, delim, self.regex_flavor, None)?;
        let case_insensitive = cursor.eat('I');
        Ok(Address::Regex(self.compile_regex(cursor, &pattern, case_insensitive)?))
    }

    /// `s<d>pattern<d>replacement<d>flags`
    fn parse_substitute(
        &self,
        cursor: &mut ScriptCursor,
        write_files: &mut WriteFiles,
    ) -> Result<Substitution, CompileError> {
        let delim = read_delimiter(cursor, 's')?;
        let pattern = read_regex(cursor, delim, self.regex_flavor, Some('s'))?;
        let replacement = read_replacement(cursor, delim)?;

        let mut occurrence: Option<usize> = None;
        let mut global = false;
        let mut print = false;
        let mut case_insensitive = false;
        let mut write = None;

        while let Some(c) = cursor.peek() {
            match c {
                ';' | '\n' | '}' | '#' => break,
                ' ' | '\t' => {
                    cursor.next_char();
                }
                'g' => {
                    cursor.next_char();
                    global = true;
                }
                'p' => {
                    cursor.next_char();
                    print = true;
                }
                'i' | 'I' => {
                    cursor.next_char();
                    case_insensitive = true;
                }
                'w' => {
                    cursor.next_char();
                    write = Some(open_write_file(cursor, write_files)?);
                    break;
                }
                '0'..='9' => {
                    if occurrence.is_some() {
                        return Err(cursor.error(CompileErrorKind::BadSubstitutionFlag(c)));
                    }
                    let digits = cursor.take_until(|c| !c.is_ascii_digit());
                    let n: usize = digits
                        .parse()
                        .map_err(|_| cursor.error(CompileErrorKind::LineNumberOverflow(digits.clone())))?;
                    occurrence = Some(n);
                }
                other => return Err(cursor.error(CompileErrorKind::BadSubstitutionFlag(other))),
            }
        }

        // An occurrence of 0 means every match
        let mut occurrence = match occurrence {
            Some(0) => {
                global = true;
                1
            }
            Some(n) => n,
            None => 1,
        };
        // Anchored at the start, there is only ever one match
        if pattern.starts_with('^') {
            global = false;
            occurrence = 1;
        }

        let regex = self.compile_regex(cursor, &pattern, case_insensitive)?;
        if let Some(regex) = &regex {
            let groups = regex.captures_len() - 1;
            let wanted = replacement.max_group();
            if wanted > groups {
                return Err(cursor.error(CompileErrorKind::InvalidBackreference(wanted)));
            }
        }

        Ok(Substitution {
            regex,
            replacement,
            occurrence,
            global,
            print,
            write,
        })
    }

    /// Compile a pattern in the script's flavor; an empty pattern means "reuse
    /// the last regex" and compiles to `None`
    fn compile_regex(
        &self,
        cursor: &ScriptCursor,
        pattern: &str,
        case_insensitive: bool,
    ) -> Result<Option<Regex>, CompileError> {
        if pattern.is_empty() {
            return Ok(None);
        }

        let invalid = |message: String| {
            cursor.error(CompileErrorKind::InvalidRegex {
                pattern: pattern.to_string(),
                message,
            })
        };

        let converted = match self.regex_flavor {
            RegexFlavor::BRE => convert_bre(pattern),
            RegexFlavor::ERE => convert_ere(pattern),
        }
        .map_err(invalid)?;

        RegexBuilder::new(&converted)
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map(Some)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Commands that take no argument
fn bare_command(letter: char) -> CommandKind {
    match letter {
        '=' => CommandKind::PrintLineNumber,
        'd' => CommandKind::Delete,
        'D' => CommandKind::DeleteFirstSegment,
        'g' => CommandKind::HoldGet,
        'G' => CommandKind::HoldAppend,
        'h' => CommandKind::HoldSet,
        'H' => CommandKind::HoldMerge,
        'l' => CommandKind::List,
        'n' => CommandKind::NextLine,
        'N' => CommandKind::AppendNextLine,
        'p' => CommandKind::Print,
        'P' => CommandKind::PrintFirstSegment,
        'q' => CommandKind::Quit,
        _ => CommandKind::Exchange,
    }
}

/// Only blanks may separate a command from `;`, a newline, `}`, `#` or the
/// end of the script
fn expect_end(cursor: &mut ScriptCursor) -> Result<(), CompileError> {
    cursor.skip_blanks();
    match cursor.peek() {
        None | Some(';') | Some('\n') | Some('}') | Some('#') => Ok(()),
        Some(_) => Err(cursor.error(CompileErrorKind::ExtraCharacters)),
    }
}

/// Delimiter of an `s` or `y` command
fn read_delimiter(cursor: &mut ScriptCursor, command: char) -> Result<char, CompileError> {
    match cursor.next_char() {
        None => Err(cursor.error(CompileErrorKind::UnterminatedCommand(command))),
        Some(c @ ('\n' | '\\')) => Err(cursor.error(CompileErrorKind::InvalidDelimiter(c))),
        Some(c) => Ok(c),
    }
}

/// File name of `r`, `w` and the `w` flag: the rest of the line
fn read_filename(cursor: &mut ScriptCursor) -> Result<PathBuf, CompileError> {
    cursor.skip_blanks();
    let name = cursor.take_until(|c| c == '\n');
    if name.is_empty() {
        return Err(cursor.error(CompileErrorKind::EmptyFilename));
    }
    Ok(PathBuf::from(name))
}

fn open_write_file(
    cursor: &mut ScriptCursor,
    write_files: &mut WriteFiles,
) -> Result<crate::output::WriteTarget, CompileError> {
    let path = read_filename(cursor)?;
    write_files
        .open(&path)
        .map_err(|source| cursor.error(CompileErrorKind::OpenWriteFile { path, source }))
}

/// Point every labelled branch at its `:` command
fn resolve_branches(script: &mut Script) -> Result<(), CompileError> {
    for command in &mut script.commands {
        let line = command.line;
        if let Some(branch) = command.kind.branch_mut() {
            if let Some(label) = &branch.label {
                let target = script.labels.get(label).copied().ok_or_else(|| {
                    CompileError::new(line, CompileErrorKind::UndefinedLabel(label.clone()))
                })?;
                branch.target = Some(target);
            }
        }
    }
    Ok(())
}
