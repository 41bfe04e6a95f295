//! Execution engine
//!
//! [`StreamProcessor`] runs a compiled script over a stream of lines.
//! [`FileProcessor`] wraps it for in-place editing: each file is processed
//! into a temporary file next to it, which then replaces the original.

use crate::address::{self, LineContext};
use crate::command::{Address, CaptureSet, CommandKind, Script};
use crate::config::{FinalNextAppend, ProcessingOptions};
use crate::error::{Result, SedError};
use crate::error_helpers::in_place_error;
use crate::input::{report_open_error, Line, LineSource, ReaderSource};
use crate::output::{escape_visible, OutputSink};
use crate::substitute::substitute;
use anyhow::Context;
use regex::Regex;
use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Mutable state of a run, shared by every cycle
#[derive(Debug, Default)]
pub struct InterpreterState {
    pub hold_space: String,
    /// Text from `a` and `r` waiting for the end of the cycle
    pub append_queue: VecDeque<String>,
    pub captures: CaptureSet,
    /// Regex an empty `//` stands for
    pub last_regex: Option<Regex>,
    /// Set by a successful `s`, cleared by `t` and at each new cycle
    pub substituted: bool,
    pub line_number: usize,
}

/// How a pass over the script ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleEnd {
    /// Fell off the end of the script (or a label-less branch)
    EndOfScript,
    /// `d`, `c`, or `D` without a newline: no automatic print
    Discard,
    /// `D` with a newline: run the script again on what is left
    Restart,
    /// `q`: print as usual, then stop reading input
    Quit,
    /// `N` on the last line: stop without printing
    Stop,
}

/// One line of lookahead over a [`LineSource`], so `$` can be recognised
struct Lookahead<'a, S: LineSource> {
    source: &'a mut S,
    next: Option<Line>,
}

impl<'a, S: LineSource> Lookahead<'a, S> {
    fn new(source: &'a mut S) -> Result<Self> {
        let next = source
            .next_line()
            .map_err(|e| SedError::io("couldn't read input", e))?;
        Ok(Self { source, next })
    }

    fn has_next(&self) -> bool {
        self.next.is_some()
    }

    fn take(&mut self) -> Result<Option<Line>> {
        let current = self.next.take();
        if current.is_some() {
            self.next = self
                .source
                .next_line()
                .map_err(|e| SedError::io("couldn't read input", e))?;
        }
        Ok(current)
    }
}

/// The current pattern space
#[derive(Debug, Default)]
struct PatternSpace {
    text: String,
    /// False when the text came from a final line with no newline
    has_newline: bool,
}

fn emit<W: Write>(output: &mut OutputSink<W>, text: &str, newline: bool) -> Result<()> {
    output
        .emit(text, newline)
        .map_err(|e| SedError::io("couldn't write to output", e))
}

/// Runs a compiled script over input streams
pub struct StreamProcessor {
    script: Script,
    options: ProcessingOptions,
    state: InterpreterState,
    quit: bool,
}

impl StreamProcessor {
    pub fn new(script: Script, options: ProcessingOptions) -> Self {
        Self {
            script,
            options,
            state: InterpreterState::default(),
            quit: false,
        }
    }

    pub fn state(&self) -> &InterpreterState {
        &self.state
    }

    /// True once `q` (or `n`/`N` at the end of input) has stopped the run
    pub fn has_quit(&self) -> bool {
        self.quit
    }

    fn quiet(&self) -> bool {
        self.options.quiet || self.script.quiet
    }

    /// Process one stream to the end, or until the script quits.
    ///
    /// Line numbers and open ranges start afresh for every stream; the hold
    /// space carries over.
    pub fn process<S: LineSource, W: Write>(
        &mut self,
        source: &mut S,
        output: &mut OutputSink<W>,
    ) -> Result<()> {
        self.state.line_number = 0;
        self.script.reset_ranges();
        let mut input = Lookahead::new(source)?;

        while !self.quit {
            self.flush_append_queue(output)?;
            let Some(line) = input.take()? else {
                break;
            };
            self.state.line_number += 1;
            self.state.substituted = false;
            trace!(line = self.state.line_number, "cycle");

            let mut space = PatternSpace {
                text: line.text,
                has_newline: line.has_newline,
            };

            loop {
                match self.run_script(&mut space, &mut input, output)? {
                    CycleEnd::Restart => continue,
                    CycleEnd::EndOfScript => self.autoprint(&space, output)?,
                    CycleEnd::Discard => {}
                    CycleEnd::Quit => {
                        self.autoprint(&space, output)?;
                        self.quit = true;
                    }
                    CycleEnd::Stop => self.quit = true,
                }
                break;
            }

            if self.options.unbuffered {
                output
                    .flush()
                    .map_err(|e| SedError::io("couldn't flush output", e))?;
            }
        }

        self.flush_append_queue(output)?;
        output
            .flush()
            .map_err(|e| SedError::io("couldn't flush output", e))
    }

    /// Flush every `w` file; call once after the last stream
    pub fn finish(&mut self) -> Result<()> {
        self.script.write_files.flush_all()
    }

    fn autoprint<W: Write>(&self, space: &PatternSpace, output: &mut OutputSink<W>) -> Result<()> {
        if self.quiet() {
            return Ok(());
        }
        emit(output, &space.text, space.has_newline)
    }

    fn flush_append_queue<W: Write>(&mut self, output: &mut OutputSink<W>) -> Result<()> {
        while let Some(text) = self.state.append_queue.pop_front() {
            emit(output, &text, true)?;
        }
        Ok(())
    }

    /// Walk the script once over the pattern space
    fn run_script<S: LineSource, W: Write>(
        &mut self,
        space: &mut PatternSpace,
        input: &mut Lookahead<'_, S>,
        output: &mut OutputSink<W>,
    ) -> Result<CycleEnd> {
        let quiet = self.quiet();
        let Self {
            script,
            options,
            state,
            ..
        } = self;
        let mut pc = 0;

        while pc < script.commands.len() {
            let command = &mut script.commands[pc];
            let ctx = LineContext {
                line_number: state.line_number,
                pattern_space: &space.text,
                has_next: input.has_next(),
            };
            let applies = address::matches(command, &ctx, state.last_regex.as_ref())?;

            if !applies {
                pc = match command.kind {
                    CommandKind::BlockOpen { close } => close + 1,
                    _ => pc + 1,
                };
                continue;
            }

            if let Some(Address::Regex(Some(regex))) = &command.address1 {
                state.last_regex = Some(regex.clone());
            }
            pc += 1;

            match &command.kind {
                CommandKind::BlockOpen { .. }
                | CommandKind::BlockClose
                | CommandKind::Label(_) => {}
                CommandKind::Print => emit(output, &space.text, space.has_newline)?,
                CommandKind::PrintFirstSegment => match space.text.split_once('\n') {
                    Some((first, _)) => emit(output, first, true)?,
                    None => emit(output, &space.text, space.has_newline)?,
                },
                CommandKind::Delete => return Ok(CycleEnd::Discard),
                CommandKind::DeleteFirstSegment => {
                    return Ok(match space.text.find('\n') {
                        Some(i) => {
                            space.text.drain(..=i);
                            CycleEnd::Restart
                        }
                        None => CycleEnd::Discard,
                    });
                }
                CommandKind::Substitute(sub) => {
                    let outcome = substitute(
                        sub,
                        &mut space.text,
                        &mut state.last_regex,
                        &mut state.captures,
                    )?;
                    if outcome.replaced() {
                        state.substituted = true;
                        if sub.print {
                            emit(output, &space.text, space.has_newline)?;
                        }
                        if let Some(target) = &sub.write {
                            target.borrow_mut().emit(&space.text, space.has_newline)?;
                        }
                    }
                }
                CommandKind::Append(text) => state.append_queue.push_back(text.clone()),
                CommandKind::Insert(text) => emit(output, text, true)?,
                CommandKind::Change(text) => {
                    // Inside a range, only the last line gets the text
                    if !command.in_range {
                        emit(output, text, true)?;
                    }
                    return Ok(CycleEnd::Discard);
                }
                CommandKind::ReadFile(path) => queue_file(path, &mut state.append_queue),
                CommandKind::WriteFile(target) => {
                    target.borrow_mut().emit(&space.text, space.has_newline)?;
                }
                CommandKind::PrintLineNumber => {
                    emit(output, &state.line_number.to_string(), true)?;
                }
                CommandKind::NextLine => {
                    if !input.has_next() {
                        return Ok(CycleEnd::Quit);
                    }
                    if !quiet {
                        emit(output, &space.text, space.has_newline)?;
                    }
                    while let Some(text) = state.append_queue.pop_front() {
                        emit(output, &text, true)?;
                    }
                    if let Some(line) = input.take()? {
                        space.text = line.text;
                        space.has_newline = line.has_newline;
                        state.line_number += 1;
                    }
                }
                CommandKind::AppendNextLine => match input.take()? {
                    Some(line) => {
                        space.text.push('\n');
                        space.text.push_str(&line.text);
                        space.has_newline = line.has_newline;
                        state.line_number += 1;
                    }
                    None => {
                        return Ok(match options.final_next_append {
                            FinalNextAppend::Discard => CycleEnd::Stop,
                            FinalNextAppend::Print => CycleEnd::Quit,
                        });
                    }
                },
                CommandKind::Translate(table) => space.text = table.apply(&space.text),
                CommandKind::HoldGet => space.text.clone_from(&state.hold_space),
                CommandKind::HoldAppend => {
                    space.text.push('\n');
                    space.text.push_str(&state.hold_space);
                    space.has_newline = true;
                }
                CommandKind::HoldSet => state.hold_space.clone_from(&space.text),
                CommandKind::HoldMerge => {
                    state.hold_space.push('\n');
                    state.hold_space.push_str(&space.text);
                }
                CommandKind::Exchange => {
                    std::mem::swap(&mut space.text, &mut state.hold_space);
                    space.has_newline = true;
                }
                CommandKind::Branch(branch) => match branch.target {
                    Some(target) => {
                        debug!(line = state.line_number, target, "branch");
                        pc = target;
                    }
                    None => return Ok(CycleEnd::EndOfScript),
                },
                CommandKind::BranchIfSubstituted(branch) => {
                    if state.substituted {
                        state.substituted = false;
                        match branch.target {
                            Some(target) => {
                                debug!(line = state.line_number, target, "branch on substitution");
                                pc = target;
                            }
                            None => return Ok(CycleEnd::EndOfScript),
                        }
                    }
                }
                CommandKind::BranchIfNotSubstituted(branch) => {
                    if !state.substituted {
                        match branch.target {
                            Some(target) => {
                                debug!(line = state.line_number, target, "branch without substitution");
                                pc = target;
                            }
                            None => return Ok(CycleEnd::EndOfScript),
                        }
                    }
                }
                CommandKind::Quit => return Ok(CycleEnd::Quit),
                CommandKind::List => {
                    emit(output, &escape_visible(&space.text, options.line_wrap), true)?;
                }
            }
        }

        Ok(CycleEnd::EndOfScript)
    }
}

/// Queue every line of `path` for output; an unreadable file adds nothing
fn queue_file(path: &Path, queue: &mut VecDeque<String>) {
    match fs::read(path) {
        Ok(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            queue.extend(text.lines().map(str::to_string));
        }
        Err(e) => debug!("Ignoring unreadable file {}: {}", path.display(), e),
    }
}

/// Edits files in place with a [`StreamProcessor`]
pub struct FileProcessor {
    processor: StreamProcessor,
    /// Keep the original as `FILE` + suffix; `*` in the suffix stands for
    /// the file name
    backup_suffix: Option<String>,
    had_open_error: bool,
}

impl FileProcessor {
    pub fn new(processor: StreamProcessor, backup_suffix: Option<String>) -> Self {
        Self {
            processor,
            backup_suffix: backup_suffix.filter(|s| !s.is_empty()),
            had_open_error: false,
        }
    }

    /// True if some file could not be opened
    pub fn had_open_error(&self) -> bool {
        self.had_open_error
    }

    pub fn has_quit(&self) -> bool {
        self.processor.has_quit()
    }

    /// Run the script over `file_path` and replace it with the output.
    ///
    /// A file that cannot be opened is reported and skipped.
    pub fn apply_to_file(&mut self, file_path: &Path) -> anyhow::Result<()> {
        let name = file_path.display().to_string();
        let metadata = match fs::metadata(file_path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                eprintln!("minised: couldn't edit {}: not a regular file", name);
                self.had_open_error = true;
                return Ok(());
            }
            Err(e) => {
                report_open_error(&name, &e);
                self.had_open_error = true;
                return Ok(());
            }
        };
        let input_file = match File::open(file_path) {
            Ok(file) => file,
            Err(e) => {
                report_open_error(&name, &e);
                self.had_open_error = true;
                return Ok(());
            }
        };

        // Temp file in the same directory so the final rename stays atomic
        let parent_dir = file_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp_file = NamedTempFile::new_in(parent_dir)
            .map_err(|e| anyhow::anyhow!(in_place_error(file_path, &e)))?;

        // Write using a separate block to ensure writer is dropped before persist
        {
            let mut source = ReaderSource::new(BufReader::new(input_file), name.clone());
            let mut sink = OutputSink::new(BufWriter::new(temp_file.as_file()));
            self.processor.process(&mut source, &mut sink)?;
        }

        fs::set_permissions(temp_file.path(), metadata.permissions())
            .with_context(|| format!("Failed to copy permissions to {}", temp_file.path().display()))?;

        if let Some(suffix) = &self.backup_suffix {
            let backup = backup_path(file_path, suffix);
            fs::copy(file_path, &backup)
                .with_context(|| format!("Failed to keep backup {}", backup.display()))?;
            debug!("Kept original as {}", backup.display());
        }

        // Atomic rename: temp file becomes the actual file
        temp_file
            .persist(file_path)
            .with_context(|| format!("Failed to persist temp file to {}", file_path.display()))?;
        debug!("Edited {} in place", name);
        Ok(())
    }

    /// Flush `w` files once every input is done
    pub fn finish(&mut self) -> anyhow::Result<()> {
        self.processor.finish()?;
        Ok(())
    }
}

/// Where the original of `file_path` is kept for a given `-i` suffix
pub fn backup_path(file_path: &Path, suffix: &str) -> PathBuf {
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if suffix.contains('*') {
        let name = suffix.replace('*', &file_name);
        // A suffix with a directory part is relative to the file's directory
        match file_path.parent() {
            Some(parent) if !Path::new(&name).is_absolute() => parent.join(name),
            _ => PathBuf::from(name),
        }
    } else {
        file_path.with_file_name(format!("{}{}", file_name, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RegexFlavor;
    use crate::input::VecSource;
    use crate::parser::Parser;
    use tempfile::TempDir;

    fn run_with(script: &str, input: &str, options: ProcessingOptions) -> String {
        let compiled = Parser::new(options.regex_flavor)
            .parse(script)
            .expect("script should compile");
        let mut processor = StreamProcessor::new(compiled, options);
        let mut source = VecSource::from_text(input);
        let mut sink = OutputSink::new(Vec::new());
        processor.process(&mut source, &mut sink).expect("script should run");
        processor.finish().expect("write files should flush");
        String::from_utf8(sink.into_inner()).unwrap()
    }

    fn run(script: &str, input: &str) -> String {
        run_with(script, input, ProcessingOptions::default())
    }

    fn run_quiet(script: &str, input: &str) -> String {
        let options = ProcessingOptions {
            quiet: true,
            ..ProcessingOptions::default()
        };
        run_with(script, input, options)
    }

    #[test]
    fn test_empty_script_is_identity() {
        assert_eq!(run("", "a\nb\n"), "a\nb\n");
        assert_eq!(run("", "a\nb"), "a\nb");
        assert_eq!(run("", ""), "");
    }

    #[test]
    fn test_substitute_and_print_flag() {
        assert_eq!(run("s/a/X/", "aa\nba\n"), "Xa\nbX\n");
        assert_eq!(run_quiet("s/a/X/p", "a\nb\n"), "X\n");
    }

    #[test]
    fn test_delete_range() {
        assert_eq!(run("2,4d", "1\n2\n3\n4\n5\n6\n"), "1\n5\n6\n");
        assert_eq!(run("$d", "1\n2\n3\n"), "1\n2\n");
    }

    #[test]
    fn test_print_without_trailing_newline() {
        assert_eq!(run("p", "a"), "a\na");
        assert_eq!(run("$a\\\nend", "x"), "x\nend\n");
    }

    #[test]
    fn test_quiet_marker_in_script() {
        assert_eq!(run("#n\n2p", "1\n2\n3\n"), "2\n");
    }

    #[test]
    fn test_insert_append_change() {
        assert_eq!(run("2i\\\nbefore", "1\n2\n"), "1\nbefore\n2\n");
        assert_eq!(run("1a after", "1\n2\n"), "1\nafter\n2\n");
        assert_eq!(run("2c\\\nchanged", "1\n2\n3\n"), "1\nchanged\n3\n");
    }

    #[test]
    fn test_change_on_range_prints_once() {
        assert_eq!(run("2,3c\\\nX", "1\n2\n3\n4\n"), "1\nX\n4\n");
        assert_eq!(run("2,3!c\\\nX", "1\n2\n3\n4\n"), "X\n2\n3\nX\n");
    }

    #[test]
    fn test_line_number_command() {
        assert_eq!(run_quiet("$=", "a\nb\nc\n"), "3\n");
    }

    #[test]
    fn test_quit_prints_current_line_and_queue() {
        assert_eq!(run("2q", "1\n2\n3\n"), "1\n2\n");
        assert_eq!(run("1{a\\\nafter\nq\n}", "1\n2\n"), "1\nafter\n");
    }

    #[test]
    fn test_next_line() {
        assert_eq!(run_quiet("n;p", "1\n2\n3\n4\n"), "2\n4\n");
        assert_eq!(run("$!n;s/^/>/", "1\n2\n3\n"), "1\n>2\n>3\n");
        // `n` on the last line ends the run without printing twice
        assert_eq!(run("n;d", "1\n2\n3\n"), "1\n3\n");
    }

    #[test]
    fn test_append_next_line() {
        assert_eq!(run("N;s/\\n/-/", "1\n2\n3\n4\n"), "1-2\n3-4\n");
        // Odd line count: the last line is dropped by default
        assert_eq!(run("N;s/\\n/-/", "1\n2\n3\n"), "1-2\n");
    }

    #[test]
    fn test_append_next_line_print_policy() {
        let options = ProcessingOptions {
            final_next_append: FinalNextAppend::Print,
            ..ProcessingOptions::default()
        };
        assert_eq!(run_with("N;s/\\n/-/", "1\n2\n3\n", options), "1-2\n3\n");
    }

    #[test]
    fn test_join_all_lines() {
        assert_eq!(run(":a;N;$!ba;s/\\n/,/g", "a\nb\nc\n"), "a,b,c\n");
    }

    #[test]
    fn test_print_and_delete_first_segment() {
        // Print the last two lines
        assert_eq!(run("$!N;$!D", "1\n2\n3\n4\n"), "3\n4\n");
        assert_eq!(run_quiet("N;P", "a\nb\n"), "a\n");
        assert_eq!(run("$!N;P;D", "1\n2\n3\n"), "1\n2\n3\n");
    }

    #[test]
    fn test_hold_space_commands() {
        assert_eq!(run("h;g", "x\ny\n"), "x\ny\n");
        // Reverse lines
        assert_eq!(run_quiet("1!G;h;$p", "1\n2\n3\n"), "3\n2\n1\n");
        assert_eq!(run("x", "a\nb\n"), "\na\n");
        assert_eq!(run_quiet("H;$!d;x;p", "a\nb\n"), "\na\nb\n");
    }

    #[test]
    fn test_translate() {
        assert_eq!(run("y/abc/xyz/", "aabbcc\n"), "xxyyzz\n");
    }

    #[test]
    fn test_branch_on_substitution_loop() {
        assert_eq!(run(":top\ns/x/y/\nt top", "xxx\n"), "yyy\n");
        assert_eq!(run("s/a/A/;T;s/$/!/", "a\nb\n"), "A!\nb\n");
        assert_eq!(run("s/a/A/;Tskip;s/$/!/;:skip", "a\nb\n"), "A!\nb\n");
    }

    #[test]
    fn test_t_flag_resets_each_cycle() {
        // The substitution on line 1 must not make `t` jump on line 2
        assert_eq!(run("s/a/A/;2t end;s/$/!/;:end", "a\nb\n"), "A!\nb!\n");
        // `n` does not start a new cycle, so the flag survives it
        assert_eq!(run("s/a/A/;n;t end;s/$/!/;:end", "a\nb\n"), "A\nb\n");
    }

    #[test]
    fn test_branch_to_end() {
        assert_eq!(run("/skip/b;s/$/!/", "skip\nx\n"), "skip\nx!\n");
    }

    #[test]
    fn test_blocks_skip_when_not_matching() {
        assert_eq!(run("/x/{s/x/X/;s/$/!/}", "x\ny\n"), "X!\ny\n");
        assert_eq!(run("/x/!{s/$/!/}", "x\ny\n"), "x\ny!\n");
    }

    #[test]
    fn test_regex_ranges() {
        let input = "a\nstart\nb\nend\nc\n";
        assert_eq!(run("/start/,/end/d", input), "a\nc\n");
        assert_eq!(run_quiet("/start/,/end/p", input), "start\nb\nend\n");
    }

    #[test]
    fn test_empty_regex_reuses_address() {
        assert_eq!(run("/b/s//X/", "abc\nxyz\n"), "aXc\nxyz\n");
    }

    #[test]
    fn test_no_previous_regex_error() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("s//x/").unwrap();
        let mut processor = StreamProcessor::new(compiled, ProcessingOptions::default());
        let mut source = VecSource::from_text("a\n");
        let mut sink = OutputSink::new(Vec::new());
        let err = processor.process(&mut source, &mut sink).unwrap_err();
        assert!(matches!(err, SedError::NoPreviousRegex));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_list_command() {
        assert_eq!(run_quiet("l", "a\tb\n"), "a\\tb$\n");
        let options = ProcessingOptions {
            quiet: true,
            line_wrap: 5,
            ..ProcessingOptions::default()
        };
        assert_eq!(run_with("l", "abcdefgh\n", options), "abcd\\\nefgh$\n");
    }

    #[test]
    fn test_read_file_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("insert.txt");
        fs::write(&path, "r1\nr2").unwrap();
        let script = format!("1r {}", path.display());
        assert_eq!(run(&script, "a\nb\n"), "a\nr1\nr2\nb\n");

        let missing = format!("1r {}", dir.path().join("nope").display());
        assert_eq!(run(&missing, "a\n"), "a\n");
    }

    #[test]
    fn test_write_file_commands() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        let script = format!("/a/w {}\ns/b/B/w {}", path.display(), path.display());
        assert_eq!(run(&script, "a1\nb2\nc3"), "a1\nB2\nc3");
        assert_eq!(fs::read_to_string(&path).unwrap(), "a1\nB2\n");
    }

    #[test]
    fn test_hold_persists_across_streams() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("x").unwrap();
        let mut processor = StreamProcessor::new(compiled, ProcessingOptions::default());
        let mut sink = OutputSink::new(Vec::new());
        processor.process(&mut VecSource::from_text("1\n"), &mut sink).unwrap();
        processor.process(&mut VecSource::from_text("2\n"), &mut sink).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "\n1\n");
        assert_eq!(processor.state().hold_space, "2");
    }

    #[test]
    fn test_line_numbers_restart_per_stream() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("$=").unwrap();
        let options = ProcessingOptions {
            quiet: true,
            ..ProcessingOptions::default()
        };
        let mut processor = StreamProcessor::new(compiled, options);
        let mut sink = OutputSink::new(Vec::new());
        processor.process(&mut VecSource::from_text("a\nb\n"), &mut sink).unwrap();
        processor.process(&mut VecSource::from_text("c\n"), &mut sink).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "2\n1\n");
    }

    /// Writer that accepts a fixed number of writes, then reports a full disk
    struct FullDisk {
        writes_left: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.writes_left == 0 {
                return Err(std::io::Error::other("disk full"));
            }
            self.writes_left -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_write_failure_is_fatal() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("p").unwrap();
        let mut processor = StreamProcessor::new(compiled, ProcessingOptions::default());
        let mut source = VecSource::from_text("1\n2\n3\n4\n5\n");
        let mut sink = OutputSink::new(FullDisk { writes_left: 3 });

        let err = processor.process(&mut source, &mut sink).unwrap_err();
        assert!(matches!(err, SedError::Io { .. }), "got {err:?}");
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "couldn't write to output");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_write_file_failure_is_fatal() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("w /dev/full").unwrap();
        let mut processor = StreamProcessor::new(compiled, ProcessingOptions::default());
        let mut sink = OutputSink::new(Vec::new());

        let result = processor
            .process(&mut VecSource::from_text("a\nb\n"), &mut sink)
            .and_then(|()| processor.finish());
        let err = result.unwrap_err();
        assert!(matches!(err, SedError::Io { .. }), "got {err:?}");
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("/dev/full"));
    }

    #[test]
    fn test_quit_stops_later_streams() {
        let compiled = Parser::new(RegexFlavor::BRE).parse("q").unwrap();
        let mut processor = StreamProcessor::new(compiled, ProcessingOptions::default());
        let mut sink = OutputSink::new(Vec::new());
        processor.process(&mut VecSource::from_text("a\nb\n"), &mut sink).unwrap();
        assert!(processor.has_quit());
        processor.process(&mut VecSource::from_text("c\n"), &mut sink).unwrap();
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "a\n");
    }

    #[test]
    fn test_in_place_edit_with_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.txt");
        fs::write(&path, "hello\nworld\n").unwrap();

        let compiled = Parser::new(RegexFlavor::BRE).parse("s/o/0/g").unwrap();
        let options = ProcessingOptions {
            separate: true,
            ..ProcessingOptions::default()
        };
        let mut files = FileProcessor::new(
            StreamProcessor::new(compiled, options),
            Some(".bak".to_string()),
        );
        files.apply_to_file(&path).unwrap();
        files.finish().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hell0\nw0rld\n");
        assert_eq!(
            fs::read_to_string(dir.path().join("file.txt.bak")).unwrap(),
            "hello\nworld\n"
        );
        assert!(!files.had_open_error());
    }

    #[test]
    fn test_in_place_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let compiled = Parser::new(RegexFlavor::BRE).parse("p").unwrap();
        let mut files = FileProcessor::new(
            StreamProcessor::new(compiled, ProcessingOptions::default()),
            None,
        );
        files.apply_to_file(&dir.path().join("absent")).unwrap();
        assert!(files.had_open_error());
    }

    #[cfg(unix)]
    #[test]
    fn test_in_place_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("script.sh");
        fs::write(&path, "echo hi\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o750)).unwrap();

        let compiled = Parser::new(RegexFlavor::BRE).parse("s/hi/bye/").unwrap();
        let mut files = FileProcessor::new(
            StreamProcessor::new(compiled, ProcessingOptions::default()),
            None,
        );
        files.apply_to_file(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(fs::read_to_string(&path).unwrap(), "echo bye\n");
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("dir/a.txt"), ".orig"),
            PathBuf::from("dir/a.txt.orig")
        );
        assert_eq!(
            backup_path(Path::new("dir/a.txt"), "old_*"),
            PathBuf::from("dir/old_a.txt")
        );
    }
}
