//! Input line sources
//!
//! The engine pulls lines through [`LineSource`]. [`InputChain`] joins a list
//! of files into one stream, opening each lazily and skipping the ones that
//! cannot be read.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use tracing::{debug, warn};

/// One input line without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// False only for a final line with no trailing newline
    pub has_newline: bool,
}

impl Line {
    pub fn new(text: impl Into<String>, has_newline: bool) -> Self {
        Self {
            text: text.into(),
            has_newline,
        }
    }
}

/// Anything the engine can read lines from
pub trait LineSource {
    fn next_line(&mut self) -> io::Result<Option<Line>>;
}

/// Lines from a single reader
pub struct ReaderSource<R: BufRead> {
    reader: R,
    name: String,
    buf: Vec<u8>,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            buf: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> io::Result<Option<Line>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }

        let has_newline = self.buf.last() == Some(&b'\n');
        if has_newline {
            self.buf.pop();
        }

        let text = match std::str::from_utf8(&self.buf) {
            Ok(text) => text.to_string(),
            Err(_) => {
                warn!("Invalid UTF-8 in {}, replacing undecodable bytes", self.name);
                String::from_utf8_lossy(&self.buf).into_owned()
            }
        };
        Ok(Some(Line { text, has_newline }))
    }
}

/// Open a named input; `-` is standard input. Directories are refused
/// here, since opening one succeeds and only the first read fails.
pub fn open_input(name: &str) -> io::Result<ReaderSource<Box<dyn BufRead>>> {
    let reader: Box<dyn BufRead> = if name == "-" {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(name)?;
        if file.metadata()?.is_dir() {
            return Err(io::Error::new(io::ErrorKind::IsADirectory, "Is a directory"));
        }
        Box::new(BufReader::new(file))
    };
    Ok(ReaderSource::new(reader, name))
}

/// Several inputs read back to back as one stream
pub struct InputChain {
    pending: VecDeque<String>,
    current: Option<ReaderSource<Box<dyn BufRead>>>,
    had_open_error: bool,
}

impl InputChain {
    /// Chain `names` in order; an empty list reads standard input
    pub fn new(names: &[String]) -> Self {
        let pending = if names.is_empty() {
            VecDeque::from([String::from("-")])
        } else {
            names.iter().cloned().collect()
        };
        Self {
            pending,
            current: None,
            had_open_error: false,
        }
    }

    /// True if any input could not be opened
    pub fn had_open_error(&self) -> bool {
        self.had_open_error
    }
}

impl LineSource for InputChain {
    fn next_line(&mut self) -> io::Result<Option<Line>> {
        loop {
            if let Some(source) = self.current.as_mut() {
                match source.next_line() {
                    Ok(Some(line)) => return Ok(Some(line)),
                    Ok(None) => {}
                    // A file that fails mid-read is dropped like one that never opened
                    Err(e) => {
                        report_open_error(source.name(), &e);
                        self.had_open_error = true;
                    }
                }
                self.current = None;
            }

            let Some(name) = self.pending.pop_front() else {
                return Ok(None);
            };
            match open_input(&name) {
                Ok(source) => {
                    debug!("Reading input from {}", name);
                    self.current = Some(source);
                }
                Err(e) => {
                    report_open_error(&name, &e);
                    self.had_open_error = true;
                }
            }
        }
    }
}

/// Tell the user an input was skipped
pub fn report_open_error(name: &str, error: &io::Error) {
    eprintln!("minised: {}", crate::error_helpers::format_input_error(name, error));
    warn!("Skipping unreadable input {}: {}", name, error);
}

/// Fixed lines, handy for driving the engine without files
#[derive(Debug, Default)]
pub struct VecSource {
    lines: VecDeque<Line>,
}

impl VecSource {
    /// Split `text` into lines the way a file reader would
    pub fn from_text(text: &str) -> Self {
        let mut lines = VecDeque::new();
        let mut rest = text;
        while !rest.is_empty() {
            match rest.find('\n') {
                Some(i) => {
                    lines.push_back(Line::new(&rest[..i], true));
                    rest = &rest[i + 1..];
                }
                None => {
                    lines.push_back(Line::new(rest, false));
                    rest = "";
                }
            }
        }
        Self { lines }
    }
}

impl LineSource for VecSource {
    fn next_line(&mut self) -> io::Result<Option<Line>> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn collect(source: &mut impl LineSource) -> Vec<Line> {
        std::iter::from_fn(|| source.next_line().unwrap()).collect()
    }

    #[test]
    fn test_reader_source_tracks_final_newline() {
        let mut source = ReaderSource::new("a\nb\nc".as_bytes(), "test");
        assert_eq!(
            collect(&mut source),
            vec![Line::new("a", true), Line::new("b", true), Line::new("c", false)]
        );

        let mut source = ReaderSource::new("a\n".as_bytes(), "test");
        assert_eq!(collect(&mut source), vec![Line::new("a", true)]);
    }

    #[test]
    fn test_reader_source_empty_lines() {
        let mut source = ReaderSource::new("\n\n".as_bytes(), "test");
        assert_eq!(collect(&mut source), vec![Line::new("", true), Line::new("", true)]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let bytes: &[u8] = b"ok\xff\n";
        let mut source = ReaderSource::new(bytes, "test");
        let line = source.next_line().unwrap().unwrap();
        assert_eq!(line.text, "ok\u{fffd}");
    }

    #[test]
    fn test_vec_source_matches_reader() {
        for text in ["", "x", "x\n", "x\ny", "\n"] {
            let mut from_reader = ReaderSource::new(text.as_bytes(), "test");
            let mut from_vec = VecSource::from_text(text);
            assert_eq!(collect(&mut from_reader), collect(&mut from_vec), "input {text:?}");
        }
    }

    #[test]
    fn test_chain_joins_files_and_skips_missing() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.txt");
        let second = dir.path().join("two.txt");
        std::fs::File::create(&first).unwrap().write_all(b"1\n2").unwrap();
        std::fs::File::create(&second).unwrap().write_all(b"3\n").unwrap();

        let names = vec![
            first.display().to_string(),
            dir.path().join("missing.txt").display().to_string(),
            second.display().to_string(),
        ];
        let mut chain = InputChain::new(&names);
        let texts: Vec<String> = collect(&mut chain).into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
        assert!(chain.had_open_error());
    }

    #[test]
    fn test_open_input_refuses_directory() {
        let dir = TempDir::new().unwrap();
        let err = open_input(dir.path().to_str().unwrap()).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }

    #[test]
    fn test_chain_skips_directory_and_continues() {
        let dir = TempDir::new().unwrap();
        let after = dir.path().join("after.txt");
        std::fs::write(&after, "after\n").unwrap();

        let names = vec![dir.path().display().to_string(), after.display().to_string()];
        let mut chain = InputChain::new(&names);
        let texts: Vec<String> = collect(&mut chain).into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["after"]);
        assert!(chain.had_open_error());
    }

    /// Reader whose first read fails
    struct BrokenReader;

    impl io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("device gone"))
        }
    }

    #[test]
    fn test_chain_skips_input_that_fails_mid_read() {
        let mut chain = InputChain::new(&[]);
        chain.pending.clear();
        chain.current = Some(ReaderSource::new(
            Box::new(BufReader::new(BrokenReader)) as Box<dyn BufRead>,
            "broken",
        ));
        assert_eq!(chain.next_line().unwrap(), None);
        assert!(chain.had_open_error());
    }
}
