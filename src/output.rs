//! Output sinks
//!
//! Every write goes through an [`OutputSink`], which remembers whether the
//! previous write left its line unterminated. That only happens for the last
//! input line when it had no trailing newline; any later write first closes
//! that line.

use crate::error::{Result, SedError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Line-oriented writer that tracks a missing trailing newline
#[derive(Debug)]
pub struct OutputSink<W: Write> {
    inner: W,
    missing_newline: bool,
}

impl<W: Write> OutputSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            missing_newline: false,
        }
    }

    /// Write `text`, terminated by a newline unless `newline` is false
    pub fn emit(&mut self, text: &str, newline: bool) -> io::Result<()> {
        if self.missing_newline {
            self.inner.write_all(b"\n")?;
        }
        self.inner.write_all(text.as_bytes())?;
        if newline {
            self.inner.write_all(b"\n")?;
        }
        self.missing_newline = !newline;
        Ok(())
    }

    /// True if the last write did not end in a newline
    pub fn missing_newline(&self) -> bool {
        self.missing_newline
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// File opened by a `w` command or an `s///w` flag
#[derive(Debug)]
pub struct WriteFile {
    path: PathBuf,
    sink: OutputSink<BufWriter<File>>,
}

impl WriteFile {
    /// Create (or truncate) the file
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            sink: OutputSink::new(BufWriter::new(file)),
        })
    }

    pub fn emit(&mut self, text: &str, newline: bool) -> Result<()> {
        self.sink
            .emit(text, newline)
            .map_err(|e| SedError::io(format!("couldn't write to {}", self.path.display()), e))
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink
            .flush()
            .map_err(|e| SedError::io(format!("couldn't flush {}", self.path.display()), e))
    }
}

/// Shared handle: several commands may write to the same file
pub type WriteTarget = Rc<RefCell<WriteFile>>;

/// All write files of a script, one per distinct path
#[derive(Debug, Default)]
pub struct WriteFiles {
    files: HashMap<PathBuf, WriteTarget>,
}

impl WriteFiles {
    /// Return the handle for `path`, creating the file on first use
    pub fn open(&mut self, path: &Path) -> io::Result<WriteTarget> {
        if let Some(existing) = self.files.get(path) {
            return Ok(Rc::clone(existing));
        }
        let target = Rc::new(RefCell::new(WriteFile::create(path)?));
        self.files.insert(path.to_path_buf(), Rc::clone(&target));
        Ok(target)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn flush_all(&self) -> Result<()> {
        for target in self.files.values() {
            target.borrow_mut().flush()?;
        }
        Ok(())
    }
}

/// Render `text` the way the `l` command shows it.
///
/// Backslash and the usual control characters get C escapes, any other
/// non-printable byte becomes `\ooo`, output lines are broken with a
/// trailing `\` so none is longer than `width`, and the result ends in `$`.
/// A `width` of 0 or 1 disables wrapping.
pub fn escape_visible(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    let mut column = 0;

    for &byte in text.as_bytes() {
        let piece = match byte {
            b'\\' => "\\\\".to_string(),
            0x07 => "\\a".to_string(),
            0x08 => "\\b".to_string(),
            0x0c => "\\f".to_string(),
            b'\n' => "\\n".to_string(),
            b'\r' => "\\r".to_string(),
            b'\t' => "\\t".to_string(),
            0x0b => "\\v".to_string(),
            0x20..=0x7e => (byte as char).to_string(),
            _ => format!("\\{:03o}", byte),
        };

        if width > 1 && column + piece.len() > width - 1 {
            out.push_str("\\\n");
            column = 0;
        }
        column += piece.len();
        out.push_str(&piece);
    }

    out.push('$');
    out
}
