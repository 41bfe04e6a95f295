//! Error types for script compilation and execution
//!
//! Compile errors carry the script line they were found on. Runtime errors
//! are fatal: the engine stops at the first one.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the compiler and the execution engine
pub type Result<T> = std::result::Result<T, SedError>;

/// Everything that can stop a run
#[derive(Debug, Error)]
pub enum SedError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// An `s` command with an empty pattern ran before any regex was used
    #[error("no previous regular expression")]
    NoPreviousRegex,

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl SedError {
    /// Wrap an I/O error with a description of what was being done
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        SedError::Io {
            context: context.into(),
            source,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            SedError::Compile(_) => 1,
            SedError::NoPreviousRegex => 1,
            SedError::Io { .. } => 4,
        }
    }
}

/// A script that could not be compiled
#[derive(Debug, Error)]
#[error("script line {line}: {kind}")]
pub struct CompileError {
    /// 1-based script line
    pub line: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(line: usize, kind: CompileErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Error)]
pub enum CompileErrorKind {
    #[error("unmatched `{0}'")]
    UnmatchedDelimiter(char),

    #[error("unterminated `{0}' command")]
    UnterminatedCommand(char),

    #[error("delimiter `{0}' is not allowed")]
    InvalidDelimiter(char),

    #[error("missing filename in r/w commands")]
    EmptyFilename,

    #[error("missing command")]
    MissingCommand,

    #[error("unknown command: `{0}'")]
    UnknownCommand(char),

    #[error("unknown option to `s': `{0}'")]
    BadSubstitutionFlag(char),

    #[error("strings for `y' command are different lengths")]
    TranslateLengthMismatch,

    #[error("extra characters after command")]
    ExtraCharacters,

    #[error("unexpected `,'")]
    MissingSecondAddress,

    #[error("invalid usage of line address 0")]
    ZeroLineAddress,

    #[error("line number too large: {0}")]
    LineNumberOverflow(String),

    #[error("multiple `!'s")]
    MultipleNegation,

    #[error("{0} doesn't want any addresses")]
    NoAddressAllowed(char),

    #[error("\":\" lacks a label")]
    MissingLabel,

    #[error("expected \\ after `a', `c' or `i'")]
    MissingText,

    #[error("duplicate label `{0}'")]
    DuplicateLabel(String),

    #[error("can't find label for jump to `{0}'")]
    UndefinedLabel(String),

    #[error("unexpected `}}'")]
    UnexpectedBlockClose,

    #[error("unmatched `{{'")]
    UnterminatedBlock,

    #[error("invalid reference \\{0} on `s' command's RHS")]
    InvalidBackreference(usize),

    #[error("invalid regular expression `{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("couldn't open file {}: {source}", .path.display())]
    OpenWriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
