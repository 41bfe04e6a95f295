//! minised: a small stream editor
//!
//! This library exposes the script compiler and execution engine for use by
//! the binary and by property-based tests. The main binary is at src/main.rs.

pub mod address;
pub mod bre_converter;
pub mod cli;
pub mod command;
pub mod config;
pub mod delimiter;
pub mod ere_converter;
pub mod error;
pub mod error_helpers;
pub mod file_processor;
pub mod input;
pub mod logger;
pub mod output;
pub mod parser;
pub mod substitute;

// Re-export commonly used types for convenience
pub use cli::RegexFlavor;
pub use command::{Address, Command, CommandKind, Script};
pub use config::{FinalNextAppend, ProcessingOptions};
pub use error::{CompileError, CompileErrorKind, SedError};
pub use file_processor::{FileProcessor, InterpreterState, StreamProcessor};
pub use input::{Line, LineSource, VecSource};
pub use output::OutputSink;
pub use parser::Parser;

/// Compile `script` and run it over `input`, returning everything printed
pub fn process_text(script: &str, input: &str, options: &ProcessingOptions) -> error::Result<String> {
    let compiled = Parser::new(options.regex_flavor).parse(script)?;
    let mut processor = StreamProcessor::new(compiled, options.clone());
    let mut source = VecSource::from_text(input);
    let mut sink = OutputSink::new(Vec::new());
    processor.process(&mut source, &mut sink)?;
    processor.finish()?;
    Ok(String::from_utf8_lossy(&sink.into_inner()).into_owned())
}
