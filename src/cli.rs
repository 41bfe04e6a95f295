use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use crate::config::ProcessingOptions;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser, Debug)]
#[command(name = "minised")]
#[command(about = "A small stream editor")]
#[command(long_about = "minised reads input line by line, runs a sed script over each line,
and writes the result to standard output.

SCRIPTS:
  The script is the first argument unless -e or -f is given. Several -e and
  -f pieces are joined with newlines in the order they appear.

REGEX SYNTAX:
  BRE (default)         - POSIX basic syntax: \\( \\), \\{ \\}, \\+, \\?, \\|
  -E, -r                - POSIX extended syntax: ( ), { }, +, ?, |

CONFIGURATION:
  Defaults are read from ~/.minised/config.toml, or from the file named by
  $MINISED_CONFIG. Command-line flags win over the file.

EXAMPLES:
  minised 's/foo/bar/g' file.txt          Replace all occurrences
  cat file.txt | minised -n '/error/p'    Print matching lines only
  minised '5,10d' file.txt                Delete lines 5-10
  minised -E 's/(a|b)+/X/' file.txt       Extended regex
  minised --in-place=.bak 's/old/new/' *.txt  Edit in place, keep backups
  minised ':a;N;$!ba;s/\\n/,/g' list.txt   Join all lines with commas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
struct Cli {
    /// Script, when no -e or -f is given; otherwise the first input file
    #[arg(value_name = "SCRIPT")]
    script: Option<String>,

    /// Input files; standard input when none are given
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Suppress automatic printing of the pattern space
    #[arg(short = 'n', long = "quiet", visible_alias = "silent")]
    quiet: bool,

    /// Add script text
    #[arg(short = 'e', long = "expression", value_name = "SCRIPT")]
    expressions: Vec<String>,

    /// Add the contents of a script file
    #[arg(short = 'f', long = "file", value_name = "SCRIPT_FILE")]
    script_files: Vec<PathBuf>,

    /// Use Extended Regular Expressions (ERE)
    #[arg(short = 'E', short_alias = 'r', long = "regexp-extended")]
    extended: bool,

    /// Edit files in place, keeping the original as FILE+SUFFIX if given
    #[arg(
        short = 'i',
        long = "in-place",
        value_name = "SUFFIX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    in_place: Option<String>,

    /// Treat each file as a separate stream
    #[arg(short = 's', long)]
    separate: bool,

    /// Wrap width for the `l` command (0 disables wrapping)
    #[arg(short = 'l', long = "line-length", value_name = "N")]
    line_length: Option<usize>,

    /// Flush output after every line
    #[arg(short = 'u', long)]
    unbuffered: bool,

    /// Write a debug log
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexFlavor {
    /// Basic Regular Expressions (POSIX default)
    BRE,
    /// Extended Regular Expressions (sed -E compatible)
    ERE,
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Full script text, pieces joined with newlines
    pub script: String,
    pub files: Vec<String>,
    pub quiet: bool,
    /// Only set when -E/-r is given, so the config file can pick ERE too
    pub regex_flavor: Option<RegexFlavor>,
    /// Backup suffix for in-place editing; empty keeps no backup
    pub in_place: Option<String>,
    pub separate: bool,
    pub line_length: Option<usize>,
    pub unbuffered: bool,
    pub debug: bool,
}

impl Args {
    /// Lay the command-line flags over options taken from the config
    pub fn apply_to(&self, options: &mut ProcessingOptions) {
        options.quiet |= self.quiet;
        if let Some(flavor) = self.regex_flavor {
            options.regex_flavor = flavor;
        }
        if let Some(width) = self.line_length {
            options.line_wrap = width;
        }
        options.unbuffered |= self.unbuffered;
        options.separate = self.separate || self.in_place.is_some();
    }
}

pub fn parse_args() -> Result<Args> {
    parse_args_from(std::env::args_os())
}

/// Parse an explicit argument list; the first item is the program name
pub fn parse_args_from<I, T>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let cli = Cli::from_arg_matches(&matches)?;

    let pieces = script_pieces(&matches, &cli)?;
    let mut files = cli.files;
    let script = if pieces.is_empty() {
        cli.script
            .context("Missing script. Usage: minised [OPTIONS] SCRIPT [FILE]...")?
    } else {
        // With -e/-f every positional argument is an input file
        if let Some(first) = cli.script {
            files.insert(0, first);
        }
        pieces.join("\n")
    };

    if cli.in_place.is_some() && files.is_empty() {
        anyhow::bail!("No input files given for in-place editing");
    }

    Ok(Args {
        script,
        files,
        quiet: cli.quiet,
        regex_flavor: cli.extended.then_some(RegexFlavor::ERE),
        in_place: cli.in_place,
        separate: cli.separate,
        line_length: cli.line_length,
        unbuffered: cli.unbuffered,
        debug: cli.debug,
    })
}

/// Collect -e and -f pieces in command-line order
fn script_pieces(matches: &ArgMatches, cli: &Cli) -> Result<Vec<String>> {
    let mut pieces: Vec<(usize, String)> = Vec::new();

    if let Some(indices) = matches.indices_of("expressions") {
        pieces.extend(indices.zip(cli.expressions.iter().cloned()));
    }

    if let Some(indices) = matches.indices_of("script_files") {
        for (index, path) in indices.zip(&cli.script_files) {
            let mut text = if path.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())
                    .context("Failed to read script from standard input")?
            } else {
                fs::read_to_string(path)
                    .with_context(|| format!("Failed to read script file: {}", path.display()))?
            };
            if text.ends_with('\n') {
                text.pop();
            }
            pieces.push((index, text));
        }
    }

    pieces.sort_by_key(|(index, _)| *index);
    Ok(pieces.into_iter().map(|(_, text)| text).collect())
}
