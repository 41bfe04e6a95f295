//! Address matching
//!
//! Decides whether a command applies to the current line and keeps the
//! command's range state up to date.

use crate::command::{Address, Command};
use crate::error::{Result, SedError};
use regex::Regex;

/// What the matcher needs to know about the current line
#[derive(Debug, Clone, Copy)]
pub struct LineContext<'a> {
    pub line_number: usize,
    pub pattern_space: &'a str,
    /// False on the last line of the stream
    pub has_next: bool,
}

/// Evaluate `command`'s address against the current line.
///
/// Updates `command.in_range` and returns whether the command applies,
/// with `!` already taken into account. An empty regex uses `last_regex`.
pub fn matches(command: &mut Command, ctx: &LineContext<'_>, last_regex: Option<&Regex>) -> Result<bool> {
    let was_in_range = command.in_range;

    let matched = match &command.address1 {
        None => true,
        Some(_) if was_in_range => true,
        Some(address) => address_matches(address, ctx, last_regex)?,
    };

    command.in_range = match (&command.address2, matched) {
        (Some(end), true) => !range_closes(end, ctx, was_in_range, last_regex)?,
        _ => false,
    };

    Ok(matched != command.negate)
}

fn address_matches(address: &Address, ctx: &LineContext<'_>, last_regex: Option<&Regex>) -> Result<bool> {
    Ok(match address {
        Address::Line(n) => *n == ctx.line_number,
        Address::Last => !ctx.has_next,
        Address::Regex(regex) => resolve(regex.as_ref(), last_regex)?.is_match(ctx.pattern_space),
    })
}

/// True if a range that matched this line ends on it
fn range_closes(
    end: &Address,
    ctx: &LineContext<'_>,
    was_in_range: bool,
    last_regex: Option<&Regex>,
) -> Result<bool> {
    Ok(match end {
        Address::Line(n) => *n <= ctx.line_number,
        Address::Last => !ctx.has_next,
        // The line that opens a range is never checked against its end regex
        Address::Regex(regex) => {
            was_in_range && resolve(regex.as_ref(), last_regex)?.is_match(ctx.pattern_space)
        }
    })
}

/// The regex itself, or the last one used for an empty `//`
pub fn resolve<'a>(regex: Option<&'a Regex>, last_regex: Option<&'a Regex>) -> Result<&'a Regex> {
    regex.or(last_regex).ok_or(SedError::NoPreviousRegex)
}
