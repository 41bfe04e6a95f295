//! The `s` command
//!
//! Matching walks the original subject left to right so anchors and word
//! boundaries always see the real surrounding text.

use crate::address::resolve;
use crate::command::{CaptureSet, ReplacementPart, ReplacementTemplate, Substitution};
use crate::error::Result;
use regex::Regex;

/// Outcome of one substitution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstituteOutcome {
    NoMatch,
    /// The pattern matched but no occurrence was replaced
    Unchanged,
    Replaced,
}

impl SubstituteOutcome {
    pub fn replaced(&self) -> bool {
        matches!(self, SubstituteOutcome::Replaced)
    }
}

/// Apply `sub` to `pattern_space`.
///
/// `last_regex` is the regex an empty pattern stands for; when the command
/// has its own regex that becomes the new last regex. `captures` is left
/// holding the offsets of the last match attempted.
pub fn substitute(
    sub: &Substitution,
    pattern_space: &mut String,
    last_regex: &mut Option<Regex>,
    captures: &mut CaptureSet,
) -> Result<SubstituteOutcome> {
    if let Some(regex) = &sub.regex {
        *last_regex = Some(regex.clone());
    }
    let regex = resolve(sub.regex.as_ref(), last_regex.as_ref())?;

    let subject = pattern_space.as_str();
    let mut output = String::with_capacity(subject.len());
    // Subject text up to `copied` is already in `output`
    let mut copied = 0;
    let mut search_from = 0;
    let mut previous_end: Option<usize> = None;
    let mut count = 0;
    let mut replaced = false;
    let mut matched = false;
    captures.clear();

    while search_from <= subject.len() {
        let Some(caps) = regex.captures_at(subject, search_from) else {
            break;
        };
        let whole = caps.get(0).map_or((search_from, search_from), |m| (m.start(), m.end()));
        *captures = CaptureSet::from_captures(&caps);
        matched = true;

        // An empty match right where the last one ended would repeat it
        if whole.0 == whole.1 && previous_end == Some(whole.0) {
            match subject[whole.0..].chars().next() {
                Some(c) => {
                    search_from = whole.0 + c.len_utf8();
                    continue;
                }
                None => break,
            }
        }

        count += 1;
        if count >= sub.occurrence {
            output.push_str(&subject[copied..whole.0]);
            expand(&sub.replacement, subject, captures, &mut output);
            copied = whole.1;
            replaced = true;
            if !sub.global {
                break;
            }
        }

        previous_end = Some(whole.1);
        search_from = if whole.0 == whole.1 {
            match subject[whole.1..].chars().next() {
                Some(c) => whole.1 + c.len_utf8(),
                None => break,
            }
        } else {
            whole.1
        };
    }

    if !replaced {
        return Ok(if matched {
            SubstituteOutcome::Unchanged
        } else {
            SubstituteOutcome::NoMatch
        });
    }

    output.push_str(&subject[copied..]);
    *pattern_space = output;
    Ok(SubstituteOutcome::Replaced)
}

/// Append the replacement for one match to `output`
pub fn expand(template: &ReplacementTemplate, subject: &str, captures: &CaptureSet, output: &mut String) {
    for part in &template.parts {
        match part {
            ReplacementPart::Literal(text) => output.push_str(text),
            ReplacementPart::WholeMatch => push_group(subject, captures, 0, output),
            ReplacementPart::Group(n) => push_group(subject, captures, *n, output),
        }
    }
}

fn push_group(subject: &str, captures: &CaptureSet, group: usize, output: &mut String) {
    if let Some((start, end)) = captures.get(group) {
        output.push_str(&subject[start..end]);
    }
}
